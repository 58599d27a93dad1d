//! ============================================================================
//! Search Filters - Compound listing predicate
//! ============================================================================
//! Narrows a listing collection by text, location, game, accommodations,
//! sporting arms, price, and acreage. Each dimension is vacuously true at its
//! default, so the default filter matches everything. Order is preserved.
//!
//! Dimensions carried but not applied:
//! - `min_price` / `min_acreage`: reserved lower bounds
//! - `date_range` / `radius`: advisory, display only
//! ============================================================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::Listing;

/// Default price ceiling ($/day) that reads as "any price"
pub const DEFAULT_MAX_PRICE: u32 = 1500;
/// Default acreage ceiling that reads as "any size"
pub const DEFAULT_MAX_ACREAGE: u32 = 5000;
/// Default advisory search radius in miles
pub const DEFAULT_RADIUS: u32 = 100;

/// Game types matched as one waterfowl category
const WATERFOWL: [&str; 2] = ["Duck", "Goose"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// The active query state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    pub query: String,
    pub location: String,
    pub game_types: Vec<String>,
    pub accommodations: Vec<String>,
    pub sporting_arms: Vec<String>,
    pub date_range: Option<DateRange>,
    pub min_acreage: u32,
    pub max_acreage: u32,
    pub radius: u32,
    pub min_price: u32,
    pub max_price: u32,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            query: String::new(),
            location: String::new(),
            game_types: Vec::new(),
            accommodations: Vec::new(),
            sporting_arms: Vec::new(),
            date_range: None,
            min_acreage: 0,
            max_acreage: DEFAULT_MAX_ACREAGE,
            radius: DEFAULT_RADIUS,
            min_price: 0,
            max_price: DEFAULT_MAX_PRICE,
        }
    }
}

impl SearchFilters {
    /// Whether a single listing passes every applied dimension
    pub fn matches(&self, listing: &Listing) -> bool {
        self.matches_query(listing)
            && self.matches_location(listing)
            && self.matches_game_types(listing)
            && self.matches_accommodations(listing)
            && self.matches_sporting_arms(listing)
            && listing.price_per_day <= self.max_price
            && listing.acreage <= self.max_acreage
    }

    /// Clone every listing that passes, keeping input order
    pub fn apply(&self, listings: &[Listing]) -> Vec<Listing> {
        listings.iter().filter(|l| self.matches(l)).cloned().collect()
    }

    fn matches_query(&self, listing: &Listing) -> bool {
        if self.query.is_empty() {
            return true;
        }
        let needle = self.query.to_lowercase();
        listing.title.to_lowercase().contains(&needle)
            || listing.description.to_lowercase().contains(&needle)
    }

    fn matches_location(&self, listing: &Listing) -> bool {
        self.location.is_empty()
            || listing
                .location
                .to_lowercase()
                .contains(&self.location.to_lowercase())
    }

    /// Any overlap; Duck and Goose stand in for each other
    fn matches_game_types(&self, listing: &Listing) -> bool {
        if self.game_types.is_empty() {
            return true;
        }
        let has = |game: &str| listing.game_types.iter().any(|g| g == game);
        self.game_types.iter().any(|wanted| {
            if WATERFOWL.contains(&wanted.as_str()) {
                WATERFOWL.iter().any(|w| has(*w))
            } else {
                has(wanted)
            }
        })
    }

    /// Full coverage: every selected accommodation must be present
    fn matches_accommodations(&self, listing: &Listing) -> bool {
        self.accommodations
            .iter()
            .all(|acc| listing.accommodations.contains(acc))
    }

    fn matches_sporting_arms(&self, listing: &Listing) -> bool {
        self.sporting_arms.is_empty()
            || self
                .sporting_arms
                .iter()
                .any(|arm| listing.sporting_arms.contains(arm))
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Filter a collection against the given state
pub fn apply_filters(listings: &[Listing], filters: &SearchFilters) -> Vec<Listing> {
    filters.apply(listings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::seed_listings;

    fn ids(listings: &[Listing]) -> Vec<&str> {
        listings.iter().map(|l| l.id.as_str()).collect()
    }

    fn listing_with(game_types: &[&str], accommodations: &[&str]) -> Listing {
        let mut listing = seed_listings().remove(0);
        listing.game_types = game_types.iter().map(|s| s.to_string()).collect();
        listing.accommodations = accommodations.iter().map(|s| s.to_string()).collect();
        listing
    }

    #[test]
    fn test_default_filters_match_everything_in_order() {
        let listings = seed_listings();
        let filtered = apply_filters(&listings, &SearchFilters::default());
        assert_eq!(filtered, listings);
    }

    #[test]
    fn test_location_illinois() {
        let filters = SearchFilters {
            location: "Illinois".into(),
            ..SearchFilters::default()
        };
        let filtered = apply_filters(&seed_listings(), &filters);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "Timber Ridge Whitetail Haven");
    }

    #[test]
    fn test_max_price_400() {
        let filters = SearchFilters {
            max_price: 400,
            ..SearchFilters::default()
        };
        let filtered = apply_filters(&seed_listings(), &filters);
        assert_eq!(ids(&filtered), vec!["2"]);
        assert_eq!(filtered[0].title, "Rolling Plains Quail Ranch");
    }

    #[test]
    fn test_price_ceiling_excludes_regardless_of_other_matches() {
        let filters = SearchFilters {
            query: "elk".into(),
            location: "dakota".into(),
            game_types: vec!["Elk".into()],
            max_price: 749,
            ..SearchFilters::default()
        };
        assert!(apply_filters(&seed_listings(), &filters).is_empty());
    }

    #[test]
    fn test_query_matches_title_or_description_case_insensitive() {
        let filters = SearchFilters {
            query: "MISSISSIPPI flyway".into(),
            ..SearchFilters::default()
        };
        assert_eq!(ids(&apply_filters(&seed_listings(), &filters)), vec!["3"]);

        let filters = SearchFilters {
            query: "quail ranch".into(),
            ..SearchFilters::default()
        };
        assert_eq!(ids(&apply_filters(&seed_listings(), &filters)), vec!["2"]);
    }

    #[test]
    fn test_waterfowl_equivalence() {
        let goose_only = listing_with(&["Goose"], &[]);
        let duck_only = listing_with(&["Duck"], &[]);
        let turkey_only = listing_with(&["Turkey"], &[]);

        let want_duck = SearchFilters {
            game_types: vec!["Duck".into()],
            ..SearchFilters::default()
        };
        let want_goose = SearchFilters {
            game_types: vec!["Goose".into()],
            ..SearchFilters::default()
        };

        assert!(want_duck.matches(&goose_only));
        assert!(want_goose.matches(&duck_only));
        assert!(!want_duck.matches(&turkey_only));
    }

    #[test]
    fn test_game_types_any_overlap() {
        let filters = SearchFilters {
            game_types: vec!["Elk".into(), "Quail".into()],
            ..SearchFilters::default()
        };
        assert_eq!(ids(&apply_filters(&seed_listings(), &filters)), vec!["2", "4"]);
    }

    #[test]
    fn test_accommodations_require_full_coverage() {
        let lodging_only = listing_with(&[], &["Lodging"]);

        let both = SearchFilters {
            accommodations: vec!["Lodging".into(), "Electricity".into()],
            ..SearchFilters::default()
        };
        let lodging = SearchFilters {
            accommodations: vec!["Lodging".into()],
            ..SearchFilters::default()
        };

        assert!(!both.matches(&lodging_only));
        assert!(lodging.matches(&lodging_only));
    }

    #[test]
    fn test_sporting_arms_any_overlap() {
        let filters = SearchFilters {
            sporting_arms: vec!["Muzzleloader".into(), "Crossbow".into()],
            ..SearchFilters::default()
        };
        assert_eq!(ids(&apply_filters(&seed_listings(), &filters)), vec!["4"]);
    }

    #[test]
    fn test_acreage_ceiling() {
        let filters = SearchFilters {
            max_acreage: 400,
            ..SearchFilters::default()
        };
        assert_eq!(ids(&apply_filters(&seed_listings(), &filters)), vec!["1", "3"]);
    }

    #[test]
    fn test_reserved_dimensions_are_not_applied() {
        let filters = SearchFilters {
            min_price: 10_000,
            min_acreage: 10_000,
            radius: 1,
            date_range: Some(DateRange {
                start: NaiveDate::from_ymd_opt(2026, 11, 1),
                end: NaiveDate::from_ymd_opt(2026, 11, 3),
            }),
            ..SearchFilters::default()
        };
        assert_eq!(apply_filters(&seed_listings(), &filters).len(), 4);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let filters: SearchFilters = serde_json::from_str(r#"{"maxPrice": 400}"#).unwrap();
        assert_eq!(filters.max_price, 400);
        assert_eq!(filters.max_acreage, DEFAULT_MAX_ACREAGE);
        assert!(!filters.is_default());
    }
}
