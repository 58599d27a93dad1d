//! ============================================================================
//! Seed Catalogue - Showcase listings and canonical tag vocabularies
//! ============================================================================
//! Displayed when neither the local store nor the backend has any listings.
//! ============================================================================

use crate::types::{avatar_placeholder, image_placeholder, Coordinates, Landowner, Listing};

pub const GAME_TYPES: &[&str] = &[
    "Whitetail Deer",
    "Mule Deer",
    "Elk",
    "Turkey",
    "Duck",
    "Goose",
    "Quail",
    "Pheasant",
    "Hog",
];

pub const ACCOMMODATIONS: &[&str] = &[
    "Lodging",
    "Well Water",
    "Outhouse",
    "Electricity",
    "Camping Area",
];

pub const SPORTING_ARMS: &[&str] = &["Bow", "Rifle", "Shotgun", "Muzzleloader", "Crossbow"];

/// Canonical spelling of a tag, matched case-insensitively
pub fn canonical_tag(vocabulary: &[&'static str], raw: &str) -> Option<&'static str> {
    let raw = raw.trim();
    vocabulary
        .iter()
        .copied()
        .find(|tag| tag.eq_ignore_ascii_case(raw))
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn owner(id: &str, name: &str, avatar_seed: &str, rating: f64, listings_count: u32) -> Landowner {
    Landowner {
        id: id.to_string(),
        name: name.to_string(),
        avatar: avatar_placeholder(avatar_seed),
        rating,
        listings_count,
    }
}

/// The four showcase listings
pub fn seed_listings() -> Vec<Listing> {
    vec![
        Listing {
            id: "1".into(),
            title: "Timber Ridge Whitetail Haven".into(),
            location: "Pike County, Illinois".into(),
            price_per_day: 450,
            description: "Premier trophy whitetail property with established food plots and heavy timber cover. Excellent deer management practices in place for over a decade.".into(),
            game_types: strings(&["Whitetail Deer", "Turkey"]),
            sporting_arms: strings(&["Bow", "Rifle", "Shotgun"]),
            acreage: 240,
            features: strings(&["Blind Provided", "Water Source"]),
            accommodations: strings(&["Lodging", "Well Water", "Electricity"]),
            images: vec![image_placeholder("hunt1"), image_placeholder("hunt1b")],
            landowner: owner("o1", "John Miller", "owner1", 4.9, 3),
            rating: 4.95,
            reviews: 24,
            is_verified: true,
            coordinates: Some(Coordinates { lat: 39.6273, lng: -90.7512 }),
        },
        Listing {
            id: "2".into(),
            title: "Rolling Plains Quail Ranch".into(),
            location: "Snyder, Texas".into(),
            price_per_day: 300,
            description: "Expansive grasslands perfect for upland bird hunting. High density of wild bobwhite quail. Includes access to a rustic bunkhouse.".into(),
            game_types: strings(&["Quail", "Dove"]),
            sporting_arms: strings(&["Shotgun"]),
            acreage: 1200,
            features: strings(&["Dog Kennels", "Vehicle Access"]),
            accommodations: strings(&["Outhouse", "Camping Area"]),
            images: vec![image_placeholder("hunt2"), image_placeholder("hunt2b")],
            landowner: owner("o2", "Sarah Evans", "owner2", 4.8, 1),
            rating: 4.7,
            reviews: 15,
            is_verified: true,
            coordinates: Some(Coordinates { lat: 32.7179, lng: -100.9176 }),
        },
        Listing {
            id: "3".into(),
            title: "Cypress Creek Waterfowl".into(),
            location: "Stuttgart, Arkansas".into(),
            price_per_day: 550,
            description: "Flooded timber and rice fields in the heart of the Mississippi Flyway. Fully guided or self-guided options available.".into(),
            game_types: strings(&["Duck", "Goose"]),
            sporting_arms: strings(&["Shotgun"]),
            acreage: 400,
            features: strings(&["Pit Blinds", "Decoys Included", "Boat Access"]),
            accommodations: strings(&["Lodging", "Electricity"]),
            images: vec![image_placeholder("hunt3"), image_placeholder("hunt3b")],
            landowner: owner("o3", "Beau Bridges", "owner3", 5.0, 2),
            rating: 4.88,
            reviews: 42,
            is_verified: false,
            coordinates: Some(Coordinates { lat: 34.5004, lng: -91.5515 }),
        },
        Listing {
            id: "4".into(),
            title: "Black Hills Elk Territory".into(),
            location: "Custer, South Dakota".into(),
            price_per_day: 750,
            description: "Rugged terrain with high elk density. Borders National Forest land. Experienced scouting reports provided upon booking.".into(),
            game_types: strings(&["Elk", "Mule Deer"]),
            sporting_arms: strings(&["Bow", "Rifle", "Muzzleloader"]),
            acreage: 850,
            features: strings(&["Mountainous", "Primitive Camping", "Pack-in Only"]),
            accommodations: strings(&["Camping Area"]),
            images: vec![image_placeholder("hunt4"), image_placeholder("hunt4b")],
            landowner: owner("o4", "Erik Thorne", "owner4", 4.9, 1),
            rating: 4.92,
            reviews: 18,
            is_verified: true,
            coordinates: Some(Coordinates { lat: 43.7667, lng: -103.6030 }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_seed_ids_unique() {
        let listings = seed_listings();
        let ids: HashSet<_> = listings.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids.len(), listings.len());
    }

    #[test]
    fn test_seed_tags_use_vocabulary() {
        for listing in seed_listings() {
            for arm in &listing.sporting_arms {
                assert!(SPORTING_ARMS.contains(&arm.as_str()), "{} not a known arm", arm);
            }
            for acc in &listing.accommodations {
                assert!(
                    ACCOMMODATIONS.contains(&acc.as_str()),
                    "{} not a known accommodation",
                    acc
                );
            }
        }
    }

    #[test]
    fn test_canonical_tag() {
        assert_eq!(canonical_tag(GAME_TYPES, " whitetail deer "), Some("Whitetail Deer"));
        assert_eq!(canonical_tag(SPORTING_ARMS, "BOW"), Some("Bow"));
        assert_eq!(canonical_tag(ACCOMMODATIONS, "Hot Tub"), None);
    }
}
