//! Dashboard views over the listing collection.

use serde::Serialize;

use crate::types::{Listing, User};

/// Counts shown on the admin dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total: usize,
    pub verified: usize,
    pub pending: usize,
    /// Mean price per day, 0 when there are no listings
    pub average_price: f64,
}

impl DashboardSummary {
    pub fn of(listings: &[Listing]) -> Self {
        let total = listings.len();
        let verified = listings.iter().filter(|l| l.is_verified).count();
        let average_price = if total == 0 {
            0.0
        } else {
            listings.iter().map(|l| l.price_per_day as f64).sum::<f64>() / total as f64
        };
        Self {
            total,
            verified,
            pending: total - verified,
            average_price,
        }
    }
}

/// Listings a landowner manages
pub fn owned_by<'a>(listings: &'a [Listing], user: &User) -> Vec<&'a Listing> {
    listings.iter().filter(|l| l.landowner.id == user.id).collect()
}

/// Admin search: case-insensitive match on title or location
pub fn admin_search<'a>(listings: &'a [Listing], term: &str) -> Vec<&'a Listing> {
    let term = term.trim().to_lowercase();
    listings
        .iter()
        .filter(|l| {
            term.is_empty()
                || l.title.to_lowercase().contains(&term)
                || l.location.to_lowercase().contains(&term)
        })
        .collect()
}
