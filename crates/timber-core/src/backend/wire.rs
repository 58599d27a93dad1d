//! ============================================================================
//! Wire Types - Backend row shapes and their translation to domain types
//! ============================================================================
//! Remote rows use snake_case fields. Every row is validated here before it
//! becomes a `Listing` or `User`; nothing from the wire is trusted as-is.
//!
//! Listing read defaults:
//!
//! | domain field        | wire source                  | when absent / empty            |
//! |---------------------|------------------------------|--------------------------------|
//! | id                  | `id` (string or number)      | row rejected                   |
//! | title, location,    | same name                    | empty string                   |
//! | description         |                              |                                |
//! | price_per_day       | `price_per_day`              | row rejected (also if < 0)     |
//! | acreage             | `acreage`                    | 0 (row rejected if < 0)        |
//! | tag lists           | `game_types`, `sporting_arms`, `features`, `accommodations` | empty |
//! | images              | `images`                     | `[picsum seed/{id}]`           |
//! | is_verified         | `is_verified`                | false                          |
//! | coordinates         | `coordinates`                | none                           |
//! | landowner.id        | `landowner_id`               | "unknown"                      |
//! | landowner.name      | `landowner.full_name`        | "Verified Landowner"           |
//! | landowner.avatar    | `landowner.avatar_url`       | `picsum seed/{landowner_id}`   |
//! | landowner.rating / listings_count | -              | 5.0 / 1                        |
//! | rating              | `rating`                     | 5.0                            |
//! | reviews             | `review_count`               | 0                              |
//! ============================================================================

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::types::{
    avatar_placeholder, image_placeholder, Coordinates, Landowner, Listing, TimberError, User,
    UserRole, FALLBACK_COORDINATES,
};

const UNKNOWN_LANDOWNER_ID: &str = "unknown";
const DEFAULT_LANDOWNER_NAME: &str = "Verified Landowner";
const DEFAULT_RATING: f64 = 5.0;

/// Accept string or numeric primary keys
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {}", other))),
    }
}

/// Optional foreign key; null counts as absent
fn opt_id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!("invalid id: {}", other))),
    }
}

/// Joined `profiles` record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileRow {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A listing as read from the backend, joined with its landowner profile
#[derive(Debug, Clone, Deserialize)]
pub struct ListingRow {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub price_per_day: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub game_types: Option<Vec<String>>,
    #[serde(default)]
    pub sporting_arms: Option<Vec<String>>,
    #[serde(default)]
    pub acreage: Option<f64>,
    #[serde(default)]
    pub features: Option<Vec<String>>,
    #[serde(default)]
    pub accommodations: Option<Vec<String>>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub is_verified: Option<bool>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default, deserialize_with = "opt_id_as_string")]
    pub landowner_id: Option<String>,
    #[serde(default)]
    pub landowner: Option<ProfileRow>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<u32>,
}

fn whole_number(field: &str, value: f64) -> Result<u32, TimberError> {
    if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
        return Err(TimberError::InvalidInput(format!(
            "{} out of range: {}",
            field, value
        )));
    }
    Ok(value.round() as u32)
}

impl ListingRow {
    /// Translate into the canonical listing shape
    pub fn into_listing(self) -> Result<Listing, TimberError> {
        let price = self.price_per_day.ok_or_else(|| {
            TimberError::InvalidInput(format!("listing {} has no price_per_day", self.id))
        })?;
        let price_per_day = whole_number("price_per_day", price)?;
        let acreage = whole_number("acreage", self.acreage.unwrap_or(0.0))?;

        let images = match self.images {
            Some(images) if !images.is_empty() => images,
            _ => vec![image_placeholder(&self.id)],
        };

        let landowner_id = self
            .landowner_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| UNKNOWN_LANDOWNER_ID.to_string());
        let profile = self.landowner.unwrap_or_default();
        let landowner = Landowner {
            name: profile
                .full_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_LANDOWNER_NAME.to_string()),
            avatar: profile
                .avatar_url
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| avatar_placeholder(&landowner_id)),
            id: landowner_id,
            rating: DEFAULT_RATING,
            listings_count: 1,
        };

        Ok(Listing {
            id: self.id,
            title: self.title.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            price_per_day,
            description: self.description.unwrap_or_default(),
            game_types: self.game_types.unwrap_or_default(),
            sporting_arms: self.sporting_arms.unwrap_or_default(),
            acreage,
            features: self.features.unwrap_or_default(),
            accommodations: self.accommodations.unwrap_or_default(),
            images,
            landowner,
            rating: self
                .rating
                .filter(|r| r.is_finite())
                .map(|r| r.clamp(0.0, 5.0))
                .unwrap_or(DEFAULT_RATING),
            reviews: self.review_count.unwrap_or(0),
            is_verified: self.is_verified.unwrap_or(false),
            coordinates: self.coordinates,
        })
    }
}

/// Validate raw rows one at a time; malformed rows are logged and skipped
pub fn listings_from_rows(rows: Vec<Value>) -> Vec<Listing> {
    rows.into_iter()
        .filter_map(|raw| {
            let row: ListingRow = match serde_json::from_value(raw) {
                Ok(row) => row,
                Err(e) => {
                    warn!("Skipping malformed listing row: {}", e);
                    return None;
                }
            };
            let id = row.id.clone();
            match row.into_listing() {
                Ok(listing) => Some(listing),
                Err(e) => {
                    warn!("Skipping listing {}: {}", id, e);
                    None
                }
            }
        })
        .collect()
}

/// Insert payload for a new listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewListingRow {
    pub title: String,
    pub location: String,
    pub price_per_day: u32,
    pub description: String,
    pub game_types: Vec<String>,
    pub sporting_arms: Vec<String>,
    pub acreage: u32,
    pub features: Vec<String>,
    pub accommodations: Vec<String>,
    pub images: Vec<String>,
    pub landowner_id: String,
    pub coordinates: Coordinates,
}

impl NewListingRow {
    pub fn coordinates_or_fallback(coordinates: Option<Coordinates>) -> Coordinates {
        coordinates.unwrap_or(FALLBACK_COORDINATES)
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingTitleRow {
    #[serde(default)]
    pub title: Option<String>,
}

/// A message joined with both profiles and the listing title
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRow {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    #[serde(deserialize_with = "id_as_string")]
    pub listing_id: String,
    #[serde(deserialize_with = "id_as_string")]
    pub sender_id: String,
    #[serde(deserialize_with = "id_as_string")]
    pub receiver_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub sender: Option<ProfileRow>,
    #[serde(default)]
    pub receiver: Option<ProfileRow>,
    #[serde(default)]
    pub listing: Option<ListingTitleRow>,
}

/// Decode message rows one at a time; malformed rows are logged and skipped
pub fn messages_from_rows(rows: Vec<Value>) -> Vec<MessageRow> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<MessageRow>(row) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!("Skipping message row: {}", e);
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessageRow {
    pub listing_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_member: Option<bool>,
}

/// The signed-in account as reported by the auth service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl RemoteUser {
    /// Name falls back to the email local part, then "User"; unknown role
    /// strings count as unset
    pub fn into_user(self) -> User {
        let email = self.email.unwrap_or_default();
        let name = self
            .user_metadata
            .full_name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                email
                    .split('@')
                    .next()
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "User".to_string());

        User {
            id: self.id,
            name,
            role: self
                .user_metadata
                .role
                .as_deref()
                .and_then(UserRole::from_str),
            is_member: self.user_metadata.is_member.unwrap_or(false),
            email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_row_maps_fields() {
        let row = json!({
            "id": "abc",
            "title": "Oak Bottoms",
            "location": "Adams County, Ohio",
            "price_per_day": 325,
            "description": "River bottom hardwoods",
            "game_types": ["Whitetail Deer"],
            "sporting_arms": ["Bow"],
            "acreage": 180,
            "features": ["Ladder Stands"],
            "accommodations": ["Camping Area"],
            "images": ["https://img.example/1.jpg"],
            "is_verified": true,
            "coordinates": { "lat": 38.8, "lng": -83.5 },
            "landowner_id": "owner-7",
            "landowner": { "full_name": "Dana Cole", "avatar_url": "https://img.example/dana.jpg" }
        });
        let listings = listings_from_rows(vec![row]);
        assert_eq!(listings.len(), 1);
        let l = &listings[0];
        assert_eq!(l.price_per_day, 325);
        assert_eq!(l.acreage, 180);
        assert!(l.is_verified);
        assert_eq!(l.landowner.id, "owner-7");
        assert_eq!(l.landowner.name, "Dana Cole");
        assert_eq!(l.images, vec!["https://img.example/1.jpg".to_string()]);
        assert_eq!(l.rating, 5.0);
        assert_eq!(l.reviews, 0);
    }

    #[test]
    fn test_sparse_row_gets_defaults() {
        let row = json!({ "id": 42, "title": "Bare Tract", "price_per_day": 90.4, "images": [] });
        let l = listings_from_rows(vec![row]).remove(0);
        assert_eq!(l.id, "42");
        assert_eq!(l.price_per_day, 90);
        assert_eq!(l.acreage, 0);
        assert!(l.game_types.is_empty());
        assert_eq!(l.images, vec!["https://picsum.photos/seed/42/800/600".to_string()]);
        assert_eq!(l.landowner.id, "unknown");
        assert_eq!(l.landowner.name, "Verified Landowner");
        assert_eq!(l.landowner.avatar, "https://picsum.photos/seed/unknown/100/100");
        assert!(!l.is_verified);
        assert!(l.coordinates.is_none());
    }

    #[test]
    fn test_invalid_rows_are_skipped() {
        let rows = vec![
            json!({ "title": "no id", "price_per_day": 10 }),
            json!({ "id": "neg", "price_per_day": -5 }),
            json!({ "id": "noprice" }),
            json!({ "id": "ok", "price_per_day": 10 }),
        ];
        let ids: Vec<_> = listings_from_rows(rows).into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec!["ok".to_string()]);
    }

    #[test]
    fn test_remote_user_name_fallbacks() {
        let named: RemoteUser = serde_json::from_value(json!({
            "id": "u1",
            "email": "dana@example.com",
            "user_metadata": { "full_name": "Dana Cole", "role": "landowner", "is_member": true }
        }))
        .unwrap();
        let user = named.into_user();
        assert_eq!(user.name, "Dana Cole");
        assert_eq!(user.role, Some(UserRole::Landowner));
        assert!(user.is_member);

        let bare: RemoteUser =
            serde_json::from_value(json!({ "id": "u2", "email": "sam@example.com" })).unwrap();
        let user = bare.into_user();
        assert_eq!(user.name, "sam");
        assert_eq!(user.role, None);
        assert!(!user.is_member);

        let anonymous: RemoteUser = serde_json::from_value(json!({
            "id": "u3",
            "user_metadata": { "role": "superuser" }
        }))
        .unwrap();
        let user = anonymous.into_user();
        assert_eq!(user.name, "User");
        assert_eq!(user.role, None);
    }

    #[test]
    fn test_numeric_foreign_keys() {
        let listing = listings_from_rows(vec![json!({
            "id": 7, "title": "Creek Tract", "price_per_day": 80, "landowner_id": 12
        })])
        .remove(0);
        assert_eq!(listing.landowner.id, "12");

        let rows = vec![
            json!({
                "id": 1, "listing_id": 7, "sender_id": "u1", "receiver_id": "u2",
                "content": "Still open in November?", "created_at": "2025-10-01T12:00:00Z"
            }),
            json!({ "id": 2, "listing_id": null, "sender_id": "u1", "receiver_id": "u2" }),
            json!({ "id": 3, "listing_id": "7", "sender_id": "u2", "receiver_id": "u1" }),
        ];
        let messages = messages_from_rows(rows);
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(messages[0].listing_id, "7");
    }

    #[test]
    fn test_insert_payload_fallback_coordinates() {
        let c = NewListingRow::coordinates_or_fallback(None);
        assert_eq!(c, FALLBACK_COORDINATES);
    }
}
