//! ============================================================================
//! Core Types for the Timber Marketplace
//! ============================================================================
//! Listings, users, and messaging shapes shared by every layer.
//! Domain types serialize with camelCase attribute names; these are the exact
//! records kept in the local store.
//! ============================================================================

use serde::{Deserialize, Serialize};

/// Geographic coordinate of a listing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Fallback coordinate used when a submission carries none (centre of the
/// continental US)
pub const FALLBACK_COORDINATES: Coordinates = Coordinates {
    lat: 39.8,
    lng: -98.5,
};

/// Landowner summary embedded in each listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Landowner {
    pub id: String,
    pub name: String,
    pub avatar: String,
    pub rating: f64,
    pub listings_count: u32,
}

impl Landowner {
    /// Summary derived from the user submitting a listing
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            avatar: avatar_placeholder(&user.id),
            rating: 5.0,
            listings_count: 1,
        }
    }
}

/// A leasable hunting property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub location: String,
    pub price_per_day: u32,
    pub description: String,
    #[serde(default)]
    pub game_types: Vec<String>,
    #[serde(default)]
    pub sporting_arms: Vec<String>,
    pub acreage: u32,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub accommodations: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub landowner: Landowner,
    pub rating: f64,
    pub reviews: u32,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
}

/// Placeholder image for a listing without pictures
pub fn image_placeholder(seed: &str) -> String {
    format!("https://picsum.photos/seed/{}/800/600", seed)
}

/// Placeholder avatar for a landowner without a picture
pub fn avatar_placeholder(seed: &str) -> String {
    format!("https://picsum.photos/seed/{}/100/100", seed)
}

/// Role chosen during onboarding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Landowner,
    Hunter,
    Admin,
}

impl UserRole {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "landowner" => Some(Self::Landowner),
            "hunter" => Some(Self::Hunter),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Landowner => "landowner",
            Self::Hunter => "hunter",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated principal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Unset until onboarding
    #[serde(default)]
    pub role: Option<UserRole>,
    /// Only meaningful for hunters; unlocks direct messaging
    #[serde(default)]
    pub is_member: bool,
}

/// Prefix marking identities that exist only in the local store
pub const SIMULATED_ID_PREFIX: &str = "mock-";

impl User {
    /// Whether this identity was created locally rather than by the backend
    pub fn is_simulated(&self) -> bool {
        self.id.starts_with(SIMULATED_ID_PREFIX)
    }

    pub fn needs_onboarding(&self) -> bool {
        self.role.is_none()
    }
}

// ============================================================================
// Messaging
// ============================================================================

/// A single message inside a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub text: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationParticipants {
    pub hunter_id: String,
    pub landowner_id: String,
    pub hunter_name: String,
    pub landowner_name: String,
    pub landowner_avatar: String,
}

/// A thread between a hunter and a landowner about one listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub participants: ConversationParticipants,
    pub listing_id: String,
    pub listing_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    pub messages: Vec<Message>,
}

// ============================================================================
// Errors
// ============================================================================

/// Error types for the marketplace
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimberError {
    #[error("Local store error: {0}")]
    Store(String),

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not connected to a live backend")]
    NotConnected,

    #[error("No user is signed in")]
    NotSignedIn,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Listing not found: {0}")]
    ListingNotFound(String),

    #[error("Payment failed: {0}")]
    Payment(String),
}

impl TimberError {
    /// Whether a backend message reports throttling
    pub fn is_rate_limit(&self) -> bool {
        match self {
            TimberError::Backend { status, message } => {
                *status == 429 || message.to_lowercase().contains("rate limit")
            }
            _ => false,
        }
    }
}

impl From<anyhow::Error> for TimberError {
    fn from(err: anyhow::Error) -> Self {
        TimberError::Store(format!("{:#}", err))
    }
}

/// Authentication failures; `RateLimited` lets the caller offer a simulated
/// identity instead of leaving the user stuck
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("Email rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Sign-in rejected: {0}")]
    Rejected(String),
}

impl AuthError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, AuthError::RateLimited(_))
    }
}

impl From<TimberError> for AuthError {
    fn from(err: TimberError) -> Self {
        if err.is_rate_limit() {
            AuthError::RateLimited(err.to_string())
        } else {
            AuthError::Rejected(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_parsing() {
        assert_eq!(UserRole::from_str("Landowner"), Some(UserRole::Landowner));
        assert_eq!(UserRole::from_str(" hunter "), Some(UserRole::Hunter));
        assert_eq!(UserRole::from_str("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::from_str("outfitter"), None);
    }

    #[test]
    fn test_user_serializes_camel_case_with_null_role() {
        let user = User {
            id: "mock-email-user-abcde".into(),
            name: "pat".into(),
            email: "pat@example.com".into(),
            role: None,
            is_member: false,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["role"], serde_json::Value::Null);
        assert_eq!(json["isMember"], false);
        assert!(user.is_simulated());
        assert!(user.needs_onboarding());
    }

    #[test]
    fn test_user_missing_member_flag_defaults_false() {
        let user: User = serde_json::from_str(
            r#"{"id":"u1","name":"Sam","email":"sam@example.com","role":"hunter"}"#,
        )
        .unwrap();
        assert_eq!(user.role, Some(UserRole::Hunter));
        assert!(!user.is_member);
        assert!(!user.is_simulated());
    }

    #[test]
    fn test_rate_limit_classification() {
        let throttled = TimberError::Backend {
            status: 400,
            message: "Email rate limit exceeded".into(),
        };
        assert!(throttled.is_rate_limit());
        assert!(AuthError::from(throttled).is_rate_limit());

        let too_many = TimberError::Backend {
            status: 429,
            message: "slow down".into(),
        };
        assert!(too_many.is_rate_limit());

        let other = TimberError::Backend {
            status: 401,
            message: "invalid credentials".into(),
        };
        assert!(!AuthError::from(other).is_rate_limit());
    }

    #[test]
    fn test_landowner_from_user() {
        let user = User {
            id: "u9".into(),
            name: "Erik Thorne".into(),
            email: "erik@example.com".into(),
            role: Some(UserRole::Landowner),
            is_member: false,
        };
        let owner = Landowner::from_user(&user);
        assert_eq!(owner.id, "u9");
        assert_eq!(owner.name, "Erik Thorne");
        assert_eq!(owner.avatar, "https://picsum.photos/seed/u9/100/100");
        assert_eq!(owner.listings_count, 1);
    }
}
