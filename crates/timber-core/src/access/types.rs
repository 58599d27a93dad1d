//! ============================================================================
//! Access Types - Access levels, features, and views
//! ============================================================================
//! An access level is derived from the signed-in user: role plus, for
//! hunters, the membership flag.
//! ============================================================================

use serde::{Deserialize, Serialize};

use crate::types::{User, UserRole};

/// What a principal is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// Not signed in
    #[default]
    Visitor,
    /// Signed in, role not yet chosen
    Onboarding,
    Hunter,
    /// Hunter with a paid membership
    Member,
    Landowner,
    Admin,
}

impl AccessLevel {
    pub fn for_user(user: Option<&User>) -> Self {
        match user {
            None => AccessLevel::Visitor,
            Some(user) => match user.role {
                None => AccessLevel::Onboarding,
                Some(UserRole::Hunter) if user.is_member => AccessLevel::Member,
                Some(UserRole::Hunter) => AccessLevel::Hunter,
                Some(UserRole::Landowner) => AccessLevel::Landowner,
                Some(UserRole::Admin) => AccessLevel::Admin,
            },
        }
    }

    /// Check if this level can use a specific feature
    pub fn can_use_feature(&self, feature: Feature) -> bool {
        use AccessLevel::*;
        match feature {
            Feature::Browse => *self != Onboarding,
            Feature::SaveListing => matches!(self, Hunter | Member | Admin),
            Feature::DirectMessaging => matches!(self, Member | Landowner | Admin),
            Feature::UpgradeMembership => *self == Hunter,
            Feature::AddLand => matches!(self, Landowner | Admin),
            Feature::VerifyListing | Feature::DeleteListing => *self == Admin,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AccessLevel::Visitor => "Visitor",
            AccessLevel::Onboarding => "Onboarding",
            AccessLevel::Hunter => "Hunter",
            AccessLevel::Member => "Member Hunter",
            AccessLevel::Landowner => "Landowner",
            AccessLevel::Admin => "Admin",
        }
    }
}

/// Actions gated by access level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Marketplace search and listing details
    Browse,
    /// Hunter favourites
    SaveListing,
    /// Contacting the other party about a listing
    DirectMessaging,
    /// Paying for a hunter membership
    UpgradeMembership,
    /// Submitting a new property
    AddLand,
    VerifyListing,
    DeleteListing,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::Browse,
        Feature::SaveListing,
        Feature::DirectMessaging,
        Feature::UpgradeMembership,
        Feature::AddLand,
        Feature::VerifyListing,
        Feature::DeleteListing,
    ];

    /// Get human-readable feature name
    pub fn display_name(&self) -> &'static str {
        match self {
            Feature::Browse => "Browsing",
            Feature::SaveListing => "Saving Listings",
            Feature::DirectMessaging => "Direct Messaging",
            Feature::UpgradeMembership => "Membership Upgrade",
            Feature::AddLand => "Adding Land",
            Feature::VerifyListing => "Listing Verification",
            Feature::DeleteListing => "Listing Removal",
        }
    }

    /// Who to become to unlock this feature
    pub fn requirement(&self) -> &'static str {
        match self {
            Feature::Browse => "a chosen role",
            Feature::SaveListing => "a hunter account",
            Feature::DirectMessaging => "a landowner account or a hunter membership",
            Feature::UpgradeMembership => "a hunter account without a membership",
            Feature::AddLand => "a landowner account",
            Feature::VerifyListing | Feature::DeleteListing => "an admin account",
        }
    }
}

/// Where the user asked to go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Marketplace,
    Listing(String),
    Dashboard,
    Messages,
}

/// What is actually rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "view", content = "id")]
pub enum View {
    Marketplace,
    ListingDetails(String),
    Onboarding,
    LandownerDashboard,
    HunterDashboard,
    AdminDashboard,
    Messages,
}

impl View {
    pub fn display_name(&self) -> &'static str {
        match self {
            View::Marketplace => "Marketplace",
            View::ListingDetails(_) => "Listing Details",
            View::Onboarding => "Onboarding",
            View::LandownerDashboard => "Landowner Dashboard",
            View::HunterDashboard => "Hunter Dashboard",
            View::AdminDashboard => "Admin Dashboard",
            View::Messages => "Messages",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Option<UserRole>, is_member: bool) -> User {
        User {
            id: "u1".into(),
            name: "Sam".into(),
            email: "sam@example.com".into(),
            role,
            is_member,
        }
    }

    #[test]
    fn test_level_from_user() {
        assert_eq!(AccessLevel::for_user(None), AccessLevel::Visitor);
        assert_eq!(
            AccessLevel::for_user(Some(&user(None, false))),
            AccessLevel::Onboarding
        );
        assert_eq!(
            AccessLevel::for_user(Some(&user(Some(UserRole::Hunter), true))),
            AccessLevel::Member
        );
        assert_eq!(
            AccessLevel::for_user(Some(&user(Some(UserRole::Hunter), false))),
            AccessLevel::Hunter
        );
        // membership only matters for hunters
        assert_eq!(
            AccessLevel::for_user(Some(&user(Some(UserRole::Landowner), true))),
            AccessLevel::Landowner
        );
    }

    #[test]
    fn test_feature_matrix() {
        assert!(!AccessLevel::Hunter.can_use_feature(Feature::DirectMessaging));
        assert!(AccessLevel::Member.can_use_feature(Feature::DirectMessaging));
        assert!(AccessLevel::Landowner.can_use_feature(Feature::DirectMessaging));
        assert!(AccessLevel::Landowner.can_use_feature(Feature::AddLand));
        assert!(!AccessLevel::Hunter.can_use_feature(Feature::AddLand));
        assert!(AccessLevel::Admin.can_use_feature(Feature::DeleteListing));
        assert!(!AccessLevel::Landowner.can_use_feature(Feature::VerifyListing));
        assert!(!AccessLevel::Onboarding.can_use_feature(Feature::Browse));
        assert!(AccessLevel::Visitor.can_use_feature(Feature::Browse));
        assert!(!AccessLevel::Member.can_use_feature(Feature::UpgradeMembership));
    }
}
