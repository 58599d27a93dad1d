//! ============================================================================
//! Role Gate - View resolution and feature gating
//! ============================================================================
//! The onboarding screen is exclusive: while a signed-in user has no role,
//! every route resolves to it.
//! ============================================================================

use tracing::{debug, warn};

use super::types::{AccessLevel, Feature, Route, View};
use crate::types::{TimberError, User, UserRole};

/// Stateless role checks over the current user
pub struct RoleGate;

impl RoleGate {
    /// Map a requested route to the view this user actually gets
    pub fn resolve_view(user: Option<&User>, route: &Route) -> View {
        let Some(user) = user else {
            return match route {
                Route::Listing(id) => View::ListingDetails(id.clone()),
                _ => View::Marketplace,
            };
        };

        let Some(role) = user.role else {
            debug!("User {} has no role, routing to onboarding", user.id);
            return View::Onboarding;
        };

        match route {
            Route::Marketplace => View::Marketplace,
            Route::Listing(id) => View::ListingDetails(id.clone()),
            Route::Messages => View::Messages,
            Route::Dashboard => match role {
                UserRole::Landowner => View::LandownerDashboard,
                UserRole::Hunter => View::HunterDashboard,
                UserRole::Admin => View::AdminDashboard,
            },
        }
    }

    /// Gate a feature - returns Ok(level) if allowed, Err with message if not
    pub fn gate_feature(user: Option<&User>, feature: Feature) -> Result<AccessLevel, TimberError> {
        let level = AccessLevel::for_user(user);
        if level.can_use_feature(feature) {
            return Ok(level);
        }

        if user.is_none() && feature != Feature::Browse {
            return Err(TimberError::NotSignedIn);
        }

        warn!(
            "Access denied for {:?}: {} level cannot use it",
            feature,
            level.display_name()
        );
        Err(TimberError::PermissionDenied(format!(
            "{} requires {}. You are signed in as {}.",
            feature.display_name(),
            feature.requirement(),
            level.display_name()
        )))
    }

    pub fn can_use_feature(user: Option<&User>, feature: Feature) -> bool {
        AccessLevel::for_user(user).can_use_feature(feature)
    }

    /// Features open to this user, in menu order
    pub fn available_features(user: Option<&User>) -> Vec<Feature> {
        Feature::ALL
            .into_iter()
            .filter(|feature| Self::can_use_feature(user, *feature))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Option<UserRole>) -> User {
        User {
            id: "mock-landowner-abcde".into(),
            name: "Bill Landowner".into(),
            email: "bill@example.com".into(),
            role,
            is_member: false,
        }
    }

    #[test]
    fn test_onboarding_is_exclusive() {
        let pending = user(None);
        for route in [
            Route::Marketplace,
            Route::Dashboard,
            Route::Messages,
            Route::Listing("1".into()),
        ] {
            assert_eq!(RoleGate::resolve_view(Some(&pending), &route), View::Onboarding);
        }
    }

    #[test]
    fn test_dashboard_follows_role() {
        let cases = [
            (UserRole::Landowner, View::LandownerDashboard),
            (UserRole::Hunter, View::HunterDashboard),
            (UserRole::Admin, View::AdminDashboard),
        ];
        for (role, view) in cases {
            let user = user(Some(role));
            assert_eq!(RoleGate::resolve_view(Some(&user), &Route::Dashboard), view);
        }
    }

    #[test]
    fn test_visitor_routes() {
        assert_eq!(RoleGate::resolve_view(None, &Route::Dashboard), View::Marketplace);
        assert_eq!(RoleGate::resolve_view(None, &Route::Messages), View::Marketplace);
        assert_eq!(
            RoleGate::resolve_view(None, &Route::Listing("3".into())),
            View::ListingDetails("3".into())
        );
    }

    #[test]
    fn test_gate_feature_errors() {
        assert_eq!(
            RoleGate::gate_feature(None, Feature::AddLand),
            Err(TimberError::NotSignedIn)
        );
        let hunter = user(Some(UserRole::Hunter));
        assert!(matches!(
            RoleGate::gate_feature(Some(&hunter), Feature::AddLand),
            Err(TimberError::PermissionDenied(_))
        ));
        let owner = user(Some(UserRole::Landowner));
        assert_eq!(
            RoleGate::gate_feature(Some(&owner), Feature::AddLand),
            Ok(AccessLevel::Landowner)
        );
    }

    #[test]
    fn test_available_features() {
        assert_eq!(RoleGate::available_features(None), vec![Feature::Browse]);

        let hunter = user(Some(UserRole::Hunter));
        let features = RoleGate::available_features(Some(&hunter));
        assert!(features.contains(&Feature::SaveListing));
        assert!(features.contains(&Feature::UpgradeMembership));
        assert!(!features.contains(&Feature::DirectMessaging));

        let admin = user(Some(UserRole::Admin));
        let features = RoleGate::available_features(Some(&admin));
        assert!(features.contains(&Feature::VerifyListing));
        assert!(!features.contains(&Feature::UpgradeMembership));
    }
}
