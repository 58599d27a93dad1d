//! ============================================================================
//! Access Module - Role-gated views and features
//! ============================================================================
//! Decides which view a user may see and which marketplace actions they may
//! take, based on their role and membership.
//!
//! ## Levels
//! - **Visitor**: not signed in, browse only
//! - **Onboarding**: signed in, role not chosen yet, onboarding screen only
//! - **Hunter**: browse, save listings
//! - **Member**: hunter with a paid membership, adds direct messaging
//! - **Landowner**: add land, message hunters
//! - **Admin**: everything, plus verify and delete listings
//!
//! ## Usage
//! ```rust,ignore
//! use timber_core::access::{Feature, RoleGate};
//!
//! let level = RoleGate::gate_feature(user.as_ref(), Feature::AddLand)?;
//! let view = RoleGate::resolve_view(user.as_ref(), &Route::Dashboard);
//! ```
//! ============================================================================

mod gate;
mod types;

pub use gate::RoleGate;
pub use types::{AccessLevel, Feature, Route, View};
