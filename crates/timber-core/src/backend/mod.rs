//! ============================================================================
//! Backend Module - Remote listing, messaging, and auth service
//! ============================================================================
//! The `Backend` trait is the only way the rest of the crate talks to the
//! network. `SupabaseBackend` implements it over HTTP; tests substitute an
//! in-memory double.
//!
//! ## Usage
//! ```rust,ignore
//! use timber_core::backend::{Backend, SupabaseBackend};
//!
//! let backend = SupabaseBackend::new(&credentials, access_token)?;
//! let rows = backend.select_listings().await?;
//! ```
//! ============================================================================

mod supabase;
pub mod wire;

pub use supabase::SupabaseBackend;
pub use wire::{
    listings_from_rows, messages_from_rows, ListingRow, MessageRow, NewListingRow, NewMessageRow,
    ProfileRow, RemoteUser, UserMetadata,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::types::{TimberError, UserRole};

/// Operations the marketplace needs from a live backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Listings joined with landowner profiles, newest first, as raw rows
    async fn select_listings(&self) -> Result<Vec<Value>, TimberError>;

    /// Insert one listing and return the stored rows
    async fn insert_listing(&self, row: &NewListingRow) -> Result<Vec<Value>, TimberError>;

    /// Messages sent or received by a user, oldest first
    async fn select_messages(&self, user_id: &str) -> Result<Vec<MessageRow>, TimberError>;

    async fn insert_message(&self, row: &NewMessageRow) -> Result<(), TimberError>;

    /// The account behind the current session, if any
    async fn current_user(&self) -> Result<Option<RemoteUser>, TimberError>;

    /// Record the onboarding role in session metadata and the public profile
    async fn update_role(&self, user_id: &str, role: UserRole) -> Result<(), TimberError>;

    /// Email a one-time sign-in link
    async fn send_magic_link(&self, email: &str) -> Result<(), TimberError>;

    async fn sign_out(&self) -> Result<(), TimberError>;

    /// Where to send the user to sign in with an OAuth provider
    fn oauth_authorize_url(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> Result<String, TimberError>;

    /// Get the name of the backend
    fn source_name(&self) -> &'static str;
}
