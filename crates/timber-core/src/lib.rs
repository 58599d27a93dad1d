//! ============================================================================
//! TIMBER-CORE: Hunting Land Marketplace
//! ============================================================================
//! This crate handles all marketplace logic for Timber:
//! - Connection resolution between a live backend and simulated mode
//! - Local persistence via redb for simulated users and listings
//! - Listing fetch/insert over local and remote sources
//! - Search filtering, role-gated views, messaging, and mock payments
//! ============================================================================

pub mod access;
pub mod backend;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod filter;
pub mod marketplace;
pub mod messaging;
pub mod payment;
pub mod repository;
pub mod seed;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use access::{AccessLevel, Feature, RoleGate, Route, View};
pub use backend::{Backend, SupabaseBackend};
pub use config::{Connection, Credentials, TimberConfig};
pub use db::{LocalStore, StoreStats};
pub use filter::{apply_filters, SearchFilters};
pub use marketplace::{Marketplace, MarketplaceStatus};
pub use messaging::{DiscardMessages, MessagePoller, MessageSink, PollerHandle};
pub use payment::{CardDetails, MockPaymentProcessor, PaymentError, PaymentReceipt};
pub use repository::{InsertError, ListingDraft, ListingRepository};
pub use session::{Session, SessionPhase, SignInOutcome};
