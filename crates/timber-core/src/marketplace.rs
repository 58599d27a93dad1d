//! ============================================================================
//! Marketplace - Application facade
//! ============================================================================
//! Wires connection, store, backend, session, repository, and messaging
//! together and holds the in-memory listing collection and filter state.
//!
//! Startup order: resolve connection → hydrate session → fetch listings.
//! An empty fetch falls back to the seed catalogue.
//!
//! Switching the forced-simulation override rebuilds every component except
//! the local store, the same as reloading the application.
//! ============================================================================

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::access::{Feature, RoleGate, Route, View};
use crate::backend::{Backend, SupabaseBackend};
use crate::config::{Connection, TimberConfig};
use crate::dashboard::{self, DashboardSummary};
use crate::db::{LocalStore, StorageArea, StoreStats};
use crate::filter::SearchFilters;
use crate::messaging::{DiscardMessages, MessagePoller, MessageService, MessageSink, PollerHandle};
use crate::payment::{CardDetails, MockPaymentProcessor, PaymentReceipt, MEMBERSHIP_PRICE_CENTS};
use crate::repository::{InsertError, ListingDraft, ListingRepository};
use crate::seed::seed_listings;
use crate::session::{Session, SessionPhase, SignInOutcome};
use crate::types::{AuthError, Conversation, Listing, TimberError, User, UserRole};

/// Snapshot for status displays
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceStatus {
    pub mode: &'static str,
    pub backend: Option<&'static str>,
    pub has_keys: bool,
    pub simulation_forced: bool,
    pub user: Option<User>,
    pub phase: String,
    pub listings: usize,
    pub store: StoreStats,
}

pub struct Marketplace {
    config: TimberConfig,
    connection: Arc<Connection>,
    store: Arc<LocalStore>,
    backend: Option<Arc<dyn Backend>>,
    /// Backend supplied by the caller; reused across reloads
    injected: Option<Arc<dyn Backend>>,
    session: Session,
    repository: ListingRepository,
    messages: Arc<MessageService>,
    payments: MockPaymentProcessor,
    listings: Vec<Listing>,
    filters: SearchFilters,
    poller: Option<PollerHandle>,
}

impl Marketplace {
    /// Open the store named by `config` and connect to the configured backend
    pub async fn start(config: TimberConfig) -> Result<Self, TimberError> {
        let store = Arc::new(LocalStore::open(config.db_path.as_deref())?);
        Ok(Self::assemble(config, store, None).await)
    }

    /// Use an already open store and, optionally, a caller-supplied backend
    pub async fn open_with(
        config: TimberConfig,
        store: Arc<LocalStore>,
        backend: Option<Arc<dyn Backend>>,
    ) -> Self {
        Self::assemble(config, store, backend).await
    }

    async fn assemble(
        config: TimberConfig,
        store: Arc<LocalStore>,
        injected: Option<Arc<dyn Backend>>,
    ) -> Self {
        let connection = Arc::new(Connection::resolve(&config, &store));
        let backend = match &injected {
            Some(backend) => Some(backend.clone()),
            None => build_backend(&config, &connection),
        };

        let session = Session::new(connection.clone(), store.clone(), backend.clone());
        let repository = ListingRepository::new(connection.clone(), store.clone(), backend.clone());
        let messages = Arc::new(MessageService::new(connection.clone(), backend.clone()));

        let mut marketplace = Self {
            config,
            connection,
            store,
            backend,
            injected,
            session,
            repository,
            messages,
            payments: MockPaymentProcessor::default(),
            listings: Vec::new(),
            filters: SearchFilters::default(),
            poller: None,
        };
        marketplace.session.hydrate().await;
        marketplace.refresh_listings().await;
        marketplace
    }

    /// Replace the payment processor (tests use a zero delay)
    pub fn with_payments(mut self, payments: MockPaymentProcessor) -> Self {
        self.payments = payments;
        self
    }

    // ========================================================================
    // Connection
    // ========================================================================

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Persist the override and rebuild everything on top of the same store
    pub async fn toggle_forced_simulation(mut self, force: bool) -> Result<Self, TimberError> {
        self.stop_message_polling().await;
        self.store.set_simulation_forced(force)?;
        info!("Reloading with simulation {}", if force { "forced" } else { "released" });

        Ok(self.reload().await)
    }

    /// Clear session storage (the simulation override included) and reload,
    /// like closing the browser tab
    pub async fn reset_session_storage(mut self) -> Result<Self, TimberError> {
        self.stop_message_polling().await;
        let cleared = self.store.clear(StorageArea::Session)?;
        info!("Session storage reset ({} records cleared)", cleared);
        Ok(self.reload().await)
    }

    async fn reload(self) -> Self {
        let Self {
            config,
            store,
            injected,
            payments,
            ..
        } = self;
        Self::assemble(config, store, injected).await.with_payments(payments)
    }

    pub fn status(&self) -> Result<MarketplaceStatus, TimberError> {
        Ok(MarketplaceStatus {
            mode: self.connection.mode_label(),
            backend: self
                .backend
                .as_ref()
                .filter(|_| self.connection.is_connected())
                .map(|b| b.source_name()),
            has_keys: self.connection.has_keys(),
            simulation_forced: self.connection.simulation_forced(),
            user: self.session.current_user(),
            phase: format!("{:?}", self.session.phase()),
            listings: self.listings.len(),
            store: self.store.stats()?,
        })
    }

    // ========================================================================
    // Listings & Search
    // ========================================================================

    /// Re-fetch from the repository; the seed catalogue stands in for an
    /// empty result
    pub async fn refresh_listings(&mut self) {
        let fetched = self.repository.fetch_listings().await;
        if fetched.is_empty() {
            info!("No listings available, showing seed catalogue");
            self.listings = seed_listings();
        } else {
            info!("Loaded {} listings", fetched.len());
            self.listings = fetched;
        }
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn listing(&self, id: &str) -> Option<&Listing> {
        self.listings.iter().find(|l| l.id == id)
    }

    fn require_listing(&self, id: &str) -> Result<&Listing, TimberError> {
        self.listing(id)
            .ok_or_else(|| TimberError::ListingNotFound(id.to_string()))
    }

    pub fn filters(&self) -> &SearchFilters {
        &self.filters
    }

    pub fn set_filters(&mut self, filters: SearchFilters) {
        debug!("Filters updated");
        self.filters = filters;
    }

    pub fn reset_filters(&mut self) {
        self.filters = SearchFilters::default();
    }

    pub fn filtered_listings(&self) -> Vec<Listing> {
        self.filters.apply(&self.listings)
    }

    // ========================================================================
    // Session
    // ========================================================================

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.current_user()
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn current_view(&self, route: &Route) -> View {
        RoleGate::resolve_view(self.current_user().as_ref(), route)
    }

    pub fn sign_in_simulated(&self, role: UserRole) -> Result<User, TimberError> {
        self.session.sign_in_simulated(role)
    }

    pub async fn sign_in_with_email(&self, email: &str) -> Result<SignInOutcome, AuthError> {
        self.session.sign_in_with_email(email).await
    }

    pub fn sign_in_with_google(
        &self,
        redirect_to: Option<&str>,
    ) -> Result<SignInOutcome, TimberError> {
        self.session.sign_in_with_google(redirect_to)
    }

    pub async fn select_role(&self, role: UserRole) -> Result<User, TimberError> {
        self.session.select_role(role).await
    }

    pub async fn logout(&mut self) -> Result<(), TimberError> {
        self.stop_message_polling().await;
        self.session.logout().await
    }

    fn gate(&self, feature: Feature) -> Result<User, TimberError> {
        let user = self.current_user();
        RoleGate::gate_feature(user.as_ref(), feature)?;
        user.ok_or(TimberError::NotSignedIn)
    }

    /// Charge the membership fee and unlock messaging for a hunter
    pub async fn upgrade_membership(
        &self,
        card: &CardDetails,
    ) -> Result<PaymentReceipt, TimberError> {
        self.gate(Feature::UpgradeMembership)?;
        let receipt = self
            .payments
            .charge(card, MEMBERSHIP_PRICE_CENTS)
            .await
            .map_err(|e| TimberError::Payment(e.to_string()))?;
        self.session.upgrade_membership()?;
        Ok(receipt)
    }

    // ========================================================================
    // Landowner & Admin Actions
    // ========================================================================

    /// Submit a property; on success it leads the collection
    pub async fn add_listing(&mut self, draft: ListingDraft) -> Result<Listing, InsertError> {
        let user = match self.gate(Feature::AddLand) {
            Ok(user) => user,
            Err(source) => return Err(InsertError { draft, source }),
        };

        let listing = self.repository.insert_listing(draft, &user).await?;
        self.listings.retain(|l| l.id != listing.id);
        self.listings.insert(0, listing.clone());
        Ok(listing)
    }

    pub fn my_listings(&self) -> Vec<&Listing> {
        match self.current_user() {
            Some(user) => dashboard::owned_by(&self.listings, &user),
            None => Vec::new(),
        }
    }

    pub fn dashboard_summary(&self) -> DashboardSummary {
        DashboardSummary::of(&self.listings)
    }

    pub fn admin_search(&self, term: &str) -> Vec<&Listing> {
        dashboard::admin_search(&self.listings, term)
    }

    pub fn verify_listing(&mut self, id: &str) -> Result<(), TimberError> {
        self.gate(Feature::VerifyListing)?;
        self.require_listing(id)?;
        if self.repository.mark_verified(id)? {
            debug!("Verification of {} persisted locally", id);
        }
        if let Some(listing) = self.listings.iter_mut().find(|l| l.id == id) {
            listing.is_verified = true;
        }
        info!("Listing {} verified", id);
        Ok(())
    }

    pub fn delete_listing(&mut self, id: &str) -> Result<Listing, TimberError> {
        self.gate(Feature::DeleteListing)?;
        let index = self
            .listings
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| TimberError::ListingNotFound(id.to_string()))?;
        let removed = self.listings.remove(index);
        if self.repository.delete_local(id)? {
            debug!("Removed {} from local store", id);
        }
        info!("Listing {} deleted", id);
        Ok(removed)
    }

    // ========================================================================
    // Saved Listings
    // ========================================================================

    /// Save or unsave; returns whether the listing is now saved
    pub fn toggle_saved(&self, id: &str) -> Result<bool, TimberError> {
        self.gate(Feature::SaveListing)?;
        self.require_listing(id)?;

        let mut ids = self.store.saved_listing_ids();
        let saved = match ids.iter().position(|saved| saved == id) {
            Some(pos) => {
                ids.remove(pos);
                false
            }
            None => {
                ids.push(id.to_string());
                true
            }
        };
        self.store.set_saved_listing_ids(&ids)?;
        Ok(saved)
    }

    /// Saved listings still present in the collection, in save order
    pub fn saved_listings(&self) -> Vec<&Listing> {
        let ids = self.store.saved_listing_ids();
        let present: HashSet<&str> = self.listings.iter().map(|l| l.id.as_str()).collect();
        ids.iter()
            .filter(|id| present.contains(id.as_str()))
            .filter_map(|id| self.listing(id))
            .collect()
    }

    // ========================================================================
    // Messaging
    // ========================================================================

    pub async fn conversations(&self) -> Result<Vec<Conversation>, TimberError> {
        let user = self.current_user().ok_or(TimberError::NotSignedIn)?;
        Ok(self.messages.conversations(&user).await)
    }

    /// Message about a listing; `to` defaults to the listing's landowner.
    /// Returns false when simulated and nothing was sent.
    pub async fn send_message(
        &self,
        listing_id: &str,
        to: Option<&str>,
        content: &str,
    ) -> Result<bool, TimberError> {
        let user = self.gate(Feature::DirectMessaging)?;
        let listing = self.require_listing(listing_id)?;
        let receiver = to.unwrap_or(&listing.landowner.id);
        self.messages.send(&user, listing_id, receiver, content).await
    }

    /// Start the periodic refresh with the discarding sink
    pub fn start_message_polling(&mut self) {
        self.start_message_polling_with(Arc::new(DiscardMessages));
    }

    pub fn start_message_polling_with(&mut self, sink: Arc<dyn MessageSink>) {
        if self.poller.is_some() {
            debug!("Message poller already running");
            return;
        }
        self.poller = Some(MessagePoller::spawn(
            self.messages.clone(),
            self.session.subscribe(),
            self.config.poll_interval,
            sink,
        ));
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(PollerHandle::is_running)
    }

    pub async fn stop_message_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop().await;
        }
    }
}

/// A live client, only when the connection is live
fn build_backend(config: &TimberConfig, connection: &Connection) -> Option<Arc<dyn Backend>> {
    if !connection.is_connected() {
        return None;
    }
    let credentials = connection.live_credentials()?;
    match SupabaseBackend::new(credentials, config.access_token.clone()) {
        Ok(backend) => {
            info!("Using live backend at {}", backend.base_url());
            Some(Arc::new(backend))
        }
        Err(e) => {
            warn!("Live backend unavailable, continuing simulated: {}", e);
            None
        }
    }
}
