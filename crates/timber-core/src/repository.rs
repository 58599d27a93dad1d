//! ============================================================================
//! Listing Repository - Local and remote listing sources behind one API
//! ============================================================================
//! Fetch always includes the local store; when connected, remote rows are
//! appended after the local ones. Remote failures degrade to local-only.
//!
//! Merge invariant: ids are unique in the fetched collection. When the same id
//! appears in both sources the remote record wins and the local one is dropped;
//! duplicate ids within a single source keep their first occurrence.
//! ============================================================================

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{listings_from_rows, Backend, NewListingRow};
use crate::config::Connection;
use crate::db::LocalStore;
use crate::types::{image_placeholder, Coordinates, Landowner, Listing, TimberError, User};

/// Prefix of ids assigned to listings created offline
pub const LOCAL_ID_PREFIX: &str = "local-";
const LOCAL_ID_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Features every new submission starts with
pub const DEFAULT_FEATURES: [&str; 2] = ["Blind Provided", "Vehicle Access"];

/// Random lowercase base-36 token
pub fn random_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// A landowner's property submission, before an id is assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingDraft {
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
    pub coordinates: Option<Coordinates>,
}

impl Default for ListingDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            location: String::new(),
            price_per_day: 0,
            description: String::new(),
            game_types: Vec::new(),
            sporting_arms: Vec::new(),
            acreage: 0,
            features: DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect(),
            accommodations: Vec::new(),
            images: Vec::new(),
            coordinates: None,
        }
    }
}

impl ListingDraft {
    pub fn validate(&self) -> Result<(), TimberError> {
        if self.title.trim().is_empty() {
            return Err(TimberError::InvalidInput("title is required".into()));
        }
        if self.location.trim().is_empty() {
            return Err(TimberError::InvalidInput("location is required".into()));
        }
        if self.acreage == 0 {
            return Err(TimberError::InvalidInput("acreage must be positive".into()));
        }
        Ok(())
    }

    /// Give the draft a placeholder picture when it has none
    fn with_images(mut self) -> Self {
        if self.images.is_empty() {
            self.images.push(image_placeholder(&random_token(LOCAL_ID_LEN)));
        }
        self
    }

    fn into_listing(self, id: String, landowner: Landowner) -> Listing {
        Listing {
            id,
            title: self.title,
            location: self.location,
            price_per_day: self.price_per_day,
            description: self.description,
            game_types: self.game_types,
            sporting_arms: self.sporting_arms,
            acreage: self.acreage,
            features: self.features,
            accommodations: self.accommodations,
            images: self.images,
            landowner,
            rating: 5.0,
            reviews: 0,
            is_verified: false,
            coordinates: self.coordinates,
        }
    }

    fn to_row(&self, landowner_id: &str) -> NewListingRow {
        NewListingRow {
            title: self.title.clone(),
            location: self.location.clone(),
            price_per_day: self.price_per_day,
            description: self.description.clone(),
            game_types: self.game_types.clone(),
            sporting_arms: self.sporting_arms.clone(),
            acreage: self.acreage,
            features: self.features.clone(),
            accommodations: self.accommodations.clone(),
            images: self.images.clone(),
            landowner_id: landowner_id.to_string(),
            coordinates: NewListingRow::coordinates_or_fallback(self.coordinates),
        }
    }
}

/// Submission failure; the draft comes back so the form can stay open
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{source}")]
pub struct InsertError {
    pub draft: ListingDraft,
    pub source: TimberError,
}

/// Listing access over the local store and, when connected, the backend
pub struct ListingRepository {
    connection: Arc<Connection>,
    store: Arc<LocalStore>,
    backend: Option<Arc<dyn Backend>>,
}

impl ListingRepository {
    pub fn new(
        connection: Arc<Connection>,
        store: Arc<LocalStore>,
        backend: Option<Arc<dyn Backend>>,
    ) -> Self {
        Self {
            connection,
            store,
            backend,
        }
    }

    /// The backend to use, only when the connection is live
    fn live_backend(&self) -> Option<&Arc<dyn Backend>> {
        if self.connection.is_connected() {
            self.backend.as_ref()
        } else {
            None
        }
    }

    /// Local listings followed by remote ones. Never fails.
    pub async fn fetch_listings(&self) -> Vec<Listing> {
        let local = self.store.simulated_listings();

        let Some(backend) = self.live_backend() else {
            debug!("Simulated mode: {} local listings", local.len());
            return dedupe(local);
        };

        match backend.select_listings().await {
            Ok(rows) => {
                let remote = listings_from_rows(rows);
                debug!(
                    "Fetched {} local and {} {} listings",
                    local.len(),
                    remote.len(),
                    backend.source_name()
                );
                merge_sources(local, remote)
            }
            Err(e) => {
                warn!("Live listing fetch failed, showing local listings only: {}", e);
                dedupe(local)
            }
        }
    }

    /// Submit a draft on behalf of `user`.
    ///
    /// Simulated mode, or a simulated identity, stores the listing locally
    /// under a fresh `local-` id. Otherwise the backend assigns the id.
    pub async fn insert_listing(
        &self,
        draft: ListingDraft,
        user: &User,
    ) -> Result<Listing, InsertError> {
        if let Err(source) = draft.validate() {
            return Err(InsertError { draft, source });
        }
        let draft = draft.with_images();

        let backend = match self.live_backend() {
            Some(backend) if !user.is_simulated() => backend,
            _ => return self.insert_local(draft, user),
        };

        let row = draft.to_row(&user.id);
        let rows = match backend.insert_listing(&row).await {
            Ok(rows) => rows,
            Err(source) => {
                warn!("Listing insert rejected: {}", source);
                return Err(InsertError { draft, source });
            }
        };

        let Some(stored) = listings_from_rows(rows).into_iter().next() else {
            return Err(InsertError {
                draft,
                source: TimberError::Backend {
                    status: 200,
                    message: "insert returned no rows".into(),
                },
            });
        };

        info!("Listing {} created on {}", stored.id, backend.source_name());
        Ok(Listing {
            landowner: Landowner::from_user(user),
            ..stored
        })
    }

    fn insert_local(&self, draft: ListingDraft, user: &User) -> Result<Listing, InsertError> {
        let id = format!("{}{}", LOCAL_ID_PREFIX, random_token(LOCAL_ID_LEN));
        let listing = draft.clone().into_listing(id, Landowner::from_user(user));

        if let Err(e) = self.store.save_simulated_listing(&listing) {
            return Err(InsertError {
                draft,
                source: TimberError::Store(format!("{:#}", e)),
            });
        }

        info!("Listing {} saved to local store", listing.id);
        Ok(listing)
    }

    /// Set the verification flag; persisted when the listing lives locally
    pub fn mark_verified(&self, listing_id: &str) -> Result<bool, TimberError> {
        Ok(self
            .store
            .update_simulated_listing(listing_id, |l| l.is_verified = true)?)
    }

    /// Remove a listing from the local store if it lives there
    pub fn delete_local(&self, listing_id: &str) -> Result<bool, TimberError> {
        Ok(self.store.delete_simulated_listing(listing_id)?)
    }
}

/// Keep the first occurrence of each id
fn dedupe(listings: Vec<Listing>) -> Vec<Listing> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|l| seen.insert(l.id.clone()))
        .collect()
}

/// Local-then-remote, remote winning on id collision
pub fn merge_sources(local: Vec<Listing>, remote: Vec<Listing>) -> Vec<Listing> {
    let remote = dedupe(remote);
    let remote_ids: HashSet<&str> = remote.iter().map(|l| l.id.as_str()).collect();

    let mut merged: Vec<Listing> = dedupe(local)
        .into_iter()
        .filter(|l| {
            let collides = remote_ids.contains(l.id.as_str());
            if collides {
                debug!("Listing {} exists remotely, dropping local copy", l.id);
            }
            !collides
        })
        .collect();
    merged.extend(remote);
    merged
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::{MessageRow, NewMessageRow, RemoteUser};
    use crate::seed::seed_listings;
    use crate::types::UserRole;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory backend double
    #[derive(Default)]
    pub(crate) struct MockBackend {
        pub listings: Mutex<Vec<Value>>,
        pub messages: Mutex<Vec<MessageRow>>,
        pub sent: Mutex<Vec<NewMessageRow>>,
        pub inserted: Mutex<Vec<NewListingRow>>,
        pub session_user: Mutex<Option<RemoteUser>>,
        pub roles: Mutex<Vec<(String, UserRole)>>,
        pub magic_links: Mutex<Vec<String>>,
        pub sign_outs: Mutex<usize>,
        pub fail_reads: bool,
        pub fail_writes: Option<TimberError>,
    }

    impl MockBackend {
        pub(crate) fn failing_reads() -> Self {
            Self {
                fail_reads: true,
                ..Self::default()
            }
        }

        pub(crate) fn failing_writes(error: TimberError) -> Self {
            Self {
                fail_writes: Some(error),
                ..Self::default()
            }
        }

        fn write_result(&self) -> Result<(), TimberError> {
            match &self.fail_writes {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        async fn select_listings(&self) -> Result<Vec<Value>, TimberError> {
            if self.fail_reads {
                return Err(TimberError::Network("connection refused".into()));
            }
            Ok(self.listings.lock().unwrap().clone())
        }

        async fn insert_listing(&self, row: &NewListingRow) -> Result<Vec<Value>, TimberError> {
            self.write_result()?;
            let mut stored = serde_json::to_value(row).unwrap();
            let id = format!("remote-{}", self.inserted.lock().unwrap().len() + 1);
            stored["id"] = json!(id);
            self.inserted.lock().unwrap().push(row.clone());
            self.listings.lock().unwrap().insert(0, stored.clone());
            Ok(vec![stored])
        }

        async fn select_messages(&self, _user_id: &str) -> Result<Vec<MessageRow>, TimberError> {
            if self.fail_reads {
                return Err(TimberError::Network("connection refused".into()));
            }
            Ok(self.messages.lock().unwrap().clone())
        }

        async fn insert_message(&self, row: &NewMessageRow) -> Result<(), TimberError> {
            self.write_result()?;
            self.sent.lock().unwrap().push(row.clone());
            Ok(())
        }

        async fn current_user(&self) -> Result<Option<RemoteUser>, TimberError> {
            if self.fail_reads {
                return Err(TimberError::Network("connection refused".into()));
            }
            Ok(self.session_user.lock().unwrap().clone())
        }

        async fn update_role(&self, user_id: &str, role: UserRole) -> Result<(), TimberError> {
            self.write_result()?;
            self.roles.lock().unwrap().push((user_id.to_string(), role));
            Ok(())
        }

        async fn send_magic_link(&self, email: &str) -> Result<(), TimberError> {
            self.write_result()?;
            self.magic_links.lock().unwrap().push(email.to_string());
            Ok(())
        }

        async fn sign_out(&self) -> Result<(), TimberError> {
            *self.sign_outs.lock().unwrap() += 1;
            Ok(())
        }

        fn oauth_authorize_url(
            &self,
            provider: &str,
            _redirect_to: Option<&str>,
        ) -> Result<String, TimberError> {
            Ok(format!("https://mock.example/authorize?provider={}", provider))
        }

        fn source_name(&self) -> &'static str {
            "mock"
        }
    }

    pub(crate) fn temp_store() -> (TempDir, Arc<LocalStore>) {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::open(Some(&dir.path().join("timber.redb"))).unwrap();
        (dir, Arc::new(store))
    }

    pub(crate) fn live_connection() -> Arc<Connection> {
        Arc::new(Connection::new(
            Some(crate::config::Credentials {
                url: "https://abc.supabase.co".into(),
                anon_key: "anon".into(),
            }),
            false,
        ))
    }

    pub(crate) fn landowner(id: &str) -> User {
        User {
            id: id.into(),
            name: "Bill Landowner".into(),
            email: "landowner@example.com".into(),
            role: Some(UserRole::Landowner),
            is_member: false,
        }
    }

    fn draft() -> ListingDraft {
        ListingDraft {
            title: "Hidden Hollow".into(),
            location: "Brown County, Indiana".into(),
            price_per_day: 275,
            description: "Hardwood ridges".into(),
            game_types: vec!["Turkey".into()],
            acreage: 160,
            ..ListingDraft::default()
        }
    }

    fn remote_row(id: &str, title: &str) -> Value {
        json!({ "id": id, "title": title, "price_per_day": 100, "acreage": 50 })
    }

    #[test]
    fn test_random_token_shape() {
        let token = random_token(9);
        assert_eq!(token.len(), 9);
        assert!(token.bytes().all(|b| BASE36.contains(&b)));
    }

    #[test]
    fn test_draft_defaults_and_validation() {
        let d = ListingDraft::default();
        assert_eq!(d.features, vec!["Blind Provided", "Vehicle Access"]);
        assert!(d.validate().is_err());
        assert!(draft().validate().is_ok());
        let zero_acres = ListingDraft { acreage: 0, ..draft() };
        assert!(matches!(zero_acres.validate(), Err(TimberError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_simulated_roundtrip() {
        let (_dir, store) = temp_store();
        let repo = ListingRepository::new(Arc::new(Connection::simulated()), store, None);

        let created = repo
            .insert_listing(draft(), &landowner("mock-landowner-ab12c"))
            .await
            .unwrap();
        assert!(created.id.starts_with(LOCAL_ID_PREFIX));
        assert_eq!(created.id.len(), LOCAL_ID_PREFIX.len() + 9);
        assert_eq!(created.landowner.id, "mock-landowner-ab12c");
        assert_eq!(created.images.len(), 1);

        let fetched = repo.fetch_listings().await;
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, created.id);
        assert_eq!(fetched[0].title, "Hidden Hollow");
        assert_eq!(fetched[0].price_per_day, 275);
    }

    #[tokio::test]
    async fn test_connected_fetch_appends_remote_after_local() {
        let (_dir, store) = temp_store();
        store.save_simulated_listing(&seed_listings()[0]).unwrap();
        let backend = MockBackend::default();
        backend
            .listings
            .lock()
            .unwrap()
            .extend([remote_row("r1", "Remote One"), remote_row("r2", "Remote Two")]);

        let repo = ListingRepository::new(live_connection(), store, Some(Arc::new(backend)));
        let ids: Vec<_> = repo.fetch_listings().await.into_iter().map(|l| l.id).collect();
        assert_eq!(ids, vec!["1", "r1", "r2"]);
    }

    #[tokio::test]
    async fn test_remote_failure_degrades_to_local() {
        let (_dir, store) = temp_store();
        store.save_simulated_listing(&seed_listings()[1]).unwrap();
        let repo = ListingRepository::new(
            live_connection(),
            store,
            Some(Arc::new(MockBackend::failing_reads())),
        );
        let listings = repo.fetch_listings().await;
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].id, "2");
    }

    #[tokio::test]
    async fn test_backend_ignored_when_simulation_forced() {
        let (_dir, store) = temp_store();
        let backend = MockBackend::default();
        backend.listings.lock().unwrap().push(remote_row("r1", "Remote"));
        let forced = Arc::new(Connection::new(
            live_connection().live_credentials().cloned(),
            true,
        ));
        let repo = ListingRepository::new(forced, store, Some(Arc::new(backend)));
        assert!(repo.fetch_listings().await.is_empty());
    }

    #[test]
    fn test_merge_remote_wins_on_collision() {
        let mut local_copy = seed_listings().remove(0);
        local_copy.title = "Stale local copy".into();
        let mut remote_copy = seed_listings().remove(0);
        remote_copy.title = "Fresh remote copy".into();
        let other_local = seed_listings().remove(1);

        let merged = merge_sources(vec![local_copy, other_local], vec![remote_copy]);
        let titles: Vec<_> = merged.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["Rolling Plains Quail Ranch", "Fresh remote copy"]);
    }

    #[tokio::test]
    async fn test_connected_insert_uses_backend_id() {
        let (_dir, store) = temp_store();
        let backend = Arc::new(MockBackend::default());
        let repo = ListingRepository::new(live_connection(), store.clone(), Some(backend.clone()));

        let created = repo.insert_listing(draft(), &landowner("user-77")).await.unwrap();
        assert_eq!(created.id, "remote-1");
        assert_eq!(created.landowner.name, "Bill Landowner");
        assert!(store.simulated_listings().is_empty());

        let sent = backend.inserted.lock().unwrap();
        assert_eq!(sent[0].landowner_id, "user-77");
        assert_eq!(sent[0].coordinates, crate::types::FALLBACK_COORDINATES);
    }

    #[tokio::test]
    async fn test_simulated_identity_stays_local_when_connected() {
        let (_dir, store) = temp_store();
        let backend = Arc::new(MockBackend::default());
        let repo = ListingRepository::new(live_connection(), store.clone(), Some(backend.clone()));

        let created = repo
            .insert_listing(draft(), &landowner("mock-landowner-zz9zz"))
            .await
            .unwrap();
        assert!(created.id.starts_with(LOCAL_ID_PREFIX));
        assert!(backend.inserted.lock().unwrap().is_empty());
        assert_eq!(store.simulated_listings().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_failure_returns_draft() {
        let (_dir, store) = temp_store();
        let error = TimberError::Backend {
            status: 403,
            message: "row-level security".into(),
        };
        let repo = ListingRepository::new(
            live_connection(),
            store,
            Some(Arc::new(MockBackend::failing_writes(error.clone()))),
        );

        let err = repo.insert_listing(draft(), &landowner("user-1")).await.unwrap_err();
        assert_eq!(err.source, error);
        assert_eq!(err.draft.title, "Hidden Hollow");
    }
}
