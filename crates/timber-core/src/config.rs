//! ============================================================================
//! Configuration & Connection Resolution
//! ============================================================================
//! Decides once per marketplace lifetime whether to run against the live
//! backend or the local simulated store.
//!
//! connected = credentials well-formed AND simulation not forced
//!
//! A missing or placeholder credential routes to simulated mode for the whole
//! lifetime; there is no retry. Changing the override takes effect only when
//! the marketplace is reopened.
//! ============================================================================

use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::db::LocalStore;

/// Default cadence of the background message refresh
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Substrings marking an unconfigured template URL
const PLACEHOLDER_MARKERS: [&str; 2] = ["your_supabase_project_url", "placeholder"];

/// Remote backend credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub anon_key: String,
}

impl Credentials {
    /// Both parts present and the URL is not a template placeholder
    pub fn is_well_formed(&self) -> bool {
        !self.url.trim().is_empty()
            && !self.anon_key.trim().is_empty()
            && !PLACEHOLDER_MARKERS.iter().any(|m| self.url.contains(m))
    }
}

/// Process configuration, read from the environment at startup
#[derive(Debug, Clone)]
pub struct TimberConfig {
    pub credentials: Option<Credentials>,
    /// Bearer token of an already established remote session
    pub access_token: Option<String>,
    pub db_path: Option<PathBuf>,
    pub poll_interval: Duration,
}

impl Default for TimberConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            access_token: None,
            db_path: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl TimberConfig {
    /// Load `.env` if present, then read the environment
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded: {}", e);
        }

        let url = env_any(&["TIMBER_SUPABASE_URL", "VITE_SUPABASE_URL"]);
        let anon_key = env_any(&["TIMBER_SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"]);
        let credentials = match (url, anon_key) {
            (None, None) => None,
            (url, anon_key) => Some(Credentials {
                url: url.unwrap_or_default(),
                anon_key: anon_key.unwrap_or_default(),
            }),
        };

        let poll_interval = env_any(&["TIMBER_POLL_INTERVAL_SECS"])
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS));

        Self {
            credentials,
            access_token: env_any(&["TIMBER_ACCESS_TOKEN"]),
            db_path: env_any(&["TIMBER_DB_PATH"]).map(PathBuf::from),
            poll_interval,
        }
    }

    pub fn with_credentials(mut self, url: &str, anon_key: &str) -> Self {
        self.credentials = Some(Credentials {
            url: url.to_string(),
            anon_key: anon_key.to_string(),
        });
        self
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }
}

fn env_any(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

/// Resolved connection state, fixed for the lifetime of a marketplace
#[derive(Debug, Clone)]
pub struct Connection {
    credentials: Option<Credentials>,
    simulation_forced: bool,
}

impl Connection {
    /// Combine configured credentials with the session override in `store`
    pub fn resolve(config: &TimberConfig, store: &LocalStore) -> Self {
        let connection = Self::new(config.credentials.clone(), store.simulation_forced());
        info!(
            "Connection resolved: {} (keys {}, simulation {})",
            connection.mode_label(),
            if connection.has_keys() { "found" } else { "missing" },
            if connection.simulation_forced { "forced" } else { "not forced" },
        );
        connection
    }

    pub fn new(credentials: Option<Credentials>, simulation_forced: bool) -> Self {
        Self {
            credentials: credentials.filter(Credentials::is_well_formed),
            simulation_forced,
        }
    }

    /// Always-simulated connection
    pub fn simulated() -> Self {
        Self::new(None, false)
    }

    pub fn has_keys(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn simulation_forced(&self) -> bool {
        self.simulation_forced
    }

    pub fn is_connected(&self) -> bool {
        self.has_keys() && !self.simulation_forced
    }

    /// Credentials usable for live calls, only when connected
    pub fn live_credentials(&self) -> Option<&Credentials> {
        if self.simulation_forced {
            None
        } else {
            self.credentials.as_ref()
        }
    }

    pub fn mode_label(&self) -> &'static str {
        if self.is_connected() {
            "Live"
        } else {
            "Simulated"
        }
    }
}
