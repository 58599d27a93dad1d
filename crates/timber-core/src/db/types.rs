//! ============================================================================
//! Database Types - Summaries of the local store
//! ============================================================================

use serde::{Deserialize, Serialize};

/// Snapshot of what the local store currently holds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub local_records: usize,
    pub session_records: usize,
    pub simulated_listings: usize,
    pub has_simulated_user: bool,
    pub simulation_forced: bool,
}
