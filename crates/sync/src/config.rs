//! Timing knobs for polling, refetch and prefetch

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime settings of the sync layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Delay between convergence poll attempts
    pub poll_interval: Duration,
    /// Poll attempts before pending ids are force-cleared
    pub poll_max_attempts: u32,
    /// Background refetch period while work is in flight
    pub refetch_interval: Duration,
    pub prefetch_enabled: bool,
    /// Age after which a cached listing is fetched again
    pub stale_after: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            poll_max_attempts: 10,
            refetch_interval: Duration::from_millis(4000),
            prefetch_enabled: true,
            stale_after: Duration::from_secs(120),
        }
    }
}
