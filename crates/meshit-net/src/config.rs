//! Connection manager configuration.

use std::time::Duration;

use meshit_proto::limits::{MAX_CONNECT_RETRIES, MAX_FRAME_BYTES};

/// Tunables for link management.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// Maximum dial attempts before a connect fails.
    /// Default: 3.
    pub max_retries: u32,

    /// Backoff unit; attempt `n` sleeps `2^n` of these before retrying.
    /// Default: 1 second.
    pub backoff_unit: Duration,

    /// Hard cap on a single frame. Links sending larger length prefixes
    /// are dropped. Default: 10 MiB.
    pub max_frame_bytes: usize,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_CONNECT_RETRIES,
            backoff_unit: Duration::from_secs(1),
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }
}

impl NetConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum dial attempts.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the backoff unit.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Set the per-frame size cap.
    pub fn with_max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }
}
