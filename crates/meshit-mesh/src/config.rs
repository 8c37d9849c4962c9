//! Mesh engine configuration.

use std::time::Duration;

use meshit_proto::limits::{DEFAULT_TTL, ROUTE_EXPIRY, ROUTE_SWEEP_INTERVAL, SEEN_CACHE_MAX};

/// Tunables for the routing engine and channel service.
#[derive(Debug, Clone)]
pub struct MeshConfig {
    /// TTL for freshly originated packets. Default: 7.
    pub default_ttl: u8,

    /// Seen-cache capacity. Default: 10,000.
    pub seen_cache_max: usize,

    /// Non-direct routes expire this long after last evidence.
    /// Default: 5 minutes.
    pub route_expiry: Duration,

    /// Interval between routing-table sweeps. Default: 60 seconds.
    pub sweep_interval: Duration,

    /// Interval between channel announcements. Default: 30 seconds.
    pub announce_interval: Duration,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            seen_cache_max: SEEN_CACHE_MAX,
            route_expiry: ROUTE_EXPIRY,
            sweep_interval: ROUTE_SWEEP_INTERVAL,
            announce_interval: Duration::from_secs(30),
        }
    }
}

impl MeshConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TTL for originated packets.
    pub fn with_default_ttl(mut self, ttl: u8) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the seen-cache capacity.
    pub fn with_seen_cache_max(mut self, max: usize) -> Self {
        self.seen_cache_max = max;
        self
    }

    /// Set the route expiry window.
    pub fn with_route_expiry(mut self, expiry: Duration) -> Self {
        self.route_expiry = expiry;
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the channel announce interval.
    pub fn with_announce_interval(mut self, interval: Duration) -> Self {
        self.announce_interval = interval;
        self
    }
}
