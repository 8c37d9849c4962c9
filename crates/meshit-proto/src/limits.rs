//! Protocol limits and timing constants.

use std::time::Duration;

/// Maximum number of relay hops a packet may traverse.
pub const MAX_HOPS: u8 = 7;

/// TTL assigned to freshly originated mesh packets.
pub const DEFAULT_TTL: u8 = 7;

/// File-chunk receivers acknowledge every Nth chunk.
pub const ACK_WINDOW: u32 = 10;

/// Upper bound on a single length-prefixed frame (10 MiB).
pub const MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// Non-direct routing-table entries expire this long after `last_seen`.
pub const ROUTE_EXPIRY: Duration = Duration::from_secs(5 * 60);

/// Interval between routing-table sweeps.
pub const ROUTE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Maximum entries in the seen-message cache before eviction.
pub const SEEN_CACHE_MAX: usize = 10_000;

/// Maximum queued store-and-forward records per destination.
pub const STORE_FORWARD_PER_PEER: usize = 100;

/// Queued store-and-forward records expire after this long.
pub const QUEUE_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Maximum outbound dial attempts before giving up.
pub const MAX_CONNECT_RETRIES: u32 = 3;

/// Established sessions are dropped after the peer has been gone this long.
pub const SESSION_LIFETIME: Duration = Duration::from_secs(12 * 60 * 60);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_ttl_consistency() {
        // A packet starting at DEFAULT_TTL with hop 0 satisfies
        // hop + ttl <= MAX_HOPS at every relay.
        assert!(DEFAULT_TTL <= MAX_HOPS);
    }

    #[test]
    fn test_expiries_are_sane() {
        assert!(ROUTE_SWEEP_INTERVAL < ROUTE_EXPIRY);
        assert_eq!(QUEUE_EXPIRY.as_secs(), 604_800);
    }
}
