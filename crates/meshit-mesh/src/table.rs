//! Best-known-route table.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// One route: which direct peer to hand packets for a destination.
#[derive(Clone, Debug)]
pub struct RouteEntry {
    /// Fingerprint of the direct peer serving as next hop.
    pub next_hop: String,
    /// Path length in hops.
    pub hop_count: u8,
    /// Last time evidence for this route was observed.
    pub last_seen: Instant,
}

/// Mapping `destination fingerprint → route`, safe for concurrent use.
///
/// Entries improve monotonically: an update only lands when its hop count
/// is strictly smaller than the existing route's, except that refreshing an
/// equal-cost route bumps `last_seen`.
#[derive(Default)]
pub struct RoutingTable {
    entries: RwLock<HashMap<String, RouteEntry>>,
}

impl RoutingTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed (or reassert) a direct peer: destination routes to itself at
    /// one hop.
    pub fn insert_direct(&self, fingerprint: &str) {
        let mut entries = self.entries.write().expect("routing table poisoned");
        entries.insert(
            fingerprint.to_string(),
            RouteEntry {
                next_hop: fingerprint.to_string(),
                hop_count: 1,
                last_seen: Instant::now(),
            },
        );
    }

    /// Learn a route if it is strictly shorter than what we have; an
    /// equal-cost route through the same hop refreshes `last_seen`.
    ///
    /// Returns `true` when the table changed.
    pub fn update_if_shorter(&self, destination: &str, next_hop: &str, hop_count: u8) -> bool {
        let mut entries = self.entries.write().expect("routing table poisoned");
        if let Some(existing) = entries.get_mut(destination) {
            if hop_count > existing.hop_count {
                return false;
            }
            if hop_count == existing.hop_count {
                if existing.next_hop == next_hop {
                    existing.last_seen = Instant::now();
                }
                return false;
            }
        }
        entries.insert(
            destination.to_string(),
            RouteEntry {
                next_hop: next_hop.to_string(),
                hop_count,
                last_seen: Instant::now(),
            },
        );
        true
    }

    /// The route for a destination, if any.
    pub fn route(&self, destination: &str) -> Option<RouteEntry> {
        self.entries
            .read()
            .expect("routing table poisoned")
            .get(destination)
            .cloned()
    }

    /// Drop the route for a destination.
    pub fn remove(&self, destination: &str) {
        self.entries
            .write()
            .expect("routing table poisoned")
            .remove(destination);
    }

    /// Remove entries older than `expiry`, keeping those `is_direct` says
    /// are direct peers. Returns how many were removed.
    pub fn sweep(&self, expiry: Duration, is_direct: impl Fn(&str) -> bool) -> usize {
        let mut entries = self.entries.write().expect("routing table poisoned");
        let before = entries.len();
        entries.retain(|destination, entry| {
            is_direct(destination) || entry.last_seen.elapsed() < expiry
        });
        before - entries.len()
    }

    /// Number of known routes.
    pub fn len(&self) -> usize {
        self.entries.read().expect("routing table poisoned").len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_peer_routes_to_itself() {
        let table = RoutingTable::new();
        table.insert_direct("aa");
        let route = table.route("aa").unwrap();
        assert_eq!(route.next_hop, "aa");
        assert_eq!(route.hop_count, 1);
    }

    #[test]
    fn test_strictly_shorter_wins() {
        let table = RoutingTable::new();
        assert!(table.update_if_shorter("cc", "bb", 3));
        // Longer or equal routes are ignored.
        assert!(!table.update_if_shorter("cc", "dd", 3));
        assert!(!table.update_if_shorter("cc", "dd", 4));
        assert_eq!(table.route("cc").unwrap().next_hop, "bb");

        // Strictly shorter replaces.
        assert!(table.update_if_shorter("cc", "ee", 2));
        assert_eq!(table.route("cc").unwrap().next_hop, "ee");
    }

    #[test]
    fn test_equal_route_refreshes_last_seen() {
        let table = RoutingTable::new();
        table.update_if_shorter("cc", "bb", 2);
        let first = table.route("cc").unwrap().last_seen;
        table.update_if_shorter("cc", "bb", 2);
        assert!(table.route("cc").unwrap().last_seen >= first);
    }

    #[test]
    fn test_sweep_keeps_direct_peers() {
        let table = RoutingTable::new();
        table.insert_direct("aa");
        table.update_if_shorter("cc", "aa", 2);

        // Everything is stale at zero expiry, but direct peers survive.
        let removed = table.sweep(Duration::from_secs(0), |fp| fp == "aa");
        assert_eq!(removed, 1);
        assert!(table.route("aa").is_some());
        assert!(table.route("cc").is_none());
    }

    #[test]
    fn test_sweep_keeps_fresh_entries() {
        let table = RoutingTable::new();
        table.update_if_shorter("cc", "aa", 2);
        assert_eq!(table.sweep(Duration::from_secs(300), |_| false), 0);
        assert!(table.route("cc").is_some());
    }
}
