//! The mesh routing engine.
//!
//! Every relayed packet runs the same pipeline: dedup against the seen
//! cache, TTL check, loop check against the relay trail, local-delivery
//! decision, then forwarding. Unicast traffic prefers the best known next
//! hop; broadcasts and unknown destinations flood to every direct peer not
//! already on the trail. Route discovery floods outward and the reply
//! retraces the recorded trail, teaching every node on the path a route to
//! the originator.
//!
//! The router owns the seen cache, routing table and direct-peer set. It
//! never calls the connection layer: transmissions are queued on an
//! [`Outbound`] channel the connection glue drains, which is also what
//! makes the relay logic testable without links.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use meshit_crypto::hash::fingerprint;
use meshit_proto::packet::{KEY_LEN, SENDER_ID_LEN};
use meshit_proto::{serialize, Packet, PacketType, RoutedMessage, BROADCAST_DESTINATION};

use crate::config::MeshConfig;
use crate::events::MeshEvent;
use crate::seen::SeenCache;
use crate::table::RoutingTable;
use crate::Result;

/// A transmission for the connection layer: send `bytes` to `address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Link address of the target peer.
    pub address: String,
    /// The serialized frame.
    pub bytes: Vec<u8>,
}

/// A direct peer as the router sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerHandle {
    /// The peer's fingerprint.
    pub fingerprint: String,
    /// The link address the connection manager knows it by.
    pub address: String,
    /// Last announced nickname, if any.
    pub nickname: Option<String>,
}

/// Loop-free, deduplicated, TTL-bounded relay engine.
pub struct MeshRouter {
    local_fingerprint: String,
    local_static_public: [u8; KEY_LEN],
    nickname: String,
    config: MeshConfig,
    sequence: AtomicU32,
    peers: RwLock<HashMap<String, PeerHandle>>,
    table: RoutingTable,
    seen: SeenCache,
    outbound: UnboundedSender<Outbound>,
    events: UnboundedSender<MeshEvent>,
}

impl MeshRouter {
    /// Create a router for the node with the given static public key.
    pub fn new(
        local_static_public: [u8; KEY_LEN],
        nickname: impl Into<String>,
        config: MeshConfig,
        outbound: UnboundedSender<Outbound>,
        events: UnboundedSender<MeshEvent>,
    ) -> Self {
        let seen = SeenCache::with_capacity(config.seen_cache_max);
        Self {
            local_fingerprint: fingerprint(&local_static_public),
            local_static_public,
            nickname: nickname.into(),
            config,
            sequence: AtomicU32::new(0),
            peers: RwLock::new(HashMap::new()),
            table: RoutingTable::new(),
            seen,
            outbound,
            events,
        }
    }

    /// This node's fingerprint.
    pub fn local_fingerprint(&self) -> &str {
        &self.local_fingerprint
    }

    // ------------------------------------------------------------------
    // Direct peers
    // ------------------------------------------------------------------

    /// Register a peer with an established link and session.
    ///
    /// Seeds the routing table with the one-hop route to it.
    pub fn register_direct_peer(
        &self,
        peer_fingerprint: &str,
        address: &str,
        nickname: Option<String>,
    ) {
        self.peers.write().expect("peer set poisoned").insert(
            peer_fingerprint.to_string(),
            PeerHandle {
                fingerprint: peer_fingerprint.to_string(),
                address: address.to_string(),
                nickname,
            },
        );
        self.table.insert_direct(peer_fingerprint);
        debug!(peer = peer_fingerprint, address, "direct peer registered");
    }

    /// Remove a peer whose link dropped.
    pub fn unregister_direct_peer(&self, peer_fingerprint: &str) {
        self.peers
            .write()
            .expect("peer set poisoned")
            .remove(peer_fingerprint);
        self.table.remove(peer_fingerprint);
        debug!(peer = peer_fingerprint, "direct peer unregistered");
    }

    /// The registered direct peers.
    pub fn direct_peers(&self) -> Vec<PeerHandle> {
        self.peers
            .read()
            .expect("peer set poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Best peer to hand traffic for a destination: the destination itself
    /// when directly connected, otherwise the routing-table next hop —
    /// which must itself still be a direct peer to count.
    pub fn next_hop(&self, destination_fingerprint: &str) -> Option<PeerHandle> {
        let peers = self.peers.read().expect("peer set poisoned");
        if let Some(handle) = peers.get(destination_fingerprint) {
            return Some(handle.clone());
        }
        let entry = self.table.route(destination_fingerprint)?;
        peers.get(&entry.next_hop).cloned()
    }

    /// Read access to the routing table (shells show it; tests assert it).
    pub fn routing_table(&self) -> &RoutingTable {
        &self.table
    }

    // ------------------------------------------------------------------
    // Ingest
    // ------------------------------------------------------------------

    /// Single entry point for every mesh packet the dispatcher hands us.
    pub fn ingest(&self, packet: &Packet) {
        if packet.packet_type == PacketType::RoutedMessage {
            match RoutedMessage::from_packet(packet) {
                Ok(message) => self.ingest_routed(&message),
                Err(e) => debug!(error = %e, "dropping malformed routed envelope"),
            }
            return;
        }
        self.ingest_packet(packet);
    }

    /// Relay pipeline for routed-message envelopes.
    pub fn ingest_routed(&self, message: &RoutedMessage) {
        if !self.seen.insert(&message.message_key()) {
            trace!(id = %message.id, "routing drop: duplicate");
            return;
        }
        if message.ttl == 0 {
            trace!(id = %message.id, "routing drop: ttl expired");
            return;
        }
        if message.seen_by_nodes.contains(&self.local_fingerprint) {
            trace!(id = %message.id, "routing drop: loop");
            return;
        }
        if message.destination == self.local_fingerprint {
            let _ = self.events.send(MeshEvent::MessageDelivered {
                message: message.clone(),
            });
            return;
        }
        self.forward_routed(message);
    }

    /// Relay pipeline for route control and channel packets.
    pub fn ingest_packet(&self, packet: &Packet) {
        // Opportunistic route learning happens even for packets the
        // pipeline later drops; the trail is evidence regardless.
        self.learn_routes(packet);

        if !self.seen.insert(&packet.message_key()) {
            trace!(key = %packet.message_key(), "routing drop: duplicate");
            return;
        }
        if packet.ttl == 0 {
            trace!(key = %packet.message_key(), "routing drop: ttl expired");
            return;
        }
        if packet.packet_type == PacketType::RouteReply {
            // A reply's trail is the return path, not a relay record, so
            // the loop check does not apply to it.
            self.handle_route_reply(packet);
            return;
        }
        if packet
            .route_history
            .iter()
            .any(|fp| fp == &self.local_fingerprint)
        {
            trace!(key = %packet.message_key(), "routing drop: loop");
            return;
        }
        if packet.packet_type == PacketType::RouteDiscovery {
            self.handle_route_discovery(packet);
            return;
        }

        let for_me = packet.is_for(&self.local_static_public);
        if for_me {
            self.deliver_local(packet);
            return;
        }
        if packet.is_broadcast() {
            self.deliver_local(packet);
        }
        self.forward_packet(packet);
    }

    // ------------------------------------------------------------------
    // Origination
    // ------------------------------------------------------------------

    /// Send an encrypted payload toward a destination fingerprint.
    pub fn send_routed(&self, mut message: RoutedMessage) -> Result<()> {
        message.ttl = self.config.default_ttl;
        message.seen_by_nodes.push(self.local_fingerprint.clone());
        self.seen.insert(&message.message_key());
        self.transmit_routed(&message)?;
        Ok(())
    }

    /// Broadcast a message into a channel.
    pub fn send_channel(&self, channel: &str, body: &str) {
        let packet = self
            .broadcast_packet(PacketType::ChannelMessage, body.as_bytes().to_vec())
            .with_channel(channel);
        self.seen.insert(&packet.message_key());
        self.flood(&serialize(&packet), &[]);
    }

    /// Broadcast a channel join/leave/announce notice.
    ///
    /// The payload is `nickname` or `nickname|extra`.
    pub fn send_channel_control(
        &self,
        packet_type: PacketType,
        channel: &str,
        extra: Option<&str>,
    ) {
        let payload = match extra {
            Some(extra) => format!("{}|{}", self.nickname, extra),
            None => self.nickname.clone(),
        };
        let packet = self
            .broadcast_packet(packet_type, payload.into_bytes())
            .with_channel(channel);
        self.seen.insert(&packet.message_key());
        self.flood(&serialize(&packet), &[]);
    }

    /// Announce our nickname to the mesh.
    pub fn announce_presence(&self) {
        let packet = self.broadcast_packet(
            PacketType::PeerAnnouncement,
            self.nickname.clone().into_bytes(),
        );
        self.seen.insert(&packet.message_key());
        self.flood(&serialize(&packet), &[]);
    }

    /// Flood a route-discovery request for a destination fingerprint.
    ///
    /// The trail is seeded with our own fingerprint so the eventual reply
    /// carries the full path back.
    pub fn discover_route(&self, destination_fingerprint: &str) {
        let mut packet = self.broadcast_packet(
            PacketType::RouteDiscovery,
            destination_fingerprint.as_bytes().to_vec(),
        );
        packet.route_history.push(self.local_fingerprint.clone());
        self.seen.insert(&packet.message_key());
        self.flood(&serialize(&packet), &packet.route_history);
    }

    fn broadcast_packet(&self, packet_type: PacketType, payload: Vec<u8>) -> Packet {
        let mut packet = Packet::new_broadcast(
            packet_type,
            self.next_sequence(),
            self.local_static_public,
            payload,
        );
        packet.ttl = self.config.default_ttl;
        packet
    }

    fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    // ------------------------------------------------------------------
    // Route control
    // ------------------------------------------------------------------

    fn handle_route_discovery(&self, packet: &Packet) {
        let target = String::from_utf8_lossy(&packet.payload);
        if target == self.local_fingerprint {
            debug!(
                origin = %fingerprint(&packet.originator),
                "route discovery reached its target, replying"
            );
            self.send_route_reply(packet);
            return;
        }
        self.forward_packet(packet);
    }

    fn send_route_reply(&self, discovery: &Packet) {
        let mut reply = Packet::new_v2(
            PacketType::RouteReply,
            self.next_sequence(),
            self.local_static_public,
            discovery.originator,
            self.local_fingerprint.clone().into_bytes(),
        );
        reply.ttl = self.config.default_ttl;
        // The requester learns the path from this trail.
        reply.route_history = discovery.route_history.clone();
        self.seen.insert(&reply.message_key());

        let bytes = serialize(&reply);
        let origin_fp = fingerprint(&discovery.originator);
        match self.next_hop(&origin_fp) {
            Some(peer) => self.transmit(&peer.address, bytes),
            None => {
                self.flood(&bytes, &[]);
            }
        }
    }

    fn handle_route_reply(&self, packet: &Packet) {
        if packet.is_for(&self.local_static_public) {
            debug!(
                origin = %fingerprint(&packet.originator),
                hops = packet.route_history.len(),
                "route reply consumed"
            );
            return;
        }
        // Retrace toward the requester; the trail stays untouched.
        let mut forwarded = packet.clone();
        forwarded.ttl -= 1;
        forwarded.hop_count = forwarded.hop_count.saturating_add(1);
        forwarded.sender_id = self.local_sender_id();

        let bytes = serialize(&forwarded);
        let dest_fp = fingerprint(&packet.destination);
        match self.next_hop(&dest_fp) {
            Some(peer) => self.transmit(&peer.address, bytes),
            None => {
                self.flood(&bytes, &[]);
            }
        }
    }

    /// Learn routes from any packet's relay trail: the first trail entry
    /// that is one of our direct peers reaches the originator in
    /// trail-length hops.
    fn learn_routes(&self, packet: &Packet) {
        if packet.route_history.is_empty() {
            return;
        }
        let origin_fp = fingerprint(&packet.originator);
        if origin_fp == self.local_fingerprint {
            return;
        }
        let first_direct = {
            let peers = self.peers.read().expect("peer set poisoned");
            packet
                .route_history
                .iter()
                .find(|fp| peers.contains_key(*fp))
                .cloned()
        };
        if let Some(hop) = first_direct {
            let hops = packet.route_history.len().min(u8::MAX as usize) as u8;
            if self.table.update_if_shorter(&origin_fp, &hop, hops) {
                debug!(
                    destination = %origin_fp,
                    via = %hop,
                    hops,
                    "route learned from relay trail"
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Delivery and forwarding
    // ------------------------------------------------------------------

    fn deliver_local(&self, packet: &Packet) {
        let origin = fingerprint(&packet.originator);
        let event = match packet.packet_type {
            PacketType::ChannelMessage => packet.channel_name.clone().map(|channel| {
                MeshEvent::ChannelMessage {
                    channel,
                    origin,
                    body: String::from_utf8_lossy(&packet.payload).into_owned(),
                }
            }),
            PacketType::ChannelJoin => packet.channel_name.clone().map(|channel| {
                let (nickname, _) = split_control_payload(&packet.payload);
                MeshEvent::ChannelJoin {
                    channel,
                    origin,
                    nickname,
                }
            }),
            PacketType::ChannelLeave => packet.channel_name.clone().map(|channel| {
                let (nickname, _) = split_control_payload(&packet.payload);
                MeshEvent::ChannelLeave {
                    channel,
                    origin,
                    nickname,
                }
            }),
            PacketType::ChannelAnnounce => packet.channel_name.clone().map(|channel| {
                let (nickname, extra) = split_control_payload(&packet.payload);
                MeshEvent::ChannelAnnounce {
                    channel,
                    origin,
                    nickname,
                    member_count: extra.and_then(|e| e.parse().ok()).unwrap_or(0),
                }
            }),
            PacketType::PeerAnnouncement => Some(MeshEvent::PeerAnnounced {
                fingerprint: origin,
                nickname: String::from_utf8_lossy(&packet.payload).into_owned(),
            }),
            other => {
                debug!(packet_type = ?other, "no local delivery for packet type");
                None
            }
        };
        if let Some(event) = event {
            let _ = self.events.send(event);
        }
    }

    fn forward_packet(&self, packet: &Packet) {
        let mut forwarded = packet.clone();
        forwarded.ttl -= 1;
        forwarded.hop_count = forwarded.hop_count.saturating_add(1);
        forwarded.route_history.push(self.local_fingerprint.clone());
        forwarded.sender_id = self.local_sender_id();
        let bytes = serialize(&forwarded);

        if !packet.is_broadcast() {
            let dest_fp = fingerprint(&packet.destination);
            if let Some(peer) = self.next_hop(&dest_fp) {
                if !forwarded.route_history.contains(&peer.fingerprint) {
                    self.transmit(&peer.address, bytes);
                    return;
                }
            }
        }
        self.flood(&bytes, &forwarded.route_history);
    }

    fn forward_routed(&self, message: &RoutedMessage) {
        let mut forwarded = message.clone();
        forwarded.ttl -= 1;
        forwarded.hop_count = forwarded.hop_count.saturating_add(1);
        forwarded.seen_by_nodes.push(self.local_fingerprint.clone());

        if let Err(e) = self.transmit_routed(&forwarded) {
            warn!(id = %message.id, error = %e, "failed to forward routed message");
        }
    }

    fn transmit_routed(&self, message: &RoutedMessage) -> Result<()> {
        let packet = message.to_packet(
            self.next_sequence(),
            self.local_static_public,
            BROADCAST_DESTINATION,
        )?;
        let bytes = serialize(&packet);

        if let Some(peer) = self.next_hop(&message.destination) {
            if !message.seen_by_nodes.contains(&peer.fingerprint) {
                self.transmit(&peer.address, bytes);
                return Ok(());
            }
        }
        self.flood(&bytes, &message.seen_by_nodes);
        Ok(())
    }

    /// Send to every direct peer not in `exclude`. Returns the number of
    /// transmissions queued.
    fn flood(&self, bytes: &[u8], exclude: &[String]) -> usize {
        let peers = self.peers.read().expect("peer set poisoned");
        let mut sent = 0;
        for (peer_fp, handle) in peers.iter() {
            if exclude.contains(peer_fp) {
                continue;
            }
            self.transmit(&handle.address, bytes.to_vec());
            sent += 1;
        }
        sent
    }

    fn transmit(&self, address: &str, bytes: Vec<u8>) {
        let _ = self.outbound.send(Outbound {
            address: address.to_string(),
            bytes,
        });
    }

    fn local_sender_id(&self) -> [u8; SENDER_ID_LEN] {
        let mut id = [0u8; SENDER_ID_LEN];
        id.copy_from_slice(&self.local_static_public[..SENDER_ID_LEN]);
        id
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    /// Run one routing-table sweep, removing stale non-direct routes.
    pub fn sweep_routes(&self) -> usize {
        let expiry = self.config.route_expiry;
        let peers = self.peers.read().expect("peer set poisoned");
        self.table
            .sweep(expiry, |fingerprint| peers.contains_key(fingerprint))
    }

    /// Spawn the periodic sweep task.
    pub fn spawn_maintenance(self: &Arc<Self>) -> JoinHandle<()> {
        let router = Arc::clone(self);
        let interval = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                let removed = router.sweep_routes();
                if removed > 0 {
                    debug!(removed, "stale routes swept");
                }
            }
        })
    }

    /// The route expiry currently configured (visible for shells/tests).
    pub fn route_expiry(&self) -> Duration {
        self.config.route_expiry
    }
}

fn split_control_payload(payload: &[u8]) -> (String, Option<String>) {
    let text = String::from_utf8_lossy(payload);
    match text.split_once('|') {
        Some((nickname, extra)) => (nickname.to_string(), Some(extra.to_string())),
        None => (text.into_owned(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshit_crypto::x25519::X25519PrivateKey;
    use meshit_proto::parse;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    struct TestNode {
        router: Arc<MeshRouter>,
        outbound: UnboundedReceiver<Outbound>,
        events: UnboundedReceiver<MeshEvent>,
        fingerprint: String,
        address: String,
    }

    impl TestNode {
        fn new(name: &str) -> Self {
            let key = X25519PrivateKey::generate();
            let public = key.public_key().to_bytes();
            let (out_tx, out_rx) = unbounded_channel();
            let (ev_tx, ev_rx) = unbounded_channel();
            let router = Arc::new(MeshRouter::new(
                public,
                name,
                MeshConfig::default(),
                out_tx,
                ev_tx,
            ));
            Self {
                fingerprint: router.local_fingerprint().to_string(),
                router,
                outbound: out_rx,
                events: ev_rx,
                address: format!("addr-{name}"),
            }
        }

        fn drain_outbound(&mut self) -> Vec<Outbound> {
            let mut out = Vec::new();
            while let Ok(tx) = self.outbound.try_recv() {
                out.push(tx);
            }
            out
        }

        fn drain_events(&mut self) -> Vec<MeshEvent> {
            let mut out = Vec::new();
            while let Ok(ev) = self.events.try_recv() {
                out.push(ev);
            }
            out
        }
    }

    fn link(a: &TestNode, b: &TestNode) {
        a.router
            .register_direct_peer(&b.fingerprint, &b.address, None);
        b.router
            .register_direct_peer(&a.fingerprint, &a.address, None);
    }

    /// Deliver queued transmissions to their targets, returning the total
    /// number of transmissions made across the whole mesh until quiet.
    fn run_mesh(nodes: &mut [TestNode]) -> usize {
        let mut total = 0;
        loop {
            let mut pending = Vec::new();
            for node in nodes.iter_mut() {
                pending.extend(node.drain_outbound());
            }
            if pending.is_empty() {
                return total;
            }
            total += pending.len();
            for tx in pending {
                let target = nodes
                    .iter()
                    .position(|n| n.address == tx.address)
                    .expect("transmission to unknown address");
                let packet = parse(&tx.bytes).expect("relay emitted unparseable frame");
                nodes[target].router.ingest(&packet);
            }
        }
    }

    #[tokio::test]
    async fn test_line_broadcast_is_three_transmissions() {
        // A — B — C
        let mut nodes = vec![TestNode::new("a"), TestNode::new("b"), TestNode::new("c")];
        link(&nodes[0], &nodes[1]);
        link(&nodes[1], &nodes[2]);

        nodes[0].router.send_channel("#general", "hi");
        let transmissions = run_mesh(&mut nodes);
        assert_eq!(transmissions, 3);

        // B and C each delivered exactly once; A originated and got the
        // echo dropped by dedup.
        for (i, node) in nodes.iter_mut().enumerate() {
            let delivered = node
                .drain_events()
                .into_iter()
                .filter(|e| matches!(e, MeshEvent::ChannelMessage { .. }))
                .count();
            assert_eq!(delivered, usize::from(i != 0), "node {i}");
        }
    }

    #[tokio::test]
    async fn test_triangle_broadcast_terminates_and_delivers_once() {
        let mut nodes = vec![TestNode::new("a"), TestNode::new("b"), TestNode::new("c")];
        for i in 0..3 {
            for j in (i + 1)..3 {
                link(&nodes[i], &nodes[j]);
            }
        }

        nodes[0].router.send_channel("#mesh", "once");
        let transmissions = run_mesh(&mut nodes);
        // Finite, and bounded by the flood rule.
        assert!(transmissions >= 2 && transmissions <= 6, "{transmissions}");

        for (i, node) in nodes.iter_mut().enumerate() {
            let delivered = node
                .drain_events()
                .into_iter()
                .filter(|e| matches!(e, MeshEvent::ChannelMessage { .. }))
                .count();
            assert_eq!(delivered, usize::from(i != 0), "node {i}");
        }
    }

    #[tokio::test]
    async fn test_routed_message_dedup_single_delivery() {
        let mut node = TestNode::new("dest");
        let message = RoutedMessage::new("f".repeat(64), node.fingerprint.clone(), vec![1, 2, 3]);

        node.router.ingest_routed(&message);
        node.router.ingest_routed(&message);

        let delivered = node
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, MeshEvent::MessageDelivered { .. }))
            .count();
        assert_eq!(delivered, 1);
    }

    #[tokio::test]
    async fn test_relay_decrements_ttl_and_increments_hops() {
        let mut relay = TestNode::new("relay");
        let neighbor = TestNode::new("n");
        link(&relay, &neighbor);

        let mut message = RoutedMessage::new("f".repeat(64), "0".repeat(64), vec![]);
        message.ttl = 5;
        message.hop_count = 2;
        relay.router.ingest_routed(&message);

        let out = relay.drain_outbound();
        assert_eq!(out.len(), 1);
        let packet = parse(&out[0].bytes).unwrap();
        let forwarded = RoutedMessage::from_packet(&packet).unwrap();
        assert_eq!(forwarded.ttl, 4);
        assert_eq!(forwarded.hop_count, 3);
        assert!(forwarded.seen_by_nodes.contains(&relay.fingerprint));
    }

    #[tokio::test]
    async fn test_expired_ttl_dropped() {
        let mut relay = TestNode::new("relay");
        let neighbor = TestNode::new("n");
        link(&relay, &neighbor);

        let mut message = RoutedMessage::new("f".repeat(64), "0".repeat(64), vec![]);
        message.ttl = 0;
        relay.router.ingest_routed(&message);
        assert!(relay.drain_outbound().is_empty());
    }

    #[tokio::test]
    async fn test_loop_check_drops_seen_messages() {
        let mut relay = TestNode::new("relay");
        let neighbor = TestNode::new("n");
        link(&relay, &neighbor);

        let mut message = RoutedMessage::new("f".repeat(64), "0".repeat(64), vec![]);
        message.seen_by_nodes.push(relay.fingerprint.clone());
        relay.router.ingest_routed(&message);
        assert!(relay.drain_outbound().is_empty());
    }

    #[tokio::test]
    async fn test_route_discovery_line_topology() {
        // A — B — C; A discovers C; the reply teaches A the route via B.
        let mut nodes = vec![TestNode::new("a"), TestNode::new("b"), TestNode::new("c")];
        link(&nodes[0], &nodes[1]);
        link(&nodes[1], &nodes[2]);

        let target = nodes[2].fingerprint.clone();
        nodes[0].router.discover_route(&target);
        run_mesh(&mut nodes);

        let route = nodes[0].router.routing_table().route(&target).unwrap();
        assert_eq!(route.next_hop, nodes[1].fingerprint);
        assert_eq!(route.hop_count, 2);

        // ...and the learned route carries unicast traffic end to end.
        let message = RoutedMessage::new(
            nodes[0].fingerprint.clone(),
            target.clone(),
            b"via the mesh".to_vec(),
        );
        nodes[0].router.send_routed(message).unwrap();
        run_mesh(&mut nodes);
        let delivered = nodes[2]
            .drain_events()
            .into_iter()
            .any(|e| matches!(e, MeshEvent::MessageDelivered { .. }));
        assert!(delivered);
    }

    #[tokio::test]
    async fn test_unicast_prefers_direct_peer() {
        let mut sender = TestNode::new("s");
        let dest = TestNode::new("d");
        let bystander = TestNode::new("x");
        link(&sender, &dest);
        link(&sender, &bystander);

        let message =
            RoutedMessage::new(sender.fingerprint.clone(), dest.fingerprint.clone(), vec![]);
        sender.router.send_routed(message).unwrap();

        let out = sender.drain_outbound();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].address, dest.address);
    }

    #[tokio::test]
    async fn test_unknown_destination_floods() {
        let mut sender = TestNode::new("s");
        let peer_one = TestNode::new("p1");
        let peer_two = TestNode::new("p2");
        link(&sender, &peer_one);
        link(&sender, &peer_two);

        let message =
            RoutedMessage::new(sender.fingerprint.clone(), "9".repeat(64), vec![]);
        sender.router.send_routed(message).unwrap();
        assert_eq!(sender.drain_outbound().len(), 2);
    }

    #[tokio::test]
    async fn test_unregister_revokes_next_hop() {
        let sender = TestNode::new("s");
        let peer = TestNode::new("p");
        link(&sender, &peer);

        assert!(sender.router.next_hop(&peer.fingerprint).is_some());
        sender.router.unregister_direct_peer(&peer.fingerprint);
        assert!(sender.router.next_hop(&peer.fingerprint).is_none());
    }

    #[tokio::test]
    async fn test_stale_route_next_hop_requires_direct_peer() {
        let sender = TestNode::new("s");
        let peer = TestNode::new("p");
        link(&sender, &peer);

        // Learn a two-hop route via the peer, then lose the peer.
        sender
            .router
            .routing_table()
            .update_if_shorter("e".repeat(64).as_str(), &peer.fingerprint, 2);
        assert!(sender.router.next_hop(&"e".repeat(64)).is_some());

        sender.router.unregister_direct_peer(&peer.fingerprint);
        assert!(sender.router.next_hop(&"e".repeat(64)).is_none());
    }

    #[tokio::test]
    async fn test_peer_announcement_event() {
        let mut receiver = TestNode::new("r");
        let mut sender = TestNode::new("s");
        link(&receiver, &sender);

        sender.router.announce_presence();
        // Hand the announcement frame to the receiver directly.
        for tx in sender.drain_outbound() {
            if tx.address == receiver.address {
                receiver.router.ingest(&parse(&tx.bytes).unwrap());
            }
        }

        let events = receiver.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            MeshEvent::PeerAnnounced { nickname, .. } if nickname == "s"
        )));
    }

    #[tokio::test]
    async fn test_channel_control_payload_parsing() {
        let mut receiver = TestNode::new("r");
        let mut sender = TestNode::new("s");
        link(&receiver, &sender);

        sender
            .router
            .send_channel_control(PacketType::ChannelAnnounce, "#ops", Some("4"));
        for tx in sender.drain_outbound() {
            if tx.address == receiver.address {
                receiver.router.ingest(&parse(&tx.bytes).unwrap());
            }
        }

        let events = receiver.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            MeshEvent::ChannelAnnounce { channel, nickname, member_count, .. }
                if channel == "#ops" && nickname == "s" && *member_count == 4
        )));
    }

    #[tokio::test]
    async fn test_sweep_keeps_direct_routes() {
        let node = TestNode::new("n");
        let peer = TestNode::new("p");
        link(&node, &peer);
        node.router
            .routing_table()
            .update_if_shorter(&"e".repeat(64), &peer.fingerprint, 3);

        // Nothing is stale yet.
        assert_eq!(node.router.sweep_routes(), 0);
        assert_eq!(node.router.routing_table().len(), 2);
    }
}
