//! Packet-type fan-out from the link layer to subsystems.
//!
//! The dispatcher is the single entry point for inbound frames: it parses
//! each one and hands the packet to the subscriber interested in its type.
//!
//! - text messages and handshake messages → message subscriber
//! - file metadata / chunks / acks → file subscriber
//! - routed envelopes, route control and channel control → routing
//!   subscriber (the routing engine applies channel side effects and
//!   forwarding itself)
//!
//! Frames that fail to parse and types with no registered subscriber are
//! dropped with a log line; both are normal operation on a noisy mesh.

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use meshit_proto::{parse, Packet, PacketType};

/// A packet paired with the address of the link it arrived on.
pub type Inbound = (String, Packet);

/// Fans parsed packets out to per-subsystem subscribers.
#[derive(Default)]
pub struct Dispatcher {
    messages: Option<UnboundedSender<Inbound>>,
    files: Option<UnboundedSender<Inbound>>,
    routing: Option<UnboundedSender<Inbound>>,
}

impl Dispatcher {
    /// Create a dispatcher with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to text-message and handshake packets.
    pub fn with_message_subscriber(mut self, tx: UnboundedSender<Inbound>) -> Self {
        self.messages = Some(tx);
        self
    }

    /// Subscribe to file-transfer packets.
    pub fn with_file_subscriber(mut self, tx: UnboundedSender<Inbound>) -> Self {
        self.files = Some(tx);
        self
    }

    /// Subscribe to mesh routing and channel packets.
    pub fn with_routing_subscriber(mut self, tx: UnboundedSender<Inbound>) -> Self {
        self.routing = Some(tx);
        self
    }

    /// Parse one inbound frame and route the packet by type.
    pub fn dispatch(&self, peer: &str, bytes: &[u8]) {
        let Some(packet) = parse(bytes) else {
            debug!(peer, len = bytes.len(), "dropping unparseable frame");
            return;
        };

        let subscriber = match packet.packet_type {
            PacketType::TextMessage
            | PacketType::NoiseHandshake1
            | PacketType::NoiseHandshake2
            | PacketType::NoiseHandshake3 => self.messages.as_ref(),
            PacketType::FileMetadata | PacketType::FileChunk | PacketType::Ack => {
                self.files.as_ref()
            }
            PacketType::RoutedMessage
            | PacketType::RouteDiscovery
            | PacketType::RouteReply
            | PacketType::ChannelMessage
            | PacketType::ChannelJoin
            | PacketType::ChannelLeave
            | PacketType::ChannelAnnounce
            | PacketType::PeerAnnouncement => self.routing.as_ref(),
        };

        match subscriber {
            Some(tx) => {
                let _ = tx.send((peer.to_string(), packet));
            }
            None => {
                debug!(
                    peer,
                    packet_type = ?packet.packet_type,
                    "no subscriber for packet type, dropping"
                );
            }
        }
    }
}
