//! The framed packet record.

use crate::limits::DEFAULT_TTL;
use crate::types::PacketType;

/// Size of the sender id field in bytes.
pub const SENDER_ID_LEN: usize = 16;

/// Size of the originator/destination public key fields in bytes.
pub const KEY_LEN: usize = 32;

/// The broadcast destination: 32 zero bytes.
pub const BROADCAST_DESTINATION: [u8; KEY_LEN] = [0u8; KEY_LEN];

/// A parsed (or to-be-serialized) mesh packet.
///
/// Version 1 carries only the first four header fields; the v2-only fields
/// round-trip as zeros/empty for v1 packets. `sender_id` is the first 16
/// bytes of the originator public key for v2 traffic, or a raw node UUID
/// for v1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Wire version (1 or 2).
    pub version: u8,
    /// Type tag.
    pub packet_type: PacketType,
    /// Originator-assigned sequence number.
    pub sequence: u32,
    /// Relay-visible sender id (rewritten at each hop).
    pub sender_id: [u8; SENDER_ID_LEN],
    /// Static public key of the originating node (v2).
    pub originator: [u8; KEY_LEN],
    /// Static public key of the destination, or all zeros for broadcast (v2).
    pub destination: [u8; KEY_LEN],
    /// Hops traversed so far (v2).
    pub hop_count: u8,
    /// Header flags (v2).
    pub flags: u8,
    /// Remaining relay budget (v2).
    pub ttl: u8,
    /// Ordered relay fingerprints this packet has passed through (metadata).
    pub route_history: Vec<String>,
    /// Channel this packet belongs to, if any (metadata).
    pub channel_name: Option<String>,
    /// Application payload.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a v1 packet; all v2-only fields are zeroed.
    pub fn new_v1(
        packet_type: PacketType,
        sequence: u32,
        sender_id: [u8; SENDER_ID_LEN],
        payload: Vec<u8>,
    ) -> Self {
        Self {
            version: 1,
            packet_type,
            sequence,
            sender_id,
            originator: [0u8; KEY_LEN],
            destination: [0u8; KEY_LEN],
            hop_count: 0,
            flags: 0,
            ttl: 0,
            route_history: Vec::new(),
            channel_name: None,
            payload,
        }
    }

    /// Build a v2 packet addressed to a specific destination key.
    ///
    /// The sender id is seeded from the originator key; relays rewrite it.
    pub fn new_v2(
        packet_type: PacketType,
        sequence: u32,
        originator: [u8; KEY_LEN],
        destination: [u8; KEY_LEN],
        payload: Vec<u8>,
    ) -> Self {
        let mut sender_id = [0u8; SENDER_ID_LEN];
        sender_id.copy_from_slice(&originator[..SENDER_ID_LEN]);
        Self {
            version: 2,
            packet_type,
            sequence,
            sender_id,
            originator,
            destination,
            hop_count: 0,
            flags: 0,
            ttl: DEFAULT_TTL,
            route_history: Vec::new(),
            channel_name: None,
            payload,
        }
    }

    /// Build a v2 broadcast packet (destination all zeros).
    pub fn new_broadcast(
        packet_type: PacketType,
        sequence: u32,
        originator: [u8; KEY_LEN],
        payload: Vec<u8>,
    ) -> Self {
        Self::new_v2(
            packet_type,
            sequence,
            originator,
            BROADCAST_DESTINATION,
            payload,
        )
    }

    /// Attach a channel name (serialized into the metadata block).
    pub fn with_channel(mut self, name: impl Into<String>) -> Self {
        self.channel_name = Some(name.into());
        self
    }

    /// Whether the destination is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        self.destination == BROADCAST_DESTINATION
    }

    /// Whether this packet is addressed to the given static public key.
    pub fn is_for(&self, static_public: &[u8; KEY_LEN]) -> bool {
        self.destination == *static_public
    }

    /// The dedup key for bare (non-routed-envelope) packets:
    /// `hex(originator):sequence`.
    pub fn message_key(&self) -> String {
        format!("{}:{}", hex::encode(self.originator), self.sequence)
    }
}
