//! Packet type tags and header flags.

use serde::{Deserialize, Serialize};

/// Wire-stable packet type tags.
///
/// Byte values are frozen; renumbering breaks every deployed node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PacketType {
    /// Direct text message to a connected peer.
    TextMessage = 0x01,
    /// File transfer metadata (name, size, digest).
    FileMetadata = 0x02,
    /// One chunk of file content.
    FileChunk = 0x03,
    /// Acknowledgement (file chunks, every ack-window-th).
    Ack = 0x04,
    /// Handshake message one.
    NoiseHandshake1 = 0x10,
    /// Handshake message two.
    NoiseHandshake2 = 0x11,
    /// Handshake message three.
    NoiseHandshake3 = 0x12,
    /// Relayed end-to-end encrypted message envelope.
    RoutedMessage = 0x20,
    /// Channel broadcast message.
    ChannelMessage = 0x21,
    /// Channel join notice.
    ChannelJoin = 0x22,
    /// Channel leave notice.
    ChannelLeave = 0x23,
    /// Route discovery request.
    RouteDiscovery = 0x24,
    /// Route discovery reply.
    RouteReply = 0x25,
    /// Periodic channel existence announcement.
    ChannelAnnounce = 0x26,
    /// Nickname/fingerprint announcement on connect.
    PeerAnnouncement = 0x30,
}

impl PacketType {
    /// Decode a wire tag, or `None` for an unknown value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::TextMessage),
            0x02 => Some(Self::FileMetadata),
            0x03 => Some(Self::FileChunk),
            0x04 => Some(Self::Ack),
            0x10 => Some(Self::NoiseHandshake1),
            0x11 => Some(Self::NoiseHandshake2),
            0x12 => Some(Self::NoiseHandshake3),
            0x20 => Some(Self::RoutedMessage),
            0x21 => Some(Self::ChannelMessage),
            0x22 => Some(Self::ChannelJoin),
            0x23 => Some(Self::ChannelLeave),
            0x24 => Some(Self::RouteDiscovery),
            0x25 => Some(Self::RouteReply),
            0x26 => Some(Self::ChannelAnnounce),
            0x30 => Some(Self::PeerAnnouncement),
            _ => None,
        }
    }

    /// The wire tag for this type.
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Whether this type participates in channel state.
    pub fn is_channel_control(&self) -> bool {
        matches!(
            self,
            Self::ChannelMessage | Self::ChannelJoin | Self::ChannelLeave | Self::ChannelAnnounce
        )
    }
}

/// Header flag bits (v2 only).
pub mod flags {
    /// Payload is LZ4-compressed.
    pub const COMPRESSED: u8 = 0x01;
}
