//! Events emitted by the routing engine.

use meshit_proto::RoutedMessage;

/// What the router tells the rest of the node.
///
/// Subscribers (channel service, message pipeline, shell) consume these
/// from an unbounded channel; the router never calls back into them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshEvent {
    /// A routed message addressed to this node arrived.
    MessageDelivered {
        /// The envelope; payload still encrypted for us.
        message: RoutedMessage,
    },

    /// A channel broadcast reached this node.
    ChannelMessage {
        /// Channel the message belongs to.
        channel: String,
        /// Originator fingerprint.
        origin: String,
        /// Message body.
        body: String,
    },

    /// A remote peer joined a channel.
    ChannelJoin {
        /// The channel.
        channel: String,
        /// Joining peer's fingerprint.
        origin: String,
        /// Joining peer's nickname.
        nickname: String,
    },

    /// A remote peer left a channel.
    ChannelLeave {
        /// The channel.
        channel: String,
        /// Leaving peer's fingerprint.
        origin: String,
        /// Leaving peer's nickname.
        nickname: String,
    },

    /// A remote peer announced a channel it is in.
    ChannelAnnounce {
        /// The channel.
        channel: String,
        /// Announcing peer's fingerprint.
        origin: String,
        /// Announcing peer's nickname.
        nickname: String,
        /// Member count the announcer reported.
        member_count: u32,
    },

    /// A peer announced its nickname.
    PeerAnnounced {
        /// The peer's fingerprint.
        fingerprint: String,
        /// The announced nickname.
        nickname: String,
    },
}
