//! The relayed message envelope.
//!
//! A `RoutedMessage` is what actually travels across the mesh for
//! peer-to-peer traffic: an end-to-end encrypted payload wrapped with just
//! enough routing state (TTL, hop count, relay trail) for intermediaries to
//! forward it without reading it. It rides in the payload of a
//! `routed-message` packet as JSON, the ciphertext base64-coded.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::limits::DEFAULT_TTL;
use crate::packet::{Packet, KEY_LEN};
use crate::types::PacketType;
use crate::{ProtoError, Result};

/// An end-to-end encrypted message in transit across the mesh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedMessage {
    /// Unique id; doubles as the dedup key.
    pub id: Uuid,
    /// Fingerprint of the originating node.
    pub origin: String,
    /// Fingerprint of the destination node.
    pub destination: String,
    /// Originator's nickname, for delivery display.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub nickname: Option<String>,
    /// The Noise-encrypted payload.
    #[serde(with = "payload_serde")]
    pub encrypted_payload: Vec<u8>,
    /// Remaining relay budget.
    pub ttl: u8,
    /// Hops traversed so far.
    pub hop_count: u8,
    /// Fingerprints of nodes that have already handled this message.
    pub seen_by_nodes: Vec<String>,
    /// Unix seconds at origination.
    pub timestamp: i64,
}

/// Base64 coding for the ciphertext field.
mod payload_serde {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

impl RoutedMessage {
    /// Wrap an encrypted payload for relay with a fresh id and full TTL.
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        encrypted_payload: Vec<u8>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin: origin.into(),
            destination: destination.into(),
            nickname: None,
            encrypted_payload,
            ttl: DEFAULT_TTL,
            hop_count: 0,
            seen_by_nodes: Vec::new(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs() as i64,
        }
    }

    /// Attach the originator's nickname.
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    /// The dedup key: the message UUID.
    pub fn message_key(&self) -> String {
        self.id.to_string()
    }

    /// Embed this envelope into a v2 `routed-message` packet.
    pub fn to_packet(
        &self,
        sequence: u32,
        originator: [u8; KEY_LEN],
        destination: [u8; KEY_LEN],
    ) -> Result<Packet> {
        let payload = serde_json::to_vec(self)?;
        let mut packet = Packet::new_v2(
            PacketType::RoutedMessage,
            sequence,
            originator,
            destination,
            payload,
        );
        packet.ttl = self.ttl;
        packet.hop_count = self.hop_count;
        Ok(packet)
    }

    /// Extract the envelope from a `routed-message` packet.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedType` for any other packet type and a payload
    /// error if the JSON does not decode.
    pub fn from_packet(packet: &Packet) -> Result<Self> {
        if packet.packet_type != PacketType::RoutedMessage {
            return Err(ProtoError::UnexpectedType {
                expected: "routed-message",
                actual: format!("{:?}", packet.packet_type),
            });
        }
        Ok(serde_json::from_slice(&packet.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{parse, serialize};

    #[test]
    fn test_envelope_roundtrip_through_packet() {
        let message = RoutedMessage::new("a".repeat(64), "b".repeat(64), vec![1, 2, 3, 4])
            .with_nickname("ada");
        let packet = message.to_packet(7, [0x01; 32], [0x02; 32]).unwrap();

        let decoded = RoutedMessage::from_packet(&parse(&serialize(&packet)).unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_fresh_envelope_state() {
        let message = RoutedMessage::new("a".repeat(64), "b".repeat(64), vec![]);
        assert_eq!(message.ttl, DEFAULT_TTL);
        assert_eq!(message.hop_count, 0);
        assert!(message.seen_by_nodes.is_empty());
        assert!(message.timestamp > 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = RoutedMessage::new("x", "y", vec![]);
        let b = RoutedMessage::new("x", "y", vec![]);
        assert_ne!(a.message_key(), b.message_key());
    }

    #[test]
    fn test_packet_mirrors_relay_state() {
        let mut message = RoutedMessage::new("a".repeat(64), "b".repeat(64), vec![9]);
        message.ttl = 3;
        message.hop_count = 4;
        let packet = message.to_packet(1, [0x01; 32], [0x02; 32]).unwrap();
        assert_eq!(packet.ttl, 3);
        assert_eq!(packet.hop_count, 4);
    }

    #[test]
    fn test_wrong_packet_type_rejected() {
        let packet = Packet::new_v2(
            PacketType::ChannelMessage,
            1,
            [0x01; 32],
            [0x02; 32],
            b"{}".to_vec(),
        );
        assert!(matches!(
            RoutedMessage::from_packet(&packet),
            Err(ProtoError::UnexpectedType { .. })
        ));
    }

    #[test]
    fn test_garbage_payload_rejected() {
        let packet = Packet::new_v2(
            PacketType::RoutedMessage,
            1,
            [0x01; 32],
            [0x02; 32],
            b"not json".to_vec(),
        );
        assert!(RoutedMessage::from_packet(&packet).is_err());
    }
}
