//! Binary serialization of packets.
//!
//! Two layouts share the first 22 header bytes:
//!
//! ```text
//! v1: version(1) type(1) seq(4 BE) sender(16)                payload  crc(4)
//! v2: version(1) type(1) seq(4 BE) sender(16) originator(32)
//!     destination(32) hop(1) flags(1) ttl(1)                 payload  crc(4)
//! ```
//!
//! The CRC-32/ISO-HDLC checksum covers every byte before it; a mismatch
//! drops the frame. A v2 payload may begin with a metadata block
//! `meta_len(4 LE signed) || JSON || real payload`; the codec composes it on
//! write and strips it on read. Metadata that fails to parse as JSON is left
//! in place rather than treated as an error, since a raw payload can start
//! with any bytes.
//!
//! Fixed-width fields are zero-padded short and truncated long on write.

use serde::{Deserialize, Serialize};

use meshit_crypto::compress::{decompress, maybe_compress};
use meshit_crypto::hash::crc32;

use crate::packet::{Packet, KEY_LEN, SENDER_ID_LEN};
use crate::types::{flags, PacketType};

/// Minimum length of a v1 frame (22-byte header + CRC, empty payload).
pub const V1_MIN_FRAME_LEN: usize = 26;

/// Minimum length of a v2 frame (89-byte header + CRC, empty payload).
pub const V2_MIN_FRAME_LEN: usize = 93;

const V1_HEADER_LEN: usize = 22;
const V2_HEADER_LEN: usize = 89;
const CRC_LEN: usize = 4;
const META_LEN_PREFIX: usize = 4;

/// The JSON metadata block carried ahead of a v2 payload.
#[derive(Default, Serialize, Deserialize)]
struct PacketMeta {
    #[serde(rename = "routeHistory", default)]
    route_history: Vec<String>,
    #[serde(rename = "channelName", skip_serializing_if = "Option::is_none")]
    channel_name: Option<String>,
}

/// Serialize a packet into its wire frame.
///
/// The layout is selected by `packet.version`; any other version value is
/// written as-is with the v1 layout, which receivers will drop.
pub fn serialize(packet: &Packet) -> Vec<u8> {
    match packet.version {
        2 => serialize_v2(packet),
        _ => serialize_v1(packet),
    }
}

fn serialize_v1(packet: &Packet) -> Vec<u8> {
    let mut out = Vec::with_capacity(V1_HEADER_LEN + packet.payload.len() + CRC_LEN);
    out.push(packet.version);
    out.push(packet.packet_type.as_u8());
    out.extend_from_slice(&packet.sequence.to_be_bytes());
    out.extend_from_slice(&fixed::<SENDER_ID_LEN>(&packet.sender_id));
    out.extend_from_slice(&packet.payload);
    let checksum = crc32(&out);
    out.extend_from_slice(&checksum.to_be_bytes());
    out
}

fn serialize_v2(packet: &Packet) -> Vec<u8> {
    // Metadata prefix, only when there is something to carry.
    let mut combined;
    if !packet.route_history.is_empty() || packet.channel_name.is_some() {
        let meta = PacketMeta {
            route_history: packet.route_history.clone(),
            channel_name: packet.channel_name.clone(),
        };
        let json = serde_json::to_vec(&meta).expect("metadata is plain strings");
        combined = Vec::with_capacity(META_LEN_PREFIX + json.len() + packet.payload.len());
        combined.extend_from_slice(&(json.len() as i32).to_le_bytes());
        combined.extend_from_slice(&json);
        combined.extend_from_slice(&packet.payload);
    } else {
        combined = packet.payload.clone();
    }

    let mut header_flags = packet.flags & !flags::COMPRESSED;
    if let Some(compressed) = maybe_compress(&combined) {
        combined = compressed;
        header_flags |= flags::COMPRESSED;
    }

    let mut out = Vec::with_capacity(V2_HEADER_LEN + combined.len() + CRC_LEN);
    out.push(packet.version);
    out.push(packet.packet_type.as_u8());
    out.extend_from_slice(&packet.sequence.to_be_bytes());
    out.extend_from_slice(&fixed::<SENDER_ID_LEN>(&packet.sender_id));
    out.extend_from_slice(&fixed::<KEY_LEN>(&packet.originator));
    out.extend_from_slice(&fixed::<KEY_LEN>(&packet.destination));
    out.push(packet.hop_count);
    out.push(header_flags);
    out.push(packet.ttl);
    out.extend_from_slice(&combined);
    let checksum = crc32(&out);
    out.extend_from_slice(&checksum.to_be_bytes());
    out
}

/// Parse a wire frame into a packet.
///
/// Returns `None` for anything malformed: short frames, unknown versions or
/// type tags, CRC mismatches, or a compressed payload that fails to inflate.
/// Corrupt frames are dropped, never repaired.
pub fn parse(bytes: &[u8]) -> Option<Packet> {
    if bytes.len() < V1_MIN_FRAME_LEN {
        return None;
    }
    match bytes[0] {
        1 => parse_v1(bytes),
        2 => parse_v2(bytes),
        _ => None,
    }
}

fn check_crc(bytes: &[u8]) -> bool {
    let (body, trailer) = bytes.split_at(bytes.len() - CRC_LEN);
    let stored = u32::from_be_bytes(trailer.try_into().expect("trailer is four bytes"));
    crc32(body) == stored
}

fn parse_v1(bytes: &[u8]) -> Option<Packet> {
    if bytes.len() < V1_MIN_FRAME_LEN || !check_crc(bytes) {
        return None;
    }
    let packet_type = PacketType::from_u8(bytes[1])?;
    let sequence = u32::from_be_bytes(bytes[2..6].try_into().ok()?);
    let mut sender_id = [0u8; SENDER_ID_LEN];
    sender_id.copy_from_slice(&bytes[6..22]);
    let payload = bytes[V1_HEADER_LEN..bytes.len() - CRC_LEN].to_vec();

    let mut packet = Packet::new_v1(packet_type, sequence, sender_id, payload);
    packet.version = 1;
    Some(packet)
}

fn parse_v2(bytes: &[u8]) -> Option<Packet> {
    if bytes.len() < V2_MIN_FRAME_LEN || !check_crc(bytes) {
        return None;
    }
    let packet_type = PacketType::from_u8(bytes[1])?;
    let sequence = u32::from_be_bytes(bytes[2..6].try_into().ok()?);
    let mut sender_id = [0u8; SENDER_ID_LEN];
    sender_id.copy_from_slice(&bytes[6..22]);
    let mut originator = [0u8; KEY_LEN];
    originator.copy_from_slice(&bytes[22..54]);
    let mut destination = [0u8; KEY_LEN];
    destination.copy_from_slice(&bytes[54..86]);
    let hop_count = bytes[86];
    let mut header_flags = bytes[87];
    let ttl = bytes[88];

    let mut payload = bytes[V2_HEADER_LEN..bytes.len() - CRC_LEN].to_vec();
    if header_flags & flags::COMPRESSED != 0 {
        payload = decompress(&payload, None).ok()?;
        header_flags &= !flags::COMPRESSED;
    }

    let (route_history, channel_name, payload) = strip_metadata(payload);

    Some(Packet {
        version: 2,
        packet_type,
        sequence,
        sender_id,
        originator,
        destination,
        hop_count,
        flags: header_flags,
        ttl,
        route_history,
        channel_name,
        payload,
    })
}

/// Split a metadata prefix off a v2 payload, if one is present.
///
/// A payload is treated as prefixed only when the leading length is
/// positive, fits, and the bytes it covers parse as the metadata JSON;
/// otherwise the payload passes through untouched.
fn strip_metadata(payload: Vec<u8>) -> (Vec<String>, Option<String>, Vec<u8>) {
    if payload.len() < META_LEN_PREFIX {
        return (Vec::new(), None, payload);
    }
    let meta_len = i32::from_le_bytes(
        payload[..META_LEN_PREFIX]
            .try_into()
            .expect("sliced four bytes"),
    );
    if meta_len <= 0 {
        return (Vec::new(), None, payload);
    }
    let meta_len = meta_len as usize;
    if meta_len > payload.len() - META_LEN_PREFIX {
        return (Vec::new(), None, payload);
    }
    match serde_json::from_slice::<PacketMeta>(&payload[META_LEN_PREFIX..META_LEN_PREFIX + meta_len])
    {
        Ok(meta) => {
            let rest = payload[META_LEN_PREFIX + meta_len..].to_vec();
            (meta.route_history, meta.channel_name, rest)
        }
        Err(_) => (Vec::new(), None, payload),
    }
}

fn fixed<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    let n = src.len().min(N);
    out[..n].copy_from_slice(&src[..n]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::BROADCAST_DESTINATION;

    fn sample_v2() -> Packet {
        let mut p = Packet::new_v2(
            PacketType::RoutedMessage,
            0x01020304,
            [0xbb; 32],
            [0xcc; 32],
            b"hello".to_vec(),
        );
        p.hop_count = 2;
        p.ttl = 5;
        p
    }

    #[test]
    fn test_v1_roundtrip() {
        let p = Packet::new_v1(
            PacketType::TextMessage,
            42,
            [0xaa; 16],
            b"plain v1".to_vec(),
        );
        let parsed = parse(&serialize(&p)).unwrap();
        assert_eq!(parsed, p);
    }

    #[test]
    fn test_v2_roundtrip() {
        let p = sample_v2();
        let parsed = parse(&serialize(&p)).unwrap();
        assert_eq!(parsed, p);
    }

    #[test]
    fn test_v2_with_metadata_roundtrip() {
        let mut p = Packet::new_broadcast(PacketType::ChannelMessage, 0x01020304, [0xbb; 32], b"hi".to_vec());
        p.sender_id = [0xaa; 16];
        p.hop_count = 2;
        p.ttl = 5;
        p.route_history = vec!["ab".to_string(), "cd".to_string()];
        p.channel_name = Some("#general".to_string());

        let frame = serialize(&p);
        let parsed = parse(&frame).unwrap();
        assert_eq!(parsed, p);

        // Deterministic length: header + meta prefix + json + payload + crc.
        let meta = serde_json::json!({
            "routeHistory": ["ab", "cd"],
            "channelName": "#general",
        });
        let json_len = serde_json::to_vec(&meta).unwrap().len();
        assert_eq!(frame.len(), V2_HEADER_LEN + 4 + json_len + 2 + 4);
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let mut p = sample_v2();
        p.payload.clear();
        let frame = serialize(&p);
        assert_eq!(frame.len(), V2_MIN_FRAME_LEN);
        assert_eq!(parse(&frame).unwrap(), p);
    }

    #[test]
    fn test_crc_mismatch_dropped() {
        let frame = serialize(&sample_v2());
        for i in 0..frame.len() - 4 {
            let mut corrupted = frame.clone();
            corrupted[i] ^= 0x01;
            assert!(parse(&corrupted).is_none(), "bit flip at byte {i} survived");
        }
    }

    #[test]
    fn test_short_frames_dropped() {
        assert!(parse(&[]).is_none());
        assert!(parse(&[2u8; 25]).is_none());

        // A v2 frame below the v2 minimum but above the v1 minimum.
        let frame = serialize(&sample_v2());
        assert!(parse(&frame[..V2_MIN_FRAME_LEN - 1]).is_none());
    }

    #[test]
    fn test_unknown_version_dropped() {
        let mut frame = serialize(&sample_v2());
        frame[0] = 3;
        // Fix up the CRC so only the version is wrong.
        let body_len = frame.len() - 4;
        let crc = meshit_crypto::hash::crc32(&frame[..body_len]).to_be_bytes();
        frame[body_len..].copy_from_slice(&crc);
        assert!(parse(&frame).is_none());
    }

    #[test]
    fn test_unknown_type_dropped() {
        let mut frame = serialize(&sample_v2());
        frame[1] = 0x7f;
        let body_len = frame.len() - 4;
        let crc = meshit_crypto::hash::crc32(&frame[..body_len]).to_be_bytes();
        frame[body_len..].copy_from_slice(&crc);
        assert!(parse(&frame).is_none());
    }

    #[test]
    fn test_large_payload_compresses() {
        let mut p = sample_v2();
        p.payload = vec![0x42; 4096];
        let frame = serialize(&p);
        assert!(frame.len() < V2_HEADER_LEN + 4096);

        let parsed = parse(&frame).unwrap();
        // The compression flag is internal to the wire form.
        assert_eq!(parsed.flags & flags::COMPRESSED, 0);
        assert_eq!(parsed, p);
    }

    #[test]
    fn test_payload_resembling_metadata_passes_through() {
        // Leading bytes decode as a plausible length but not as JSON.
        let mut p = sample_v2();
        p.payload = vec![4, 0, 0, 0, 0xde, 0xad, 0xbe, 0xef, 1, 2, 3];
        let parsed = parse(&serialize(&p)).unwrap();
        assert_eq!(parsed.payload, p.payload);
        assert!(parsed.route_history.is_empty());
    }

    #[test]
    fn test_negative_meta_length_passes_through() {
        let mut p = sample_v2();
        p.payload = (-1i32).to_le_bytes().to_vec();
        let parsed = parse(&serialize(&p)).unwrap();
        assert_eq!(parsed.payload, p.payload);
    }

    #[test]
    fn test_short_sender_id_zero_padded() {
        let frame = serialize(&sample_v2());
        let parsed = parse(&frame).unwrap();
        assert_eq!(parsed.sender_id.len(), 16);
    }

    #[test]
    fn test_broadcast_destination_roundtrip() {
        let p = Packet::new_broadcast(PacketType::RouteDiscovery, 9, [0x11; 32], b"fp".to_vec());
        let parsed = parse(&serialize(&p)).unwrap();
        assert_eq!(parsed.destination, BROADCAST_DESTINATION);
        assert!(parsed.is_broadcast());
    }
}
