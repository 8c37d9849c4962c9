//! # meshit-proto
//!
//! Wire format and message models for the meshIt mesh protocol.
//!
//! This crate provides:
//! - **Packet**: the framed record with its v1 (26-byte) and v2 (93-byte)
//!   binary layouts
//! - **Codec**: serialize/parse with CRC-32 integrity and the transparent
//!   JSON metadata prefix
//! - **RoutedMessage**: the relayed, end-to-end encrypted message envelope
//! - **File transfer**: metadata/chunk/ack payload models
//! - **Chunking**: MTU-sized fragmentation for packet-oriented links
//! - **Limits**: every protocol constant in one place

#![forbid(unsafe_code)]

pub mod chunking;
pub mod codec;
pub mod error;
pub mod files;
pub mod limits;
pub mod packet;
pub mod routed;
pub mod types;

#[cfg(test)]
mod proptests;

pub use codec::{parse, serialize};
pub use error::{ProtoError, Result};
pub use packet::{Packet, BROADCAST_DESTINATION};
pub use routed::RoutedMessage;
pub use types::PacketType;
