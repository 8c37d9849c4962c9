//! # meshit-mesh
//!
//! Mesh routing and channels for the meshIt protocol.
//!
//! [`MeshRouter`] runs the relay pipeline — dedup, TTL, loop check, local
//! delivery, forwarding — over a best-known-route table seeded by direct
//! peers and grown opportunistically from every packet's relay trail.
//! [`ChannelService`] keeps IRC-style channel membership and parses the
//! slash commands. Neither talks to links directly: outbound transmissions
//! go into a channel the connection layer drains, which keeps the
//! router/manager dependency one-directional.

#![forbid(unsafe_code)]

pub mod channels;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod router;
pub mod seen;
pub mod table;

pub use channels::{Channel, ChannelEvent, ChannelService};
pub use commands::{parse_command, Command, ParsedInput};
pub use config::MeshConfig;
pub use error::{MeshError, Result};
pub use events::MeshEvent;
pub use router::{MeshRouter, Outbound, PeerHandle};
pub use seen::SeenCache;
pub use table::{RouteEntry, RoutingTable};
