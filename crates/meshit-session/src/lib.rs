//! # meshit-session
//!
//! Per-peer session management for the meshIt mesh.
//!
//! [`SessionManager`] owns every in-progress handshake and every
//! established [`NoiseSession`](meshit_crypto::NoiseSession), keyed by peer
//! fingerprint. The dispatcher feeds it handshake packets; everything else
//! calls [`SessionManager::encrypt_for`] / [`SessionManager::decrypt_from`]
//! and never touches key material directly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod manager;

pub use error::{Result, SessionError};
pub use manager::SessionManager;
