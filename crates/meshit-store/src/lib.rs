//! # meshit-store
//!
//! Flat-file persisted state for a meshIt node:
//!
//! - `settings.json` — nickname, user id, versioning
//! - `trust.json` — fingerprint → trust level
//! - `identity.json` — key material behind the at-rest protection boundary
//!   (wrapping key held in the OS credential store)
//! - `pending/<fingerprint>.jsonl` — store-and-forward queues
//!
//! Chat history lives in an external database and is not handled here.

#![forbid(unsafe_code)]

pub mod error;
pub mod pending;
pub mod protected;
pub mod settings;
pub mod trust;

pub use error::{Result, StoreError};
pub use pending::PendingQueue;
pub use protected::{FileProtectedStorage, KeyringProtectedStorage};
pub use settings::Settings;
pub use trust::TrustStore;
