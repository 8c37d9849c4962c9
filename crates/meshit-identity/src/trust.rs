//! Trust levels assigned to remote peers.

use serde::{Deserialize, Serialize};

/// How much the local user trusts a remote fingerprint.
///
/// Trust is advisory; it never gates routing or relaying (relays only ever
/// see ciphertext). The shell uses it for badges and sort order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    /// Never verified out of band.
    #[default]
    Unknown,
    /// Fingerprint confirmed via the verification URI / QR flow.
    Verified,
    /// Verified and pinned by the user.
    Favorite,
}

impl TrustLevel {
    /// Whether this level implies an out-of-band fingerprint check.
    pub fn is_verified(&self) -> bool {
        matches!(self, TrustLevel::Verified | TrustLevel::Favorite)
    }
}
