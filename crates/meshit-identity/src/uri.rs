//! Verification URI for out-of-band identity checks.
//!
//! Format: `meshit://verify?fp=<64 hex>&nick=<percent-encoded>`. Shells
//! render this as a QR code; scanning it on another device confirms the
//! fingerprint matches before marking the peer verified.

use crate::{IdentityError, Result};

const PREFIX: &str = "meshit://verify?";

/// Build a verification URI for a fingerprint and nickname.
pub fn verification_uri(fingerprint: &str, nickname: &str) -> String {
    format!(
        "meshit://verify?fp={}&nick={}",
        fingerprint,
        percent_encode(nickname)
    )
}

/// Parse a verification URI into `(fingerprint, nickname)`.
///
/// # Errors
///
/// Returns `InvalidUri` on a wrong scheme, a fingerprint that is not 64
/// lowercase hex characters, or malformed percent-encoding.
pub fn parse_verification_uri(uri: &str) -> Result<(String, String)> {
    let query = uri
        .strip_prefix(PREFIX)
        .ok_or_else(|| IdentityError::InvalidUri("wrong scheme or path".into()))?;

    let mut fingerprint = None;
    let mut nickname = None;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("fp", value)) => fingerprint = Some(value.to_string()),
            Some(("nick", value)) => nickname = Some(percent_decode(value)?),
            _ => {}
        }
    }

    let fingerprint =
        fingerprint.ok_or_else(|| IdentityError::InvalidUri("missing fp parameter".into()))?;
    if fingerprint.len() != 64
        || !fingerprint
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    {
        return Err(IdentityError::InvalidUri(
            "fingerprint must be 64 lowercase hex characters".into(),
        ));
    }

    Ok((fingerprint, nickname.unwrap_or_default()))
}

fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn percent_decode(input: &str) -> Result<String> {
    let mut bytes = Vec::with_capacity(input.len());
    let mut chars = input.bytes();
    while let Some(byte) = chars.next() {
        if byte == b'%' {
            let hi = chars.next();
            let lo = chars.next();
            match (hi, lo) {
                (Some(hi), Some(lo)) => {
                    let hex = [hi, lo];
                    let hex = std::str::from_utf8(&hex)
                        .map_err(|_| IdentityError::InvalidUri("bad percent escape".into()))?;
                    let value = u8::from_str_radix(hex, 16)
                        .map_err(|_| IdentityError::InvalidUri("bad percent escape".into()))?;
                    bytes.push(value);
                }
                _ => return Err(IdentityError::InvalidUri("truncated percent escape".into())),
            }
        } else {
            bytes.push(byte);
        }
    }
    String::from_utf8(bytes).map_err(|_| IdentityError::InvalidUri("nickname not UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeIdentity;

    #[test]
    fn test_uri_roundtrip() {
        let identity = NodeIdentity::generate("ada lovelace");
        let uri = verification_uri(identity.fingerprint(), identity.nickname());

        let (fp, nick) = parse_verification_uri(&uri).unwrap();
        assert_eq!(fp, identity.fingerprint());
        assert_eq!(nick, "ada lovelace");
    }

    #[test]
    fn test_unicode_nickname() {
        let fp = "ab".repeat(32);
        let uri = verification_uri(&fp, "аня ✨");
        let (_, nick) = parse_verification_uri(&uri).unwrap();
        assert_eq!(nick, "аня ✨");
    }

    #[test]
    fn test_wrong_scheme_rejected() {
        assert!(parse_verification_uri("https://verify?fp=ab&nick=x").is_err());
    }

    #[test]
    fn test_bad_fingerprint_rejected() {
        assert!(parse_verification_uri("meshit://verify?fp=abcd&nick=x").is_err());
        let upper = format!("meshit://verify?fp={}&nick=x", "AB".repeat(32));
        assert!(parse_verification_uri(&upper).is_err());
    }

    #[test]
    fn test_missing_nick_defaults_empty() {
        let uri = format!("meshit://verify?fp={}", "ab".repeat(32));
        let (_, nick) = parse_verification_uri(&uri).unwrap();
        assert_eq!(nick, "");
    }

    #[test]
    fn test_truncated_escape_rejected() {
        let uri = format!("meshit://verify?fp={}&nick=a%2", "ab".repeat(32));
        assert!(parse_verification_uri(&uri).is_err());
    }
}
