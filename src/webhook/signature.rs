//! Webhook request signing
//!
//! Inbound webhook and interaction requests carry an HMAC-SHA256 digest of
//! the raw body. Two digest formats are in the wild: `sha256=<hex>` over the
//! body alone, and bare hex over `"{timestamp}:{body}"`. Verification
//! accepts both; comparison is constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-community-signature";
/// Header carrying the timestamp paired with the signature.
pub const TIMESTAMP_HEADER: &str = "x-community-request-timestamp";

fn mac_for(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

fn mac_matches(secret: &str, payload: &[u8], hex_digest: &str) -> bool {
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let mut mac = mac_for(secret);
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// `sha256=<hex>` digest over the raw body.
pub fn body_digest(secret: &str, body: &[u8]) -> String {
    let mut mac = mac_for(secret);
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Bare hex digest over `"{timestamp}:{body}"`.
pub fn timestamped_digest(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = mac_for(secret);
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a request signature against the raw body. The digest format is
/// chosen by the `sha256=` prefix.
pub fn verify_signature(secret: &str, body: &[u8], timestamp: &str, signature: &str) -> bool {
    if let Some(hex_digest) = signature.strip_prefix("sha256=") {
        return mac_matches(secret, body, hex_digest);
    }

    let mut payload = Vec::with_capacity(timestamp.len() + 1 + body.len());
    payload.extend_from_slice(timestamp.as_bytes());
    payload.push(b':');
    payload.extend_from_slice(body);
    mac_matches(secret, &payload, signature)
}
