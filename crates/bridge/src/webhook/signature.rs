use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &str, timestamp: &str, body: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Some(mac)
}

/// Hex HMAC-SHA256 of `timestamp "." body`, as NewReleases sends it.
#[must_use]
pub fn sign(secret: &str, timestamp: &str, body: &[u8]) -> Option<String> {
    mac_for(secret, timestamp, body).map(|mac| hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature against the expected digest.
#[must_use]
pub fn verify(secret: &str, timestamp: &str, body: &[u8], signature: &str) -> bool {
    let Ok(provided) = hex::decode(signature.trim()) else {
        return false;
    };

    mac_for(secret, timestamp, body)
        .is_some_and(|mac| mac.verify_slice(&provided).is_ok())
}
