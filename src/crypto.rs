//! Keyed MAC and nonce generation.
//!
//! The MAC is HMAC-SHA-256 over the serialized envelope with its `mac` field
//! omitted, truncated to 8 bytes. The nonce is 3 cryptographically random
//! bytes chosen once by the originator; forwarders must never mint a new
//! one (see [`crate::codec::envelope`]).

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

/// Length in bytes of the truncated MAC carried on the wire.
pub const MAC_LEN: usize = 8;

/// Length in bytes of a DTNEX nonce.
pub const NONCE_LEN: usize = 3;

type HmacSha256 = Hmac<Sha256>;

/// Compute the truncated keyed MAC over `message` (the envelope bytes with
/// the `mac` field omitted).
pub fn compute_mac(key: &str, message: &[u8]) -> [u8; MAC_LEN] {
    // HMAC accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message);
    let full = mac.finalize().into_bytes();
    let mut truncated = [0u8; MAC_LEN];
    truncated.copy_from_slice(&full[..MAC_LEN]);
    truncated
}

/// Verify `mac` against `message` under `key`, in constant time with
/// respect to the position of the first mismatching byte.
pub fn verify_mac(key: &str, message: &[u8], mac: &[u8; MAC_LEN]) -> bool {
    let expected = compute_mac(key, message);
    constant_time_eq(&expected, mac)
}

fn constant_time_eq(a: &[u8; MAC_LEN], b: &[u8; MAC_LEN]) -> bool {
    let mut diff = 0u8;
    for i in 0..MAC_LEN {
        diff |= a[i] ^ b[i];
    }
    diff == 0
}

/// Generate a fresh 3-byte nonce for an originated envelope.
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}
