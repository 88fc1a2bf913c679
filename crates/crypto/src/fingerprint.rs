//! Key fingerprints: SHA-256 over the key material, truncated to 20 bytes.

use authring_core::{Fingerprint, KeyType, FINGERPRINT_LEN};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::keys::PublicKey;

/// Computes the fingerprint of `key` interpreted as `key_type`.
///
/// Curve keys must be exactly 32 bytes; RSA keys hash modulus followed by
/// exponent. Use [`Fingerprint::as_bytes`] for the raw form and
/// [`Fingerprint::to_hex`] for the 40-character form.
pub fn compute_fingerprint(key: &PublicKey, key_type: KeyType) -> Result<Fingerprint> {
    let material = key.key_material(key_type)?;
    let digest = Sha256::digest(&material);
    let mut raw = [0u8; FINGERPRINT_LEN];
    raw.copy_from_slice(&digest[..FINGERPRINT_LEN]);
    Ok(Fingerprint::from_bytes(raw))
}

/// Upper-case hex in space separated groups of four, for reading aloud or
/// comparing side by side.
pub fn format_fingerprint(fingerprint: &Fingerprint) -> String {
    let hex = fingerprint.to_hex().to_uppercase();
    hex.as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
