//! Key Signing Service
//!
//! Signs other public keys with the user's own Ed25519 identity key and
//! verifies such signatures.
//!
//! # Signed string
//!
//! ```text
//! "keyauth" || timestamp (8 bytes, big-endian, seconds) || key material
//! ```
//!
//! Key material is the raw 32 byte key for Ed25519/Cu25519 and modulus
//! followed by exponent for RSA. The stored signature is the timestamp
//! followed by the 64 byte detached Ed25519 signature.
//!
//! # Security Model
//!
//! - Only the signed string is ever signed, never the bare key
//! - Signatures carrying a timestamp in the future are not verified
//! - Private keys never leave this service

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use authring_core::{Clock, KeyType, SystemClock};
use ed25519_dalek::{Signature, Verifier, VerifyingKey, SIGNATURE_LENGTH};
use tracing::debug;

use crate::error::Result;
use crate::keys::{IdentityKeyPair, PublicKey, CURVE25519_KEY_LEN};
use crate::timestamp::{decode_timestamp, encode_timestamp, TIMESTAMP_LEN};

/// Prefix of every signed key string.
pub const KEY_AUTH_PREFIX: &[u8] = b"keyauth";

/// Length of a stored key signature (timestamp + Ed25519 signature).
pub const SIGNED_KEY_LEN: usize = TIMESTAMP_LEN + SIGNATURE_LENGTH;

/// Builds `"keyauth" || timestamp || key_material`.
pub fn signed_key_string(timestamp: &[u8; TIMESTAMP_LEN], key_material: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(KEY_AUTH_PREFIX.len() + TIMESTAMP_LEN + key_material.len());
    message.extend_from_slice(KEY_AUTH_PREFIX);
    message.extend_from_slice(timestamp);
    message.extend_from_slice(key_material);
    message
}

/// Metrics for observability.
#[derive(Debug, Default)]
pub struct SigningMetrics {
    pub keys_signed_total: AtomicU64,
    pub signing_errors_total: AtomicU64,
}

/// Signs public keys with the user's own identity key.
pub struct KeySigner {
    identity: IdentityKeyPair,
    clock: Arc<dyn Clock>,
    metrics: SigningMetrics,
}

impl KeySigner {
    /// Creates a signer that timestamps with the system clock.
    pub fn new(identity: IdentityKeyPair) -> Self {
        Self::with_clock(identity, Arc::new(SystemClock))
    }

    pub fn with_clock(identity: IdentityKeyPair, clock: Arc<dyn Clock>) -> Self {
        Self {
            identity,
            clock,
            metrics: SigningMetrics::default(),
        }
    }

    pub fn identity(&self) -> &IdentityKeyPair {
        &self.identity
    }

    /// Our own Ed25519 public key, the key that verifies our signatures.
    pub fn public_key_bytes(&self) -> [u8; CURVE25519_KEY_LEN] {
        self.identity.public_key_bytes()
    }

    /// Signs `pub_key` as a key of type `key_type`.
    ///
    /// Returns `timestamp || signature`.
    ///
    /// # Examples
    /// ```
    /// use authring_core::KeyType;
    /// use authring_crypto::{EncryptionKeyPair, IdentityKeyPair, KeySigner, SIGNED_KEY_LEN};
    ///
    /// let signer = KeySigner::new(IdentityKeyPair::generate());
    /// let encryption = EncryptionKeyPair::generate();
    ///
    /// let signature = signer.sign_key(&encryption.public_key(), KeyType::Cu25519).unwrap();
    /// assert_eq!(signature.len(), SIGNED_KEY_LEN);
    /// ```
    pub fn sign_key(&self, pub_key: &PublicKey, key_type: KeyType) -> Result<Vec<u8>> {
        let signed = self.sign_key_inner(pub_key, key_type);
        match &signed {
            Ok(_) => self.metrics.keys_signed_total.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.metrics.signing_errors_total.fetch_add(1, Ordering::Relaxed),
        };
        signed
    }

    fn sign_key_inner(&self, pub_key: &PublicKey, key_type: KeyType) -> Result<Vec<u8>> {
        let material = pub_key.key_material(key_type)?;
        let timestamp = encode_timestamp(self.clock.now_unix_secs())?;
        let signature = self.identity.sign(&signed_key_string(&timestamp, &material));

        let mut out = Vec::with_capacity(SIGNED_KEY_LEN);
        out.extend_from_slice(&timestamp);
        out.extend_from_slice(&signature.to_bytes());
        Ok(out)
    }

    pub fn metrics(&self) -> &SigningMetrics {
        &self.metrics
    }
}

/// Verifies a key signature produced by [`KeySigner::sign_key`].
///
/// Returns `None` when verification could not be attempted: a signature
/// too short to hold a timestamp, a malformed key or signer key, or a
/// timestamp strictly in the future of `clock`. Otherwise `Some(valid)`; a
/// signature part of the wrong length counts as invalid.
pub fn verify_key(
    signature: &[u8],
    pub_key: &PublicKey,
    key_type: KeyType,
    signer_pub: &[u8],
    clock: &dyn Clock,
) -> Option<bool> {
    if signature.len() < TIMESTAMP_LEN {
        debug!(len = signature.len(), "Key signature too short to verify");
        return None;
    }
    let (timestamp_bytes, signature_bytes) = signature.split_at(TIMESTAMP_LEN);

    let timestamp = decode_timestamp(timestamp_bytes).ok()?;
    if timestamp > clock.now_unix_secs() {
        debug!(timestamp, "Key signature timestamp is in the future");
        return None;
    }

    let material = pub_key.key_material(key_type).ok()?;
    let signer: [u8; CURVE25519_KEY_LEN] = signer_pub.try_into().ok()?;
    let verifying_key = VerifyingKey::from_bytes(&signer).ok()?;

    let Ok(signature) = Signature::from_slice(signature_bytes) else {
        return Some(false);
    };

    let mut timestamp_raw = [0u8; TIMESTAMP_LEN];
    timestamp_raw.copy_from_slice(timestamp_bytes);
    let message = signed_key_string(&timestamp_raw, &material);
    Some(verifying_key.verify(&message, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{EncryptionKeyPair, RsaPublicKey};
    use authring_core::ManualClock;

    const NOW: u64 = 1_700_000_000;

    fn signer_at(now: u64) -> (KeySigner, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let signer = KeySigner::with_clock(IdentityKeyPair::generate(), clock.clone());
        (signer, clock)
    }

    #[test]
    fn test_signed_key_string_layout() {
        let message = signed_key_string(&[0, 0, 0, 0, 0, 0, 0, 1], &[0xee; 32]);
        assert_eq!(&message[..7], b"keyauth");
        assert_eq!(&message[7..15], &[0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(&message[15..], &[0xee; 32]);
    }

    #[test]
    fn test_sign_then_verify() {
        let (signer, clock) = signer_at(NOW);
        let key = EncryptionKeyPair::generate().public_key();

        let signature = signer.sign_key(&key, KeyType::Cu25519).unwrap();
        assert_eq!(signature.len(), SIGNED_KEY_LEN);
        assert_eq!(&signature[..8], &NOW.to_be_bytes());

        let verified = verify_key(
            &signature,
            &key,
            KeyType::Cu25519,
            &signer.public_key_bytes(),
            clock.as_ref(),
        );
        assert_eq!(verified, Some(true));
        assert_eq!(signer.metrics().keys_signed_total.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_rsa_key_signature() {
        let (signer, clock) = signer_at(NOW);
        let key = PublicKey::Rsa(RsaPublicKey::new(vec![0xc5; 256], vec![0x01, 0x00, 0x01]));

        let signature = signer.sign_key(&key, KeyType::Rsa).unwrap();
        let verified = verify_key(
            &signature,
            &key,
            KeyType::Rsa,
            &signer.public_key_bytes(),
            clock.as_ref(),
        );
        assert_eq!(verified, Some(true));
    }

    #[test]
    fn test_verify_fails_for_other_key() {
        let (signer, clock) = signer_at(NOW);
        let key = EncryptionKeyPair::generate().public_key();
        let other = EncryptionKeyPair::generate().public_key();

        let signature = signer.sign_key(&key, KeyType::Cu25519).unwrap();
        let verified = verify_key(
            &signature,
            &other,
            KeyType::Cu25519,
            &signer.public_key_bytes(),
            clock.as_ref(),
        );
        assert_eq!(verified, Some(false));
    }

    #[test]
    fn test_verify_fails_for_other_signer() {
        let (signer, clock) = signer_at(NOW);
        let key = EncryptionKeyPair::generate().public_key();
        let stranger = IdentityKeyPair::generate();

        let signature = signer.sign_key(&key, KeyType::Cu25519).unwrap();
        let verified = verify_key(
            &signature,
            &key,
            KeyType::Cu25519,
            &stranger.public_key_bytes(),
            clock.as_ref(),
        );
        assert_eq!(verified, Some(false));
    }

    #[test]
    fn test_future_timestamp_is_not_verified() {
        let (signer, clock) = signer_at(NOW + 1);
        let key = EncryptionKeyPair::generate().public_key();
        let signature = signer.sign_key(&key, KeyType::Cu25519).unwrap();

        clock.set(NOW);
        let verified = verify_key(
            &signature,
            &key,
            KeyType::Cu25519,
            &signer.public_key_bytes(),
            clock.as_ref(),
        );
        assert_eq!(verified, None);

        clock.set(NOW + 1);
        let verified = verify_key(
            &signature,
            &key,
            KeyType::Cu25519,
            &signer.public_key_bytes(),
            clock.as_ref(),
        );
        assert_eq!(verified, Some(true));
    }

    #[test]
    fn test_unverifiable_inputs() {
        let (signer, clock) = signer_at(NOW);
        let key = EncryptionKeyPair::generate().public_key();
        let signer_pub = signer.public_key_bytes();

        assert_eq!(
            verify_key(&[], &key, KeyType::Cu25519, &signer_pub, clock.as_ref()),
            None
        );

        let signature = signer.sign_key(&key, KeyType::Cu25519).unwrap();
        assert_eq!(
            verify_key(&signature, &key, KeyType::Rsa, &signer_pub, clock.as_ref()),
            None
        );
        assert_eq!(
            verify_key(&signature, &key, KeyType::Cu25519, &[1, 2, 3], clock.as_ref()),
            None
        );
        assert_eq!(
            verify_key(
                &signature[..20],
                &key,
                KeyType::Cu25519,
                &signer_pub,
                clock.as_ref()
            ),
            Some(false)
        );
    }

    #[test]
    fn test_sign_rejects_bad_key() {
        let (signer, _) = signer_at(NOW);
        let short = PublicKey::Curve25519(vec![0u8; 16]);
        assert!(signer.sign_key(&short, KeyType::Cu25519).is_err());
        assert_eq!(signer.metrics().signing_errors_total.load(Ordering::Relaxed), 1);
    }
}
