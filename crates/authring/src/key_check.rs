//! Key-change detection for contacts' keys.
//!
//! Identity keys are trusted on first use. Later sightings are compared
//! with the recorded fingerprint, and a differing key is reported without
//! touching the ring until the user accepts it. Encryption keys are
//! authenticated by the contact's identity key signature.

use authring_core::{AuthMethod, Fingerprint, Handle, KeyConfidence, KeyType};
use authring_crypto::{compute_fingerprint, verify_key, CryptoError, PublicKey};
use tracing::{debug, warn};

use crate::context::Authring;
use crate::error::Result;
use crate::ring::TrustRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCheck {
    /// The key belongs to our own account; nothing was recorded
    OwnKey,
    /// No previous record; the key is now recorded as seen
    FirstSeen(Fingerprint),
    Unchanged(TrustRecord),
    /// The recorded fingerprint differs; the ring was left untouched
    Changed {
        previous: TrustRecord,
        current: Fingerprint,
    },
    SignatureVerified(Fingerprint),
    SignatureInvalid,
    /// The signature could not be checked (missing, malformed or dated in
    /// the future)
    Unverifiable,
}

impl Authring {
    /// Checks a contact's Ed25519 key against the ring.
    pub async fn observe_ed25519_key(&self, handle: &Handle, key: &PublicKey) -> Result<KeyCheck> {
        if *handle == self.inner.owner {
            return Ok(KeyCheck::OwnKey);
        }
        let current = compute_fingerprint(key, KeyType::Ed25519)?;
        self.initialise().await?;

        match self.contact_authenticated(handle, KeyType::Ed25519) {
            None => {
                self.remember_public_key(*handle, KeyType::Ed25519, key.clone());
                self.set_contact_authenticated(
                    handle,
                    current,
                    KeyType::Ed25519,
                    AuthMethod::Seen,
                    KeyConfidence::Unsure,
                )
                .await?;
                Ok(KeyCheck::FirstSeen(current))
            }
            Some(record) if record.fingerprint == current => {
                self.remember_public_key(*handle, KeyType::Ed25519, key.clone());
                Ok(KeyCheck::Unchanged(record))
            }
            Some(previous) => {
                warn!(
                    contact = %handle,
                    previous = %previous.fingerprint,
                    current = %current,
                    "Ed25519 key of contact changed"
                );
                Ok(KeyCheck::Changed { previous, current })
            }
        }
    }

    /// Verifies a contact's Cu25519 or RSA key against the signature made
    /// with the contact's Ed25519 key, and records it on success.
    ///
    /// The contact's published signing key is checked first; if it changed,
    /// that is reported instead and nothing is recorded.
    pub async fn observe_signed_key(
        &self,
        handle: &Handle,
        key: &PublicKey,
        key_type: KeyType,
        signature: &[u8],
    ) -> Result<KeyCheck> {
        if !key_type.info().signed_by_identity {
            return Err(CryptoError::UnsupportedKeyType(key_type).into());
        }
        if *handle == self.inner.owner {
            return Ok(KeyCheck::OwnKey);
        }
        let current = compute_fingerprint(key, key_type)?;
        self.initialise().await?;
        self.load_ring(key_type).await?;

        let signer = self.published_public_key(handle, KeyType::Ed25519).await?;
        let signer_check = self.observe_ed25519_key(handle, &signer).await?;
        if matches!(signer_check, KeyCheck::Changed { .. }) {
            return Ok(signer_check);
        }
        let signer = signer.key_material(KeyType::Ed25519)?;

        match verify_key(signature, key, key_type, &signer, self.inner.clock.as_ref()) {
            Some(true) => {
                self.remember_public_key(*handle, key_type, key.clone());
                self.set_contact_authenticated(
                    handle,
                    current,
                    key_type,
                    AuthMethod::SignatureVerified,
                    KeyConfidence::Unsure,
                )
                .await?;
                Ok(KeyCheck::SignatureVerified(current))
            }
            Some(false) => {
                warn!(contact = %handle, key_type = %key_type, "Key signature of contact is invalid");
                Ok(KeyCheck::SignatureInvalid)
            }
            None => {
                debug!(contact = %handle, key_type = %key_type, "Key signature of contact could not be verified");
                Ok(KeyCheck::Unverifiable)
            }
        }
    }

    /// Records a changed Ed25519 key the user chose to accept. Any earlier
    /// verification is dropped back to `Seen`.
    pub async fn accept_changed_key(&self, handle: &Handle, key: &PublicKey) -> Result<bool> {
        let fingerprint = compute_fingerprint(key, KeyType::Ed25519)?;
        if *handle != self.inner.owner {
            self.remember_public_key(*handle, KeyType::Ed25519, key.clone());
        }
        self.set_contact_authenticated(
            handle,
            fingerprint,
            KeyType::Ed25519,
            AuthMethod::Seen,
            KeyConfidence::Unsure,
        )
        .await
    }
}
