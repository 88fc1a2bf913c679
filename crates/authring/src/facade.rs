//! Read-only verification queries for the rest of the application.

use authring_core::{AuthMethod, Handle, KeyType};
use authring_crypto::PublicKey;
use serde::{Deserialize, Serialize};

use crate::context::Authring;
use crate::error::Result;

/// How far a contact's identity key has been verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    /// No record
    Unknown,
    /// Recorded on first use only
    Seen,
    /// Fingerprints compared by the user
    Verified,
    SignatureVerified,
}

impl From<AuthMethod> for VerificationState {
    fn from(method: AuthMethod) -> Self {
        match method {
            AuthMethod::Seen => VerificationState::Seen,
            AuthMethod::FingerprintComparison => VerificationState::Verified,
            AuthMethod::SignatureVerified => VerificationState::SignatureVerified,
        }
    }
}

impl Authring {
    /// Whether `handle`'s identity key was verified by fingerprint
    /// comparison or better. A missing record counts as unverified.
    pub async fn is_user_verified(&self, handle: &Handle) -> Result<bool> {
        self.is_verified_at_least(handle, KeyType::Ed25519, AuthMethod::FingerprintComparison)
            .await
    }

    pub async fn is_verified_at_least(
        &self,
        handle: &Handle,
        key_type: KeyType,
        method: AuthMethod,
    ) -> Result<bool> {
        self.initialise().await?;
        Ok(self
            .contact_authenticated(handle, key_type)
            .is_some_and(|record| record.method >= method))
    }

    pub async fn verification_state(&self, handle: &Handle) -> Result<VerificationState> {
        self.initialise().await?;
        Ok(self
            .contact_authenticated(handle, KeyType::Ed25519)
            .map_or(VerificationState::Unknown, |record| record.method.into()))
    }

    /// Caches a contact's public key, e.g. after fetching it for a chat.
    ///
    /// Used when fingerprints have to be recomputed.
    pub fn remember_public_key(&self, handle: Handle, key_type: KeyType, key: PublicKey) {
        self.inner.public_keys.lock().insert((handle, key_type), key);
    }
}
