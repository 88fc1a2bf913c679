//! Error types for the authring trust store.

use authring_core::{CoreError, Handle, KeyType};
use authring_crypto::CryptoError;
use thiserror::Error;

use crate::keymgr::KeyManagerError;
use crate::store::AttributeError;

/// Errors surfaced by [`crate::Authring`] operations.
///
/// `Clone` so that a single-flight outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthringError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Attribute store error: {0}")]
    Attribute(#[from] AttributeError),

    #[error("Key manager error: {0}")]
    KeyManager(#[from] KeyManagerError),

    /// The stored keyring container could not be parsed
    #[error("Malformed keyring: {0}")]
    Keyring(String),

    /// The session account is not the account this context was built for.
    ///
    /// Fatal: the host must end the session.
    #[error("Access denied: session account {session} does not own keyring of {owner}")]
    IdentityMismatch { owner: Handle, session: Handle },

    /// A fatal error was raised earlier; the context refuses all work.
    #[error("Authring context poisoned by an earlier fatal error")]
    Poisoned,

    /// The task driving a shared operation went away without an outcome
    #[error("Shared operation abandoned before completion")]
    FlightAbandoned,

    #[error("{0} ring is not loaded")]
    RingNotLoaded(KeyType),
}

impl AuthringError {
    /// Whether the host must treat this error as unrecoverable and tear
    /// down the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AuthringError::IdentityMismatch { .. } | AuthringError::Poisoned
        )
    }
}

/// Result type for authring operations.
pub type Result<T> = std::result::Result<T, AuthringError>;
