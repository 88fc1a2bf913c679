//! Core error types

use thiserror::Error;

/// Core error type for the authring workspace.
///
/// Kept `Clone` so that higher layers can share one failure among several
/// waiters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A user handle did not decode to exactly eight bytes
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// Key type name outside Ed25519 / Cu25519 / RSA
    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    /// Fingerprint input that is neither 20 raw bytes nor 40 hex characters
    #[error("Invalid fingerprint length: {len}")]
    InvalidFingerprint { len: usize },

    /// Authentication method nibble outside the assigned values
    #[error("Invalid authentication method: {0:#04x}")]
    InvalidAuthMethod(u8),

    /// Confidence nibble outside the assigned values
    #[error("Invalid key confidence: {0:#04x}")]
    InvalidConfidence(u8),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
