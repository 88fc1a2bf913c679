//! Error types for fingerprinting and key signatures.

use authring_core::KeyType;
use thiserror::Error;

/// Errors raised by the fingerprint and signature engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Unexpected {key_type} key length: {len}")]
    UnexpectedKeyLength { key_type: KeyType, len: usize },

    #[error("Unsupported key type for this key material: {0}")]
    UnsupportedKeyType(KeyType),

    #[error("Timestamp out of safe integer range: {0}")]
    TimestampOutOfRange(u64),

    #[error("Malformed timestamp of {0} bytes")]
    MalformedTimestamp(usize),

    #[error("Malformed key encoding: {0}")]
    MalformedKey(String),
}

/// Result type for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
