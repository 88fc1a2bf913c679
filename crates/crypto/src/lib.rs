//! Fingerprint and signature engine for the authenticated-contact key ring.
//!
//! This crate provides the cryptographic side of the authring:
//!
//! - **Fingerprints**: SHA-256 over the key material, truncated to 20 bytes
//! - **Key signatures**: detached Ed25519 signatures over a timestamped key
//!   string, made with the user's own identity key
//! - **Own key pairs**: Ed25519 identity and Cu25519 encryption key pairs,
//!   zeroized on drop
//!
//! # Security Principles
//!
//! - Never roll custom cryptographic primitives
//! - Signatures carrying future timestamps are never verified
//! - Secrets must never be logged

pub mod error;
pub mod fingerprint;
pub mod keys;
pub mod signing;
pub mod timestamp;

pub use error::{CryptoError, Result};
pub use fingerprint::{compute_fingerprint, format_fingerprint};
pub use keys::{EncryptionKeyPair, IdentityKeyPair, PublicKey, RsaPublicKey, CURVE25519_KEY_LEN};
pub use signing::{
    signed_key_string, verify_key, KeySigner, SigningMetrics, KEY_AUTH_PREFIX, SIGNED_KEY_LEN,
};
pub use timestamp::{decode_timestamp, encode_timestamp, MAX_SAFE_INTEGER, TIMESTAMP_LEN};
