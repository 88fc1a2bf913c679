//! Core functionality for the authenticated-contact key ring.
//!
//! This crate provides the fundamental types, configuration and logging
//! used across the authring workspace: user handles, key types and their
//! per-type configuration table, authentication methods, confidence levels,
//! fingerprints and a clock abstraction.

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthringConfig, CommitConfig, LogFormat, LoggingConfig, StorageBackend, StorageConfig};
pub use error::{CoreError, Result};
pub use types::{
    equal_fingerprints, AuthMethod, Fingerprint, Handle, KeyConfidence, KeyType, KeyTypeInfo,
    FINGERPRINT_HEX_LEN, FINGERPRINT_LEN, HANDLE_ENCODED_LEN, HANDLE_LEN,
};
