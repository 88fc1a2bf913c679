//! Authenticated-contact key ring.
//!
//! Per contact and per key type the ring records a key fingerprint, how the
//! key was authenticated and with what confidence. It is used to notice and
//! warn about key changes: keys are trusted on first use, can be verified
//! manually by comparing fingerprints, or are authenticated by a signature
//! of the contact's identity key.
//!
//! # Architecture
//!
//! - [`codec`]: the 29-byte record wire format
//! - [`Authring`]: one context per account, owning the three rings, the own
//!   key pairs and the coordination state
//! - [`AttributeStore`] / [`KeyManager`]: the remote collaborators the
//!   rings are persisted through
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use authring::{Authring, MemoryAttributeStore, MemoryKeyManager};
//! use authring_core::{AuthMethod, Handle, KeyConfidence, KeyType};
//!
//! # async fn run() -> authring::Result<()> {
//! let me: Handle = "AAAAAAAAAAE".parse()?;
//! let bob: Handle = "AAAAAAAAAAI".parse()?;
//!
//! let authring = Authring::builder(
//!     me,
//!     Arc::new(MemoryAttributeStore::new(me)),
//!     Arc::new(MemoryKeyManager::new_legacy()),
//! )
//! .build();
//!
//! authring
//!     .set_contact_authenticated(
//!         &bob,
//!         "c0ffee00c0ffee00c0ffee00c0ffee00c0ffee00",
//!         KeyType::Ed25519,
//!         AuthMethod::FingerprintComparison,
//!         KeyConfidence::Unsure,
//!     )
//!     .await?;
//! assert!(authring.is_user_verified(&bob).await?);
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod context;
pub mod error;
pub mod facade;
pub mod flight;
mod init;
pub mod key_check;
pub mod keymgr;
pub mod keyring;
pub mod ring;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;
mod trust_store;

pub use codec::{
    decode_record, decode_ring, decode_ring_with_report, encode_record, encode_ring, DecodeReport,
    RawRecord, RECORD_LEN,
};
pub use context::{Authring, AuthringBuilder, AuthringMetrics, FatalSignal};
pub use error::{AuthringError, Result};
pub use facade::VerificationState;
pub use flight::Flight;
pub use key_check::KeyCheck;
pub use keymgr::{KeyManager, KeyManagerError, MemoryKeyManager};
pub use keyring::{Keyring, OwnKeys, KEYRING_ATTRIBUTE};
pub use ring::{AuthRing, TrustRecord};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteAttributeStore;
pub use store::{AttributeError, AttributeScope, AttributeStore, MemoryAttributeStore};
