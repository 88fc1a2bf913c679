//! Key-manager collaborator.
//!
//! The key manager owns higher-level key state that depends on the rings.
//! In secure mode it also holds the authoritative copy of the Ed25519 and
//! Cu25519 rings, so those are staged with it instead of written as
//! attributes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use authring_core::KeyType;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct KeyManagerError(pub String);

#[async_trait]
pub trait KeyManager: Send + Sync {
    /// Whether the secure key manager is the source of truth for the
    /// Ed25519 and Cu25519 rings.
    fn is_secure(&self) -> bool;

    /// The key manager's cached serialized ring, if it has one.
    async fn cached_authring(&self, key_type: KeyType) -> Option<Vec<u8>>;

    /// Hands a serialized ring to the key manager; takes effect on `commit`.
    async fn stage_authring(&self, key_type: KeyType, ring: Vec<u8>)
        -> Result<(), KeyManagerError>;

    async fn commit(&self) -> Result<(), KeyManagerError>;

    async fn complete_pending_out_shares(&self) -> Result<(), KeyManagerError>;

    async fn accept_pending_in_shares(&self) -> Result<(), KeyManagerError>;
}

/// In-process key manager that counts what it is asked to do.
#[derive(Default)]
pub struct MemoryKeyManager {
    secure: bool,
    cache: Mutex<HashMap<KeyType, Vec<u8>>>,
    staged: Mutex<HashMap<KeyType, Vec<u8>>>,
    fail_commits: AtomicBool,
    commits: AtomicU64,
    out_shares: AtomicU64,
    in_shares: AtomicU64,
}

impl MemoryKeyManager {
    /// Legacy mode: rings live in the attribute store.
    pub fn new_legacy() -> Self {
        Self::default()
    }

    /// Secure mode: Ed25519 and Cu25519 rings live in the key manager.
    pub fn new_secure() -> Self {
        Self {
            secure: true,
            ..Self::default()
        }
    }

    /// Seeds the committed cache.
    pub fn with_cached_authring(self, key_type: KeyType, ring: Vec<u8>) -> Self {
        self.cache.lock().insert(key_type, ring);
        self
    }

    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn out_shares_count(&self) -> u64 {
        self.out_shares.load(Ordering::SeqCst)
    }

    pub fn in_shares_count(&self) -> u64 {
        self.in_shares.load(Ordering::SeqCst)
    }

    pub fn committed_authring(&self, key_type: KeyType) -> Option<Vec<u8>> {
        self.cache.lock().get(&key_type).cloned()
    }
}

#[async_trait]
impl KeyManager for MemoryKeyManager {
    fn is_secure(&self) -> bool {
        self.secure
    }

    async fn cached_authring(&self, key_type: KeyType) -> Option<Vec<u8>> {
        self.cache.lock().get(&key_type).cloned()
    }

    async fn stage_authring(
        &self,
        key_type: KeyType,
        ring: Vec<u8>,
    ) -> Result<(), KeyManagerError> {
        self.staged.lock().insert(key_type, ring);
        Ok(())
    }

    async fn commit(&self) -> Result<(), KeyManagerError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(KeyManagerError("commit rejected".to_string()));
        }
        let staged: Vec<_> = self.staged.lock().drain().collect();
        debug!(rings = staged.len(), "Committing key manager state");
        self.cache.lock().extend(staged);
        Ok(())
    }

    async fn complete_pending_out_shares(&self) -> Result<(), KeyManagerError> {
        self.out_shares.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn accept_pending_in_shares(&self) -> Result<(), KeyManagerError> {
        self.in_shares.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
