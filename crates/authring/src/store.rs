//! Attribute store collaborator.
//!
//! The authring keeps everything it persists in named per-user attributes:
//! the three serialized rings and the keyring as private attributes, the
//! own public keys and their signatures as public ones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use authring_core::Handle;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// The attribute has never been written. An expected answer, not a
    /// failure.
    #[error("Attribute not found")]
    NotFound,

    #[error("Remote attribute error: {0}")]
    Remote(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeScope {
    /// Readable by every user
    Public,
    /// Encrypted, readable by the owner only
    Private,
}

impl AttributeScope {
    pub fn as_i64(self) -> i64 {
        match self {
            AttributeScope::Public => 0,
            AttributeScope::Private => 1,
        }
    }
}

/// Remote attribute storage.
///
/// `get` may read any user's attributes, `set` always writes the session
/// user's own.
#[async_trait]
pub trait AttributeStore: Send + Sync {
    async fn get(
        &self,
        owner: Handle,
        name: &str,
        scope: AttributeScope,
    ) -> Result<Vec<u8>, AttributeError>;

    async fn set(&self, name: &str, value: &[u8], scope: AttributeScope)
        -> Result<(), AttributeError>;
}

type AttributeKey = (Handle, String, AttributeScope);

/// In-process attribute store.
///
/// Writes land under the handle given at construction. Per-name call
/// counters and one-shot failure injection make it usable as a test double.
pub struct MemoryAttributeStore {
    owner: Handle,
    values: Mutex<HashMap<AttributeKey, Vec<u8>>>,
    gets: Mutex<HashMap<String, u64>>,
    sets: Mutex<HashMap<String, u64>>,
    failures: Mutex<HashMap<String, AttributeError>>,
    total_sets: AtomicU64,
}

impl MemoryAttributeStore {
    pub fn new(owner: Handle) -> Self {
        Self {
            owner,
            values: Mutex::new(HashMap::new()),
            gets: Mutex::new(HashMap::new()),
            sets: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            total_sets: AtomicU64::new(0),
        }
    }

    /// Seeds an attribute of any user without counting it as a write.
    pub fn insert(&self, owner: Handle, name: &str, scope: AttributeScope, value: Vec<u8>) {
        self.values
            .lock()
            .insert((owner, name.to_string(), scope), value);
    }

    /// Reads back a stored value without counting it as a get.
    pub fn peek(&self, owner: Handle, name: &str, scope: AttributeScope) -> Option<Vec<u8>> {
        self.values
            .lock()
            .get(&(owner, name.to_string(), scope))
            .cloned()
    }

    pub fn remove(&self, owner: Handle, name: &str, scope: AttributeScope) {
        self.values.lock().remove(&(owner, name.to_string(), scope));
    }

    /// Makes the next `get` or `set` of `name` fail with `error`.
    pub fn fail_once(&self, name: &str, error: AttributeError) {
        self.failures.lock().insert(name.to_string(), error);
    }

    pub fn get_count(&self, name: &str) -> u64 {
        self.gets.lock().get(name).copied().unwrap_or(0)
    }

    pub fn set_count(&self, name: &str) -> u64 {
        self.sets.lock().get(name).copied().unwrap_or(0)
    }

    pub fn total_sets(&self) -> u64 {
        self.total_sets.load(Ordering::SeqCst)
    }

    fn take_failure(&self, name: &str) -> Option<AttributeError> {
        self.failures.lock().remove(name)
    }
}

#[async_trait]
impl AttributeStore for MemoryAttributeStore {
    async fn get(
        &self,
        owner: Handle,
        name: &str,
        scope: AttributeScope,
    ) -> Result<Vec<u8>, AttributeError> {
        *self.gets.lock().entry(name.to_string()).or_insert(0) += 1;
        if let Some(err) = self.take_failure(name) {
            return Err(err);
        }
        self.values
            .lock()
            .get(&(owner, name.to_string(), scope))
            .cloned()
            .ok_or(AttributeError::NotFound)
    }

    async fn set(
        &self,
        name: &str,
        value: &[u8],
        scope: AttributeScope,
    ) -> Result<(), AttributeError> {
        *self.sets.lock().entry(name.to_string()).or_insert(0) += 1;
        self.total_sets.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure(name) {
            return Err(err);
        }
        debug!(attribute = name, len = value.len(), "Storing attribute");
        self.values
            .lock()
            .insert((self.owner, name.to_string(), scope), value.to_vec());
        Ok(())
    }
}
