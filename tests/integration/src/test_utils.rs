//! Test utilities for authring integration tests

use std::sync::Arc;

use authring::{AttributeScope, Authring, MemoryAttributeStore, MemoryKeyManager};
use authring_core::{Clock, Handle, KeyType, ManualClock};
use authring_crypto::{EncryptionKeyPair, IdentityKeyPair, KeySigner, PublicKey};

/// Fixed "now" for tests that care about signature timestamps
pub const NOW: u64 = 1_700_000_000;

/// Install a test subscriber once; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One logged-in account with in-memory collaborators
pub struct TestAccount {
    pub handle: Handle,
    pub store: Arc<MemoryAttributeStore>,
    pub keymgr: Arc<MemoryKeyManager>,
    pub clock: Arc<ManualClock>,
    pub authring: Authring,
}

impl TestAccount {
    pub fn new(handle: &str) -> Self {
        let handle: Handle = handle.parse().expect("valid test handle");
        let store = Arc::new(MemoryAttributeStore::new(handle));
        let keymgr = Arc::new(MemoryKeyManager::new_legacy());
        let clock = Arc::new(ManualClock::new(NOW));
        let authring = Authring::builder(handle, store.clone(), keymgr.clone())
            .clock(clock.clone())
            .build();

        Self {
            handle,
            store,
            keymgr,
            clock,
            authring,
        }
    }

    /// A fresh context over the same remote state, as after a reload
    pub fn reopen(&self) -> Authring {
        Authring::builder(self.handle, self.store.clone(), self.keymgr.clone())
            .clock(self.clock.clone())
            .build()
    }
}

/// A contact whose public keys are published in a shared store
pub struct TestContact {
    pub handle: Handle,
    pub signer: KeySigner,
    pub encryption: EncryptionKeyPair,
}

impl TestContact {
    pub fn new(handle: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            handle: handle.parse().expect("valid test handle"),
            signer: KeySigner::with_clock(IdentityKeyPair::generate(), clock),
            encryption: EncryptionKeyPair::generate(),
        }
    }

    pub fn identity_key(&self) -> PublicKey {
        self.signer.identity().public_key()
    }

    pub fn encryption_key(&self) -> PublicKey {
        self.encryption.public_key()
    }

    /// Publishes the identity key, the encryption key and its signature
    pub fn publish(&self, store: &MemoryAttributeStore) {
        let encryption = self.encryption_key();
        let signature = self
            .signer
            .sign_key(&encryption, KeyType::Cu25519)
            .expect("signing a curve key");

        store.insert(
            self.handle,
            "puEd255",
            AttributeScope::Public,
            self.signer.public_key_bytes().to_vec(),
        );
        store.insert(
            self.handle,
            "puCu255",
            AttributeScope::Public,
            self.encryption.public_key_bytes().to_vec(),
        );
        store.insert(self.handle, "sigCu255", AttributeScope::Public, signature);
    }
}
