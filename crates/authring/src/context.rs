//! The authring context: one per logged-in account.
//!
//! Owns the three rings, the own key material, the session identity and the
//! coordination state. Cheap to clone; clones share everything.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use authring_core::{AuthringConfig, Clock, Handle, KeyType, SystemClock};
use authring_crypto::{PublicKey, RsaPublicKey};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::error;

use crate::error::{AuthringError, Result};
use crate::flight::Flight;
use crate::init::InitState;
use crate::keymgr::KeyManager;
use crate::keyring::OwnKeys;
use crate::ring::AuthRing;
use crate::store::AttributeStore;

/// Metrics for observability.
#[derive(Debug, Default)]
pub struct AuthringMetrics {
    pub keypairs_generated: AtomicU64,
    pub ring_loads: AtomicU64,
    pub ring_persists: AtomicU64,
    pub commits: AtomicU64,
    pub shares_completions: AtomicU64,
    pub signatures_refreshed: AtomicU64,
    pub public_keys_repaired: AtomicU64,
}

impl AuthringMetrics {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Receiver side of the fatal-error broadcast.
///
/// Holds `Some(err)` once the context hit an unrecoverable error. Hosts
/// must end the session when that happens.
pub type FatalSignal = watch::Receiver<Option<AuthringError>>;

pub(crate) struct Inner {
    pub(crate) owner: Handle,
    pub(crate) session: RwLock<Handle>,
    pub(crate) config: AuthringConfig,
    pub(crate) store: Arc<dyn AttributeStore>,
    pub(crate) keymgr: Arc<dyn KeyManager>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) rsa_key: Option<RsaPublicKey>,
    /// Indexed by `KeyType::index`; `None` until loaded
    pub(crate) rings: Mutex<[Option<AuthRing>; 3]>,
    pub(crate) own_keys: RwLock<Option<Arc<OwnKeys>>>,
    pub(crate) init: Mutex<InitState>,
    /// Lock order: `ring_loads` before `rings`
    pub(crate) ring_loads: Mutex<[Option<Flight>; 3]>,
    pub(crate) persist_locks: [tokio::sync::Mutex<()>; 3],
    pub(crate) pending_commit: Mutex<Option<Flight>>,
    pub(crate) pending_shares: Mutex<Option<Flight>>,
    pub(crate) public_keys: Mutex<HashMap<(Handle, KeyType), PublicKey>>,
    poisoned: AtomicBool,
    fatal: watch::Sender<Option<AuthringError>>,
    pub(crate) metrics: AuthringMetrics,
}

/// Authenticated-contact key ring of one account.
#[derive(Clone)]
pub struct Authring {
    pub(crate) inner: Arc<Inner>,
}

impl Authring {
    pub fn builder(
        owner: Handle,
        store: Arc<dyn AttributeStore>,
        keymgr: Arc<dyn KeyManager>,
    ) -> AuthringBuilder {
        AuthringBuilder {
            owner,
            store,
            keymgr,
            config: AuthringConfig::default(),
            clock: Arc::new(SystemClock),
            rsa_key: None,
        }
    }

    /// The account this context was built for.
    pub fn owner(&self) -> Handle {
        self.inner.owner
    }

    pub fn session_account(&self) -> Handle {
        *self.inner.session.read()
    }

    /// Records the account the host session is currently logged in as.
    pub fn set_session_account(&self, handle: Handle) {
        *self.inner.session.write() = handle;
    }

    pub fn config(&self) -> &AuthringConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> &AuthringMetrics {
        &self.inner.metrics
    }

    pub fn fatal_signal(&self) -> FatalSignal {
        self.inner.fatal.subscribe()
    }

    pub fn is_poisoned(&self) -> bool {
        self.inner.poisoned.load(Ordering::SeqCst)
    }

    /// Our own public key of `key_type`, once initialised.
    pub fn own_public_key(&self, key_type: KeyType) -> Option<PublicKey> {
        self.own_keys()?.public_key(key_type)
    }

    pub(crate) fn own_keys(&self) -> Option<Arc<OwnKeys>> {
        self.inner.own_keys.read().clone()
    }

    pub(crate) fn check_poisoned(&self) -> Result<()> {
        if self.is_poisoned() {
            return Err(AuthringError::Poisoned);
        }
        Ok(())
    }

    /// Refuses to go on unless the session account owns this keyring.
    ///
    /// A mismatch poisons the context and is broadcast on the fatal
    /// signal; every later operation fails.
    pub(crate) fn assert_safe_state(&self) -> Result<()> {
        self.check_poisoned()?;

        let owner = self.inner.owner;
        let session = self.session_account();
        if session == owner {
            return Ok(());
        }

        error!(
            owner = %owner,
            session = %session,
            "Session account does not own the active keyring, refusing to continue"
        );
        let err = AuthringError::IdentityMismatch { owner, session };
        self.inner.poisoned.store(true, Ordering::SeqCst);
        self.inner.fatal.send_replace(Some(err.clone()));
        Err(err)
    }

    pub(crate) fn uses_key_manager(&self, key_type: KeyType) -> bool {
        key_type != KeyType::Rsa && self.inner.keymgr.is_secure()
    }
}

impl fmt::Debug for Authring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authring")
            .field("owner", &self.inner.owner)
            .field("poisoned", &self.is_poisoned())
            .finish_non_exhaustive()
    }
}

pub struct AuthringBuilder {
    owner: Handle,
    store: Arc<dyn AttributeStore>,
    keymgr: Arc<dyn KeyManager>,
    config: AuthringConfig,
    clock: Arc<dyn Clock>,
    rsa_key: Option<RsaPublicKey>,
}

impl AuthringBuilder {
    pub fn config(mut self, config: AuthringConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The account's legacy RSA public key, when its private key is held
    /// locally. Enables the RSA ring.
    pub fn legacy_rsa_key(mut self, key: RsaPublicKey) -> Self {
        self.rsa_key = Some(key);
        self
    }

    pub fn build(self) -> Authring {
        let (fatal, _) = watch::channel(None);
        Authring {
            inner: Arc::new(Inner {
                owner: self.owner,
                session: RwLock::new(self.owner),
                config: self.config,
                store: self.store,
                keymgr: self.keymgr,
                clock: self.clock,
                rsa_key: self.rsa_key,
                rings: Mutex::new([None, None, None]),
                own_keys: RwLock::new(None),
                init: Mutex::new(InitState::NotStarted),
                ring_loads: Mutex::new([None, None, None]),
                persist_locks: [
                    tokio::sync::Mutex::new(()),
                    tokio::sync::Mutex::new(()),
                    tokio::sync::Mutex::new(()),
                ],
                pending_commit: Mutex::new(None),
                pending_shares: Mutex::new(None),
                public_keys: Mutex::new(HashMap::new()),
                poisoned: AtomicBool::new(false),
                fatal,
                metrics: AuthringMetrics::default(),
            }),
        }
    }
}
