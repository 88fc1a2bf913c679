//! Initialization coordinator.
//!
//! ```text
//! NotStarted --initialise()--> InProgress(flight) --ok--> Done
//!      ^                               |
//!      +------------- err -------------+
//! ```
//!
//! The flight is installed before anything is awaited, so every caller that
//! arrives while it runs joins it instead of starting a second one.

use std::sync::Arc;

use authring_core::KeyType;
use authring_crypto::verify_key;
use tracing::{debug, info, warn};

use crate::context::{Authring, AuthringMetrics};
use crate::error::Result;
use crate::flight::Flight;
use crate::keyring::{Keyring, OwnKeys, KEYRING_ATTRIBUTE};
use crate::store::{AttributeError, AttributeScope};

#[derive(Debug)]
pub(crate) enum InitState {
    NotStarted,
    InProgress(Flight),
    Done,
}

impl Authring {
    /// Brings up the own key pairs and the rings. Safe to call any number
    /// of times from any number of tasks; the work runs once.
    pub async fn initialise(&self) -> Result<()> {
        self.check_poisoned()?;

        let flight = {
            let mut state = self.inner.init.lock();
            match &*state {
                InitState::Done => return Ok(()),
                InitState::InProgress(flight) => flight.clone(),
                InitState::NotStarted => {
                    let this = self.clone();
                    let flight = Flight::spawn(async move {
                        let outcome = this.run_initialisation().await;
                        *this.inner.init.lock() = if outcome.is_ok() {
                            InitState::Done
                        } else {
                            InitState::NotStarted
                        };
                        outcome
                    });
                    *state = InitState::InProgress(flight.clone());
                    flight
                }
            }
        };

        flight.wait().await
    }

    /// Whether initialisation has completed successfully.
    pub fn had_initialised(&self) -> bool {
        matches!(*self.inner.init.lock(), InitState::Done)
    }

    async fn run_initialisation(&self) -> Result<()> {
        self.assert_safe_state()?;
        info!(owner = %self.inner.owner, "Initialising authring");

        let keys = self.load_or_create_own_keys().await?;
        self.ensure_own_public_key(&keys, KeyType::Ed25519).await?;
        tokio::try_join!(
            self.load_ring(KeyType::Ed25519),
            self.load_ring(KeyType::Cu25519)
        )?;

        tokio::try_join!(self.init_rsa(&keys), self.init_cu25519(&keys))?;

        info!(owner = %self.inner.owner, "Authring initialised");
        Ok(())
    }

    async fn load_or_create_own_keys(&self) -> Result<Arc<OwnKeys>> {
        let existing = self.own_keys();
        if let Some(keys) = existing {
            return Ok(keys);
        }

        let owner = self.inner.owner;
        let clock = self.inner.clock.clone();
        let keys = match self
            .inner
            .store
            .get(owner, KEYRING_ATTRIBUTE, AttributeScope::Private)
            .await
        {
            Ok(bytes) => {
                debug!(owner = %owner, "Loaded keyring");
                OwnKeys::from_keyring(&Keyring::decode(&bytes)?, clock)?
            }
            Err(AttributeError::NotFound) => {
                info!(owner = %owner, "No keyring on file, generating key pairs");
                let keys = OwnKeys::generate(clock);
                AuthringMetrics::bump(&self.inner.metrics.keypairs_generated);

                let encoded = keys.to_keyring()?.encode()?;
                self.assert_safe_state()?;
                self.inner
                    .store
                    .set(KEYRING_ATTRIBUTE, &encoded, AttributeScope::Private)
                    .await?;
                keys
            }
            Err(err) => return Err(err.into()),
        };

        let keys = Arc::new(keys.with_rsa(self.inner.rsa_key.clone()));
        *self.inner.own_keys.write() = Some(keys.clone());
        Ok(keys)
    }

    /// Makes the public key on file match the one derived from our private
    /// key. The local key always wins.
    async fn ensure_own_public_key(&self, keys: &OwnKeys, key_type: KeyType) -> Result<()> {
        let Some(local) = keys.public_key(key_type) else {
            return Ok(());
        };
        let local = local.encode()?;
        let attribute = key_type.info().public_key_attribute;

        match self
            .inner
            .store
            .get(self.inner.owner, attribute, AttributeScope::Public)
            .await
        {
            Ok(remote) if remote == local => return Ok(()),
            Ok(_) => {
                warn!(key_type = %key_type, "Public key on file does not match local key, replacing it");
                AuthringMetrics::bump(&self.inner.metrics.public_keys_repaired);
            }
            Err(AttributeError::NotFound) => {
                info!(key_type = %key_type, "Publishing own public key");
            }
            Err(err) => return Err(err.into()),
        }

        self.assert_safe_state()?;
        self.inner
            .store
            .set(attribute, &local, AttributeScope::Public)
            .await?;
        Ok(())
    }

    /// Makes sure a valid signature by our Ed25519 key over our own
    /// `key_type` public key is on file.
    async fn ensure_signature(&self, keys: &OwnKeys, key_type: KeyType) -> Result<()> {
        let Some(attribute) = key_type.info().signature_attribute else {
            return Ok(());
        };
        let Some(local) = keys.public_key(key_type) else {
            return Ok(());
        };
        let signer_pub = keys.signer().public_key_bytes();

        match self
            .inner
            .store
            .get(self.inner.owner, attribute, AttributeScope::Public)
            .await
        {
            Ok(signature) => {
                match verify_key(
                    &signature,
                    &local,
                    key_type,
                    &signer_pub,
                    self.inner.clock.as_ref(),
                ) {
                    Some(true) => return Ok(()),
                    Some(false) => {
                        warn!(key_type = %key_type, "Own key signature is invalid, re-signing")
                    }
                    None => {
                        warn!(key_type = %key_type, "Own key signature could not be verified, re-signing")
                    }
                }
            }
            Err(AttributeError::NotFound) => {
                info!(key_type = %key_type, "No signature on file for own key, signing");
            }
            Err(err) => return Err(err.into()),
        }

        let signature = keys.signer().sign_key(&local, key_type)?;
        self.assert_safe_state()?;
        self.inner
            .store
            .set(attribute, &signature, AttributeScope::Public)
            .await?;
        AuthringMetrics::bump(&self.inner.metrics.signatures_refreshed);
        Ok(())
    }

    async fn init_rsa(&self, keys: &OwnKeys) -> Result<()> {
        if !keys.has_rsa() {
            debug!("No legacy RSA key, skipping RSA ring");
            return Ok(());
        }
        self.load_ring(KeyType::Rsa).await?;
        self.ensure_own_public_key(keys, KeyType::Rsa).await?;
        self.ensure_signature(keys, KeyType::Rsa).await
    }

    async fn init_cu25519(&self, keys: &OwnKeys) -> Result<()> {
        self.ensure_own_public_key(keys, KeyType::Cu25519).await?;
        self.ensure_signature(keys, KeyType::Cu25519).await
    }
}
