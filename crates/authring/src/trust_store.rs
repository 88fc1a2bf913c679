//! Trust store operations: loading, persisting and mutating the rings.

use std::time::Duration;

use authring_core::{AuthMethod, Fingerprint, Handle, KeyConfidence, KeyType};
use authring_crypto::{compute_fingerprint, PublicKey};
use tracing::{debug, warn};

use crate::codec::{decode_ring_with_report, encode_ring};
use crate::context::{Authring, AuthringMetrics};
use crate::error::{AuthringError, Result};
use crate::flight::Flight;
use crate::ring::{AuthRing, TrustRecord};
use crate::store::{AttributeError, AttributeScope};

impl Authring {
    /// Loads the `key_type` ring if needed and returns a snapshot of it.
    pub async fn get_contacts(&self, key_type: KeyType) -> Result<AuthRing> {
        self.check_poisoned()?;
        self.load_ring(key_type).await?;
        self.inner.rings.lock()[key_type.index()]
            .clone()
            .ok_or(AuthringError::RingNotLoaded(key_type))
    }

    /// Persists the `key_type` ring and waits for the coalesced commit.
    pub async fn set_contacts(&self, key_type: KeyType) -> Result<()> {
        self.initialise().await?;
        self.load_ring(key_type).await?;
        self.save_ring(key_type).await
    }

    /// The trust record of `handle`, if its ring is loaded and has one.
    pub fn contact_authenticated(&self, handle: &Handle, key_type: KeyType) -> Option<TrustRecord> {
        self.inner.rings.lock()[key_type.index()]
            .as_ref()?
            .get(handle)
            .copied()
    }

    /// Records how `handle`'s `key_type` key was authenticated.
    ///
    /// `fingerprint` may be 20 raw bytes or 40 hex characters. Returns
    /// whether the ring changed; unchanged records and our own handle cause
    /// no writes at all.
    pub async fn set_contact_authenticated(
        &self,
        handle: &Handle,
        fingerprint: impl AsRef<[u8]>,
        key_type: KeyType,
        method: AuthMethod,
        confidence: KeyConfidence,
    ) -> Result<bool> {
        if *handle == self.inner.owner {
            debug!("Ignoring authentication of own account");
            return Ok(false);
        }
        let fingerprint = Fingerprint::from_slice(fingerprint.as_ref())?;

        self.initialise().await?;
        self.load_ring(key_type).await?;
        self.assert_safe_state()?;

        let record = TrustRecord::new(fingerprint, method, confidence);
        let previous = {
            let mut rings = self.inner.rings.lock();
            let ring = rings[key_type.index()]
                .as_mut()
                .ok_or(AuthringError::RingNotLoaded(key_type))?;
            let previous = ring.get(handle).copied();
            if !ring.upsert(*handle, record) {
                return Ok(false);
            }
            previous
        };

        debug!(contact = %handle, key_type = %key_type, method = ?method, "Contact authentication changed");
        if let Err(err) = self.save_ring(key_type).await {
            warn!(contact = %handle, key_type = %key_type, error = %err, "Failed to persist contact authentication");
            self.revert_record(key_type, handle, record, previous);
            return Err(err);
        }
        self.schedule_shares_completion().wait().await?;
        Ok(true)
    }

    /// Demotes a manually verified Ed25519 record of `handle` back to
    /// `Seen`, with the fingerprint of the contact's current key.
    ///
    /// Returns `Ok(false)` without touching anything when the ring is not
    /// loaded, there is no record, or it was not verified by fingerprint
    /// comparison.
    pub async fn reset_fingerprints_for_user(&self, handle: &Handle) -> Result<bool> {
        if *handle == self.inner.owner {
            warn!("Refusing to reset fingerprints of own account");
            return Ok(false);
        }

        let existing = {
            let rings = self.inner.rings.lock();
            match rings[KeyType::Ed25519.index()].as_ref() {
                Some(ring) => ring.get(handle).copied(),
                None => {
                    warn!(contact = %handle, "Cannot reset fingerprints, Ed25519 ring not loaded");
                    return Ok(false);
                }
            }
        };
        let Some(existing) = existing else {
            warn!(contact = %handle, "Cannot reset fingerprints, no record for contact");
            return Ok(false);
        };
        if existing.method != AuthMethod::FingerprintComparison {
            warn!(
                contact = %handle,
                method = ?existing.method,
                "Cannot reset fingerprints of a record not verified by comparison"
            );
            return Ok(false);
        }

        let key = self.contact_public_key(handle, KeyType::Ed25519).await?;
        let fingerprint = compute_fingerprint(&key, KeyType::Ed25519)?;
        self.set_contact_authenticated(
            handle,
            fingerprint,
            KeyType::Ed25519,
            AuthMethod::Seen,
            existing.confidence,
        )
        .await?;
        Ok(true)
    }

    /// Forgets every contact of every key type.
    ///
    /// Each ring is persisted on its own; all three are attempted and the
    /// first failure is returned.
    pub async fn scrub_auth_ring(&self) -> Result<()> {
        self.assert_safe_state()?;
        warn!(owner = %self.inner.owner, "Scrubbing all authentication rings");

        {
            let mut rings = self.inner.rings.lock();
            for ring in rings.iter_mut() {
                *ring = Some(AuthRing::new());
            }
        }

        let mut first_error = None;
        for key_type in KeyType::ALL {
            if let Err(err) = self.persist_ring(key_type).await {
                warn!(key_type = %key_type, error = %err, "Failed to persist scrubbed ring");
                first_error.get_or_insert(err);
            }
        }
        if let Err(err) = self.schedule_commit().wait().await {
            first_error.get_or_insert(err);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Puts back the record `handle` had before a failed write, unless a
    /// later mutation already replaced `written`.
    fn revert_record(
        &self,
        key_type: KeyType,
        handle: &Handle,
        written: TrustRecord,
        previous: Option<TrustRecord>,
    ) {
        let mut rings = self.inner.rings.lock();
        let Some(ring) = rings[key_type.index()].as_mut() else {
            return;
        };
        if ring.get(handle) != Some(&written) {
            return;
        }
        match previous {
            Some(previous) => {
                ring.insert(*handle, previous);
            }
            None => {
                ring.remove(handle);
            }
        }
    }

    /// A contact's public key: from the cache, else from the contact's
    /// public key attribute.
    pub(crate) async fn contact_public_key(
        &self,
        handle: &Handle,
        key_type: KeyType,
    ) -> Result<PublicKey> {
        let cached = self.inner.public_keys.lock().get(&(*handle, key_type)).cloned();
        if let Some(key) = cached {
            return Ok(key);
        }

        let bytes = self
            .inner
            .store
            .get(*handle, key_type.info().public_key_attribute, AttributeScope::Public)
            .await?;
        let key = PublicKey::decode(key_type, &bytes)?;
        self.inner
            .public_keys
            .lock()
            .insert((*handle, key_type), key.clone());
        Ok(key)
    }

    /// A contact's currently published public key. Falls back to the cached
    /// key only when nothing is published.
    pub(crate) async fn published_public_key(
        &self,
        handle: &Handle,
        key_type: KeyType,
    ) -> Result<PublicKey> {
        match self
            .inner
            .store
            .get(*handle, key_type.info().public_key_attribute, AttributeScope::Public)
            .await
        {
            Ok(bytes) => Ok(PublicKey::decode(key_type, &bytes)?),
            Err(AttributeError::NotFound) => self
                .inner
                .public_keys
                .lock()
                .get(&(*handle, key_type))
                .cloned()
                .ok_or(AuthringError::Attribute(AttributeError::NotFound)),
            Err(err) => Err(err.into()),
        }
    }

    /// Loads the `key_type` ring once; concurrent callers share the fetch.
    pub(crate) async fn load_ring(&self, key_type: KeyType) -> Result<()> {
        let idx = key_type.index();
        let flight = {
            let mut loads = self.inner.ring_loads.lock();
            if self.inner.rings.lock()[idx].is_some() {
                return Ok(());
            }
            match &loads[idx] {
                Some(flight) => flight.clone(),
                None => {
                    let this = self.clone();
                    let flight = Flight::spawn(async move {
                        let outcome = this.fetch_ring(key_type).await;
                        this.inner.ring_loads.lock()[idx] = None;
                        outcome
                    });
                    loads[idx] = Some(flight.clone());
                    flight
                }
            }
        };
        flight.wait().await
    }

    async fn fetch_ring(&self, key_type: KeyType) -> Result<()> {
        if self.uses_key_manager(key_type) {
            let ring = match self.inner.keymgr.cached_authring(key_type).await {
                Some(bytes) => self.decode_logged(key_type, &bytes),
                None => AuthRing::new(),
            };
            self.install_ring(key_type, ring);
            return Ok(());
        }

        let attribute = key_type.info().ring_attribute;
        match self
            .inner
            .store
            .get(self.inner.owner, attribute, AttributeScope::Private)
            .await
        {
            Ok(bytes) => {
                let ring = self.decode_logged(key_type, &bytes);
                self.install_ring(key_type, ring);
                Ok(())
            }
            Err(AttributeError::NotFound) => {
                debug!(key_type = %key_type, "No ring on file, creating an empty one");
                self.install_ring(key_type, AuthRing::new());
                self.save_ring(key_type).await
            }
            Err(err) => Err(err.into()),
        }
    }

    fn decode_logged(&self, key_type: KeyType, bytes: &[u8]) -> AuthRing {
        let (ring, report) = decode_ring_with_report(bytes);
        debug!(
            key_type = %key_type,
            records = report.decoded,
            skipped = report.skipped,
            trailing_bytes = report.trailing_bytes,
            "Loaded ring"
        );
        ring
    }

    fn install_ring(&self, key_type: KeyType, ring: AuthRing) {
        let mut rings = self.inner.rings.lock();
        let slot = &mut rings[key_type.index()];
        if slot.is_none() {
            *slot = Some(ring);
        }
        AuthringMetrics::bump(&self.inner.metrics.ring_loads);
    }

    /// Writes the current snapshot of the `key_type` ring.
    ///
    /// Writes of one key type are serialized, so the last one to finish
    /// always carries the newest snapshot.
    pub(crate) async fn persist_ring(&self, key_type: KeyType) -> Result<()> {
        self.assert_safe_state()?;
        let _guard = self.inner.persist_locks[key_type.index()].lock().await;

        let encoded = self.inner.rings.lock()[key_type.index()]
            .as_ref()
            .map(encode_ring)
            .ok_or(AuthringError::RingNotLoaded(key_type))?;

        if self.uses_key_manager(key_type) {
            self.inner.keymgr.stage_authring(key_type, encoded).await?;
        } else {
            self.inner
                .store
                .set(key_type.info().ring_attribute, &encoded, AttributeScope::Private)
                .await?;
        }
        AuthringMetrics::bump(&self.inner.metrics.ring_persists);
        Ok(())
    }

    pub(crate) async fn save_ring(&self, key_type: KeyType) -> Result<()> {
        self.persist_ring(key_type).await?;
        self.schedule_commit().wait().await
    }

    /// Joins the pending key-manager commit, or schedules one.
    ///
    /// The token is cleared when the commit starts running, so mutations
    /// persisted after that point schedule a fresh commit.
    pub(crate) fn schedule_commit(&self) -> Flight {
        let mut pending = self.inner.pending_commit.lock();
        if let Some(flight) = pending.as_ref() {
            return flight.clone();
        }

        let this = self.clone();
        let flight = Flight::spawn(async move {
            this.idle_tick().await;
            this.inner.pending_commit.lock().take();
            debug!("Committing key manager state");
            AuthringMetrics::bump(&this.inner.metrics.commits);
            this.inner.keymgr.commit().await.map_err(AuthringError::from)
        });
        *pending = Some(flight.clone());
        flight
    }

    /// Retries share operations that were waiting on a contact's trust.
    pub(crate) fn schedule_shares_completion(&self) -> Flight {
        let mut pending = self.inner.pending_shares.lock();
        if let Some(flight) = pending.as_ref() {
            return flight.clone();
        }

        let this = self.clone();
        let flight = Flight::spawn(async move {
            this.idle_tick().await;
            this.inner.pending_shares.lock().take();
            this.complete_pending_shares().await
        });
        *pending = Some(flight.clone());
        flight
    }

    async fn complete_pending_shares(&self) -> Result<()> {
        AuthringMetrics::bump(&self.inner.metrics.shares_completions);
        self.inner.keymgr.complete_pending_out_shares().await?;
        self.inner.keymgr.accept_pending_in_shares().await?;
        Ok(())
    }

    async fn idle_tick(&self) {
        let delay = self.inner.config.commit_delay();
        if delay == Duration::ZERO {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
    }
}
