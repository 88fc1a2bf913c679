//! Trust records and the per-key-type authentication ring.

use std::collections::BTreeMap;

use authring_core::{AuthMethod, CoreError, Fingerprint, Handle, KeyConfidence};
use serde::{Deserialize, Serialize};

/// Trust state of one contact's key of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRecord {
    pub fingerprint: Fingerprint,
    pub method: AuthMethod,
    pub confidence: KeyConfidence,
}

impl TrustRecord {
    pub fn new(fingerprint: Fingerprint, method: AuthMethod, confidence: KeyConfidence) -> Self {
        Self {
            fingerprint,
            method,
            confidence,
        }
    }

    /// `(confidence << 4) | method`, the last byte of the wire record.
    pub fn trust_indicator(&self) -> u8 {
        ((self.confidence as u8) << 4) | (self.method as u8)
    }

    /// Splits a trust-indicator byte back into method and confidence.
    pub fn from_trust_indicator(fingerprint: Fingerprint, indicator: u8) -> Result<Self, CoreError> {
        let method = AuthMethod::try_from(indicator & 0x0f)?;
        let confidence = KeyConfidence::try_from(indicator >> 4)?;
        Ok(Self::new(fingerprint, method, confidence))
    }
}

/// Mapping of contact handle to trust record for one key type.
///
/// Ordered by handle so that serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthRing {
    records: BTreeMap<Handle, TrustRecord>,
}

impl AuthRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, handle: &Handle) -> Option<&TrustRecord> {
        self.records.get(handle)
    }

    pub fn contains(&self, handle: &Handle) -> bool {
        self.records.contains_key(handle)
    }

    pub fn insert(&mut self, handle: Handle, record: TrustRecord) -> Option<TrustRecord> {
        self.records.insert(handle, record)
    }

    /// Stores `record` unless an identical one is already present.
    ///
    /// Returns whether the ring changed.
    pub fn upsert(&mut self, handle: Handle, record: TrustRecord) -> bool {
        match self.records.get(&handle) {
            Some(existing) if *existing == record => false,
            _ => {
                self.records.insert(handle, record);
                true
            }
        }
    }

    pub fn remove(&mut self, handle: &Handle) -> Option<TrustRecord> {
        self.records.remove(handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Handle, &TrustRecord)> {
        self.records.iter()
    }
}

impl FromIterator<(Handle, TrustRecord)> for AuthRing {
    fn from_iter<I: IntoIterator<Item = (Handle, TrustRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
