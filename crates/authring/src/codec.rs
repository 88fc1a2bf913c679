//! Binary record codec.
//!
//! # Wire format
//!
//! ```text
//! offset  len  field
//!      0    8  contact handle, raw bytes
//!      8   20  fingerprint, raw bytes
//!     28    1  trust indicator: confidence << 4 | method
//! ```
//!
//! A ring is the plain concatenation of such records, without header,
//! separator or length prefix.
//!
//! Decoding never fails. Records whose method or confidence nibble is not
//! assigned are skipped, and a trailing fragment shorter than one record is
//! discarded, so that one damaged entry never hides the rest of a ring.

use authring_core::{Fingerprint, Handle, FINGERPRINT_LEN, HANDLE_LEN};
use tracing::warn;

use crate::ring::{AuthRing, TrustRecord};

/// Length of one serialized record.
pub const RECORD_LEN: usize = HANDLE_LEN + FINGERPRINT_LEN + 1;

/// A record as read off the wire, before method/confidence validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord {
    pub handle: Handle,
    pub fingerprint: Fingerprint,
    pub method: u8,
    pub confidence: u8,
}

impl RawRecord {
    /// Checks the method and confidence nibbles.
    pub fn validate(&self) -> Option<(Handle, TrustRecord)> {
        let indicator = (self.confidence << 4) | self.method;
        TrustRecord::from_trust_indicator(self.fingerprint, indicator)
            .ok()
            .map(|record| (self.handle, record))
    }
}

/// Diagnostics of a ring decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeReport {
    /// Records accepted into the ring
    pub decoded: usize,
    /// Complete records dropped for invalid method/confidence
    pub skipped: usize,
    /// Bytes of an incomplete trailing record that were discarded
    pub trailing_bytes: usize,
}

/// Encodes one record: handle, raw fingerprint, then the trust indicator.
pub fn encode_record(handle: &Handle, record: &TrustRecord) -> [u8; RECORD_LEN] {
    let mut out = [0u8; RECORD_LEN];
    out[..HANDLE_LEN].copy_from_slice(handle.as_bytes());
    out[HANDLE_LEN..HANDLE_LEN + FINGERPRINT_LEN].copy_from_slice(record.fingerprint.as_bytes());
    out[RECORD_LEN - 1] = record.trust_indicator();
    out
}

/// Decodes one record from the head of `buf`.
///
/// Returns the record and the unconsumed tail, or `None` if fewer than
/// [`RECORD_LEN`] bytes remain.
pub fn decode_record(buf: &[u8]) -> Option<(RawRecord, &[u8])> {
    if buf.len() < RECORD_LEN {
        return None;
    }
    let (record, rest) = buf.split_at(RECORD_LEN);

    let mut handle = [0u8; HANDLE_LEN];
    handle.copy_from_slice(&record[..HANDLE_LEN]);
    let mut fingerprint = [0u8; FINGERPRINT_LEN];
    fingerprint.copy_from_slice(&record[HANDLE_LEN..HANDLE_LEN + FINGERPRINT_LEN]);
    let indicator = record[RECORD_LEN - 1];

    let raw = RawRecord {
        handle: Handle::from_bytes(handle),
        fingerprint: Fingerprint::from_bytes(fingerprint),
        method: indicator & 0x0f,
        confidence: indicator >> 4,
    };
    Some((raw, rest))
}

pub fn encode_ring(ring: &AuthRing) -> Vec<u8> {
    let mut out = Vec::with_capacity(ring.len() * RECORD_LEN);
    for (handle, record) in ring.iter() {
        out.extend_from_slice(&encode_record(handle, record));
    }
    out
}

pub fn decode_ring(buf: &[u8]) -> AuthRing {
    decode_ring_with_report(buf).0
}

pub fn decode_ring_with_report(buf: &[u8]) -> (AuthRing, DecodeReport) {
    let mut ring = AuthRing::new();
    let mut report = DecodeReport::default();
    let mut rest = buf;

    while let Some((raw, tail)) = decode_record(rest) {
        rest = tail;
        match raw.validate() {
            Some((handle, record)) => {
                ring.insert(handle, record);
                report.decoded += 1;
            }
            None => {
                warn!(
                    contact = %raw.handle,
                    method = raw.method,
                    confidence = raw.confidence,
                    "Skipping invalid authring record"
                );
                report.skipped += 1;
            }
        }
    }

    if !rest.is_empty() {
        warn!(bytes = rest.len(), "Discarding truncated authring record");
        report.trailing_bytes = rest.len();
    }

    (ring, report)
}
