//! Core types shared by every authring crate.
//!
//! Handles identify users, key types select one of the three independent
//! rings, and the method/confidence pair is the trust state stored per
//! contact.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Raw length of a user handle in bytes.
pub const HANDLE_LEN: usize = 8;

/// Length of the base64url display form of a handle.
pub const HANDLE_ENCODED_LEN: usize = 11;

/// Length of a fingerprint in raw bytes (truncated SHA-256).
pub const FINGERPRINT_LEN: usize = 20;

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_HEX_LEN: usize = FINGERPRINT_LEN * 2;

/// An eight byte user identifier, displayed as 11 characters of unpadded
/// base64url.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Handle([u8; HANDLE_LEN]);

impl Handle {
    /// Wraps raw handle bytes.
    pub const fn from_bytes(bytes: [u8; HANDLE_LEN]) -> Self {
        Self(bytes)
    }

    /// Builds a handle from a slice that must be exactly eight bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; HANDLE_LEN] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidHandle(hex::encode(bytes)))?;
        Ok(Self(raw))
    }

    /// Parses the 11-character display form.
    pub fn parse(encoded: &str) -> Result<Self> {
        if encoded.len() != HANDLE_ENCODED_LEN {
            return Err(CoreError::InvalidHandle(encoded.to_string()));
        }
        let decoded = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| CoreError::InvalidHandle(encoded.to_string()))?;
        Self::from_slice(&decoded).map_err(|_| CoreError::InvalidHandle(encoded.to_string()))
    }

    /// Raw handle bytes, as written on the wire.
    pub fn as_bytes(&self) -> &[u8; HANDLE_LEN] {
        &self.0
    }

    /// The 11-character display form.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }
}

impl FromStr for Handle {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Handle {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Handle> for String {
    fn from(handle: Handle) -> Self {
        handle.encode()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.encode())
    }
}

/// Key types tracked by the authentication rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyType {
    /// Identity / signing key
    Ed25519,
    /// Encryption key
    Cu25519,
    /// Legacy encryption key
    #[serde(rename = "RSA")]
    Rsa,
}

/// Static per-key-type configuration.
#[derive(Debug)]
pub struct KeyTypeInfo {
    /// Canonical name ("Ed25519", "Cu25519", "RSA")
    pub name: &'static str,
    /// Private attribute holding the serialized ring
    pub ring_attribute: &'static str,
    /// Public attribute holding the user's own public key
    pub public_key_attribute: &'static str,
    /// Public attribute holding the signature over the public key
    pub signature_attribute: Option<&'static str>,
    /// Tag of the private key inside the keyring container
    pub keyring_tag: Option<&'static str>,
    /// Whether the public key is signed with the own Ed25519 key
    pub signed_by_identity: bool,
    /// Raw public key length, `None` for variable-length RSA keys
    pub public_key_len: Option<usize>,
}

static KEY_TYPES: [KeyTypeInfo; 3] = [
    KeyTypeInfo {
        name: "Ed25519",
        ring_attribute: "authring",
        public_key_attribute: "puEd255",
        signature_attribute: None,
        keyring_tag: Some("prEd255"),
        signed_by_identity: false,
        public_key_len: Some(32),
    },
    KeyTypeInfo {
        name: "Cu25519",
        ring_attribute: "authCu255",
        public_key_attribute: "puCu255",
        signature_attribute: Some("sigCu255"),
        keyring_tag: Some("prCu255"),
        signed_by_identity: true,
        public_key_len: Some(32),
    },
    KeyTypeInfo {
        name: "RSA",
        ring_attribute: "authRSA",
        public_key_attribute: "pubk",
        signature_attribute: Some("sigPubk"),
        keyring_tag: None,
        signed_by_identity: true,
        public_key_len: None,
    },
];

impl KeyType {
    /// All key types, in ring index order.
    pub const ALL: [KeyType; 3] = [KeyType::Ed25519, KeyType::Cu25519, KeyType::Rsa];

    /// Position of this key type in per-type tables.
    pub const fn index(self) -> usize {
        match self {
            KeyType::Ed25519 => 0,
            KeyType::Cu25519 => 1,
            KeyType::Rsa => 2,
        }
    }

    /// Static configuration for this key type.
    pub fn info(self) -> &'static KeyTypeInfo {
        &KEY_TYPES[self.index()]
    }

    /// Canonical name.
    pub fn name(self) -> &'static str {
        self.info().name
    }
}

impl FromStr for KeyType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        KeyType::ALL
            .into_iter()
            .find(|kt| kt.name() == s)
            .ok_or_else(|| CoreError::UnsupportedKeyType(s.to_string()))
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a contact's key was authenticated. Ordered by strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum AuthMethod {
    /// Unverified sighting (trust on first use)
    Seen = 0x00,
    /// Manually verified by comparing fingerprints
    FingerprintComparison = 0x01,
    /// Verified through a signature by the contact's identity key
    SignatureVerified = 0x02,
}

impl TryFrom<u8> for AuthMethod {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(AuthMethod::Seen),
            0x01 => Ok(AuthMethod::FingerprintComparison),
            0x02 => Ok(AuthMethod::SignatureVerified),
            other => Err(CoreError::InvalidAuthMethod(other)),
        }
    }
}

/// Confidence in a recorded key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum KeyConfidence {
    Unsure = 0x00,
}

impl TryFrom<u8> for KeyConfidence {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(KeyConfidence::Unsure),
            other => Err(CoreError::InvalidConfidence(other)),
        }
    }
}

/// A 20 byte key fingerprint (truncated SHA-256).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    /// Wraps raw fingerprint bytes.
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    /// Accepts either 20 raw bytes or 40 hex characters; hex is detected by
    /// length.
    pub fn from_slice(input: &[u8]) -> Result<Self> {
        match input.len() {
            FINGERPRINT_LEN => {
                let mut raw = [0u8; FINGERPRINT_LEN];
                raw.copy_from_slice(input);
                Ok(Self(raw))
            }
            FINGERPRINT_HEX_LEN => {
                let mut raw = [0u8; FINGERPRINT_LEN];
                hex::decode_to_slice(input, &mut raw)
                    .map_err(|_| CoreError::InvalidFingerprint { len: input.len() })?;
                Ok(Self(raw))
            }
            len => Err(CoreError::InvalidFingerprint { len }),
        }
    }

    /// Raw fingerprint bytes.
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Lower-case hex form (40 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for Fingerprint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Fingerprint {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_slice(s.as_bytes())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compares two fingerprints given in either raw or hex form.
///
/// Returns `None` when either side is absent. Inputs that are neither form
/// are compared byte for byte.
pub fn equal_fingerprints(a: Option<&[u8]>, b: Option<&[u8]>) -> Option<bool> {
    let (a, b) = (a?, b?);
    match (Fingerprint::from_slice(a), Fingerprint::from_slice(b)) {
        (Ok(a), Ok(b)) => Some(a == b),
        _ => Some(a == b),
    }
}
