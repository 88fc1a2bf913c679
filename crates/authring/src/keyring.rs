//! The user's own private keys and their storage container.
//!
//! # Container format
//!
//! The private `keyring` attribute is a sequence of entries:
//!
//! ```text
//! tag (ASCII) || 0x00 || length (u16, big-endian) || value
//! ```
//!
//! Tags come from the key-type table (`prEd255`, `prCu255`).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use authring_core::{Clock, KeyType};
use authring_crypto::{EncryptionKeyPair, IdentityKeyPair, KeySigner, PublicKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::error::{AuthringError, Result};

/// Private attribute that holds the keyring container.
pub const KEYRING_ATTRIBUTE: &str = "keyring";

/// Tag-to-value container, zeroized on drop.
#[derive(Default)]
pub struct Keyring {
    entries: BTreeMap<String, Zeroizing<Vec<u8>>>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: &str, value: Zeroizing<Vec<u8>>) {
        self.entries.insert(tag.to_string(), value);
    }

    pub fn get(&self, tag: &str) -> Option<&[u8]> {
        self.entries.get(tag).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encode(&self) -> Result<Zeroizing<Vec<u8>>> {
        let mut out = Zeroizing::new(Vec::new());
        for (tag, value) in &self.entries {
            let len = u16::try_from(value.len()).map_err(|_| {
                AuthringError::Keyring(format!("value of {tag} exceeds 65535 bytes"))
            })?;
            out.extend_from_slice(tag.as_bytes());
            out.push(0);
            out.extend_from_slice(&len.to_be_bytes());
            out.extend_from_slice(value);
        }
        Ok(out)
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        let mut keyring = Self::new();
        while !buf.is_empty() {
            let nul = buf
                .iter()
                .position(|b| *b == 0)
                .ok_or_else(|| AuthringError::Keyring("unterminated tag".to_string()))?;
            let tag = std::str::from_utf8(&buf[..nul])
                .map_err(|_| AuthringError::Keyring("tag is not ASCII".to_string()))?
                .to_string();
            let rest = &buf[nul + 1..];
            if rest.len() < 2 {
                return Err(AuthringError::Keyring(format!("truncated length of {tag}")));
            }
            let len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
            let rest = &rest[2..];
            if rest.len() < len {
                return Err(AuthringError::Keyring(format!("truncated value of {tag}")));
            }
            keyring.insert(&tag, Zeroizing::new(rest[..len].to_vec()));
            buf = &rest[len..];
        }
        Ok(keyring)
    }
}

impl fmt::Debug for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyring")
            .field("tags", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The user's own key material.
pub struct OwnKeys {
    signer: KeySigner,
    encryption: EncryptionKeyPair,
    rsa: Option<RsaPublicKey>,
}

impl OwnKeys {
    pub fn generate(clock: Arc<dyn Clock>) -> Self {
        Self {
            signer: KeySigner::with_clock(IdentityKeyPair::generate(), clock),
            encryption: EncryptionKeyPair::generate(),
            rsa: None,
        }
    }

    pub fn from_keyring(keyring: &Keyring, clock: Arc<dyn Clock>) -> Result<Self> {
        let ed_tag = tag_of(KeyType::Ed25519)?;
        let cu_tag = tag_of(KeyType::Cu25519)?;

        let identity = keyring
            .get(ed_tag)
            .ok_or_else(|| AuthringError::Keyring(format!("missing {ed_tag}")))
            .and_then(|bytes| Ok(IdentityKeyPair::from_private_bytes(bytes)?))?;
        let encryption = keyring
            .get(cu_tag)
            .ok_or_else(|| AuthringError::Keyring(format!("missing {cu_tag}")))
            .and_then(|bytes| Ok(EncryptionKeyPair::from_private_bytes(bytes)?))?;

        Ok(Self {
            signer: KeySigner::with_clock(identity, clock),
            encryption,
            rsa: None,
        })
    }

    pub fn to_keyring(&self) -> Result<Keyring> {
        let mut keyring = Keyring::new();
        keyring.insert(tag_of(KeyType::Ed25519)?, self.signer.identity().private_bytes());
        keyring.insert(tag_of(KeyType::Cu25519)?, self.encryption.private_bytes());
        Ok(keyring)
    }

    pub fn with_rsa(mut self, rsa: Option<RsaPublicKey>) -> Self {
        self.rsa = rsa;
        self
    }

    pub fn signer(&self) -> &KeySigner {
        &self.signer
    }

    pub fn encryption(&self) -> &EncryptionKeyPair {
        &self.encryption
    }

    pub fn has_rsa(&self) -> bool {
        self.rsa.is_some()
    }

    /// Our own public key of `key_type`; `None` for RSA when no legacy key
    /// is present.
    pub fn public_key(&self, key_type: KeyType) -> Option<PublicKey> {
        match key_type {
            KeyType::Ed25519 => Some(self.signer.identity().public_key()),
            KeyType::Cu25519 => Some(self.encryption.public_key()),
            KeyType::Rsa => self.rsa.clone().map(PublicKey::Rsa),
        }
    }
}

impl fmt::Debug for OwnKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnKeys")
            .field("identity", self.signer.identity())
            .field("encryption", &self.encryption)
            .field("rsa", &self.rsa)
            .finish()
    }
}

fn tag_of(key_type: KeyType) -> Result<&'static str> {
    key_type
        .info()
        .keyring_tag
        .ok_or_else(|| AuthringError::Keyring(format!("{key_type} keys are not kept in the keyring")))
}
