//! Public key material and the user's own key pairs.

use std::fmt;

use authring_core::KeyType;
use ed25519_dalek::{Signature, Signer, SigningKey};
use rand::RngCore;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};

/// Length of Ed25519 and Cu25519 public and private keys.
pub const CURVE25519_KEY_LEN: usize = 32;

/// Legacy RSA public key, kept as its two big-endian components.
#[derive(Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    pub modulus: Vec<u8>,
    pub exponent: Vec<u8>,
}

impl RsaPublicKey {
    pub fn new(modulus: Vec<u8>, exponent: Vec<u8>) -> Self {
        Self { modulus, exponent }
    }

    /// Modulus followed by exponent; this is what gets hashed and signed.
    pub fn concatenated(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.modulus.len() + self.exponent.len());
        out.extend_from_slice(&self.modulus);
        out.extend_from_slice(&self.exponent);
        out
    }

    /// Encodes both components as MPIs (16-bit big-endian bit count, then
    /// the value bytes).
    pub fn to_mpi(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.modulus.len() + self.exponent.len() + 4);
        write_mpi(&mut out, &self.modulus)?;
        write_mpi(&mut out, &self.exponent)?;
        Ok(out)
    }

    pub fn from_mpi(bytes: &[u8]) -> Result<Self> {
        let (modulus, rest) = read_mpi(bytes)?;
        let (exponent, rest) = read_mpi(rest)?;
        if !rest.is_empty() {
            return Err(CryptoError::MalformedKey(format!(
                "{} trailing bytes after RSA public key",
                rest.len()
            )));
        }
        Ok(Self { modulus, exponent })
    }
}

impl fmt::Debug for RsaPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPublicKey")
            .field("modulus_bits", &bit_length(&self.modulus))
            .field("exponent", &hex::encode(&self.exponent))
            .finish()
    }
}

fn bit_length(value: &[u8]) -> usize {
    match value.iter().position(|b| *b != 0) {
        Some(i) => (value.len() - i) * 8 - value[i].leading_zeros() as usize,
        None => 0,
    }
}

fn write_mpi(out: &mut Vec<u8>, value: &[u8]) -> Result<()> {
    let start = value.iter().position(|b| *b != 0).unwrap_or(value.len());
    let trimmed = &value[start..];
    let bits = u16::try_from(bit_length(trimmed))
        .map_err(|_| CryptoError::MalformedKey("MPI exceeds 65535 bits".to_string()))?;
    out.extend_from_slice(&bits.to_be_bytes());
    out.extend_from_slice(trimmed);
    Ok(())
}

fn read_mpi(bytes: &[u8]) -> Result<(Vec<u8>, &[u8])> {
    if bytes.len() < 2 {
        return Err(CryptoError::MalformedKey("truncated MPI header".to_string()));
    }
    let bits = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    let len = bits.div_ceil(8);
    let rest = &bytes[2..];
    if rest.len() < len {
        return Err(CryptoError::MalformedKey("truncated MPI value".to_string()));
    }
    Ok((rest[..len].to_vec(), &rest[len..]))
}

/// A contact's (or our own) public key for one of the three key types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    /// Ed25519 or Cu25519 key bytes; length is checked at use
    Curve25519(Vec<u8>),
    Rsa(RsaPublicKey),
}

impl PublicKey {
    /// The bytes that are hashed for fingerprints and embedded in signed
    /// key strings.
    pub fn key_material(&self, key_type: KeyType) -> Result<Vec<u8>> {
        match (key_type, self) {
            (KeyType::Ed25519 | KeyType::Cu25519, PublicKey::Curve25519(bytes)) => {
                if bytes.len() != CURVE25519_KEY_LEN {
                    return Err(CryptoError::UnexpectedKeyLength {
                        key_type,
                        len: bytes.len(),
                    });
                }
                Ok(bytes.clone())
            }
            (KeyType::Rsa, PublicKey::Rsa(rsa)) => Ok(rsa.concatenated()),
            (key_type, _) => Err(CryptoError::UnsupportedKeyType(key_type)),
        }
    }

    /// Storage encoding: raw bytes for curve keys, MPIs for RSA.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            PublicKey::Curve25519(bytes) => Ok(bytes.clone()),
            PublicKey::Rsa(rsa) => rsa.to_mpi(),
        }
    }

    pub fn decode(key_type: KeyType, bytes: &[u8]) -> Result<Self> {
        match key_type {
            KeyType::Ed25519 | KeyType::Cu25519 => {
                if bytes.len() != CURVE25519_KEY_LEN {
                    return Err(CryptoError::UnexpectedKeyLength {
                        key_type,
                        len: bytes.len(),
                    });
                }
                Ok(PublicKey::Curve25519(bytes.to_vec()))
            }
            KeyType::Rsa => RsaPublicKey::from_mpi(bytes).map(PublicKey::Rsa),
        }
    }
}

impl From<[u8; CURVE25519_KEY_LEN]> for PublicKey {
    fn from(bytes: [u8; CURVE25519_KEY_LEN]) -> Self {
        PublicKey::Curve25519(bytes.to_vec())
    }
}

fn private_key_array(bytes: &[u8], key_type: KeyType) -> Result<Zeroizing<[u8; CURVE25519_KEY_LEN]>> {
    if bytes.len() != CURVE25519_KEY_LEN {
        return Err(CryptoError::UnexpectedKeyLength {
            key_type,
            len: bytes.len(),
        });
    }
    let mut key = Zeroizing::new([0u8; CURVE25519_KEY_LEN]);
    key.copy_from_slice(bytes);
    Ok(key)
}

fn random_secret() -> Zeroizing<[u8; CURVE25519_KEY_LEN]> {
    let mut secret = Zeroizing::new([0u8; CURVE25519_KEY_LEN]);
    rand::thread_rng().fill_bytes(&mut secret[..]);
    secret
}

/// The user's own Ed25519 identity key pair.
pub struct IdentityKeyPair {
    signing_key: SigningKey,
}

impl IdentityKeyPair {
    pub fn generate() -> Self {
        let secret = random_secret();
        Self {
            signing_key: SigningKey::from_bytes(&secret),
        }
    }

    /// Rebuilds the key pair from a 32 byte private seed.
    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self> {
        let seed = private_key_array(bytes, KeyType::Ed25519)?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    pub fn private_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.signing_key.to_bytes().to_vec())
    }

    pub fn public_key_bytes(&self) -> [u8; CURVE25519_KEY_LEN] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(self.public_key_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

/// The user's own Cu25519 (X25519) encryption key pair.
pub struct EncryptionKeyPair {
    secret: StaticSecret,
    public: X25519PublicKey,
}

impl EncryptionKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::from(*random_secret());
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Rebuilds the key pair from the private scalar; the public key is
    /// always derived, never trusted from storage.
    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self> {
        let raw = private_key_array(bytes, KeyType::Cu25519)?;
        let secret = StaticSecret::from(*raw);
        let public = X25519PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    pub fn private_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.secret.to_bytes().to_vec())
    }

    pub fn public_key_bytes(&self) -> [u8; CURVE25519_KEY_LEN] {
        self.public.to_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(self.public_key_bytes())
    }
}

impl fmt::Debug for EncryptionKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKeyPair")
            .field("public", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}
