// Ed25519 key material behind account ids and signing credentials

use crate::error::{Categorized, ErrorCategory};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

/// Length of a public key and of a signing seed
pub const KEY_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Wrong length: expected {expected} bytes, got {got}")]
    WrongLength { expected: usize, got: usize },

    #[error("Not a valid ed25519 public key: {0}")]
    InvalidPoint(String),
}

impl Categorized for KeyError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::InvalidCredentialFormat
    }
}

pub(crate) fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], KeyError> {
    bytes.try_into().map_err(|_| KeyError::WrongLength {
        expected: N,
        got: bytes.len(),
    })
}

/// Verifying half of an account key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        VerifyingKey::from_bytes(&fixed::<KEY_LEN>(bytes)?)
            .map(Self)
            .map_err(|e| KeyError::InvalidPoint(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        self.0.as_bytes()
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }
}

/// Signing key derived from a 32-byte seed
#[derive(Clone)]
pub struct Keypair(SigningKey);

impl Keypair {
    pub fn generate() -> Self {
        Self(SigningKey::generate(&mut OsRng))
    }

    /// Any 32 bytes are a valid seed
    pub fn from_seed(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(Self(SigningKey::from_bytes(&fixed::<KEY_LEN>(bytes)?)))
    }

    pub fn seed_bytes(&self) -> [u8; KEY_LEN] {
        self.0.to_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.0
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Keypair({})", hex::encode(self.public_key().as_bytes()))
    }
}
