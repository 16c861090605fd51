// Detached ed25519 signatures over transaction hashes

use crate::identity::{fixed, KeyError, Keypair, PublicKey};
use ed25519_dalek::{Signer as _, Verifier as _};
use serde::{Deserialize, Serialize};

pub const SIGNATURE_LEN: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        Ok(Self(ed25519_dalek::Signature::from_bytes(
            &fixed::<SIGNATURE_LEN>(bytes)?,
        )))
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0.to_bytes()
    }
}

pub struct Signer;

impl Signer {
    pub fn sign(keypair: &Keypair, message: &[u8]) -> Signature {
        Signature(keypair.signing_key().sign(message))
    }

    /// Strict verification; malformed signatures simply fail
    pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
        public_key
            .verifying_key()
            .verify(message, &signature.0)
            .is_ok()
    }
}
