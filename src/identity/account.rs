use crate::error::{Categorized, ErrorCategory};
use crate::identity::{AccountId, SecretSeed, StrKeyError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Invalid credential format: {0}")]
    InvalidCredentialFormat(#[from] StrKeyError),

    #[error("Credential mismatch: credential controls {derived}, not {claimed}")]
    CredentialMismatch {
        claimed: AccountId,
        derived: AccountId,
    },
}

impl Categorized for AccountError {
    fn category(&self) -> ErrorCategory {
        match self {
            AccountError::InvalidCredentialFormat(_) => ErrorCategory::InvalidCredentialFormat,
            AccountError::CredentialMismatch { .. } => ErrorCategory::CredentialMismatch,
        }
    }
}

/// A ledger participant: its public id and, for parties that sign locally,
/// the credential that derives it.
#[derive(Clone, Debug)]
pub struct AccountReference {
    public_id: AccountId,
    credential: Option<SecretSeed>,
}

impl AccountReference {
    /// Reference with a public id only
    pub fn public(public_id: AccountId) -> Self {
        Self {
            public_id,
            credential: None,
        }
    }

    /// Reference whose id is derived from the credential
    pub fn from_credential(credential: SecretSeed) -> Self {
        Self {
            public_id: credential.account_id(),
            credential: Some(credential),
        }
    }

    /// Parse an `S…` credential and derive the reference
    pub fn parse_credential(credential: &str) -> Result<Self, AccountError> {
        Ok(Self::from_credential(SecretSeed::parse(credential)?))
    }

    /// Pair a claimed id with a credential; a credential that derives a
    /// different id is rejected.
    pub fn new(public_id: AccountId, credential: Option<SecretSeed>) -> Result<Self, AccountError> {
        if let Some(seed) = &credential {
            let derived = seed.account_id();
            if derived != public_id {
                return Err(AccountError::CredentialMismatch {
                    claimed: public_id,
                    derived,
                });
            }
        }
        Ok(Self {
            public_id,
            credential,
        })
    }

    pub fn public_id(&self) -> &AccountId {
        &self.public_id
    }

    pub fn credential(&self) -> Option<&SecretSeed> {
        self.credential.as_ref()
    }

    /// Whether this party can sign locally
    pub fn can_sign(&self) -> bool {
        self.credential.is_some()
    }
}
