// RewardStore - sled tree of beneficiary and activation data
//
// Values are postcard-encoded, keyed by prefix:
// - Beneficiary records (public id on file, achievements)
// - Per-account activation state

use crate::error::{Categorized, ErrorCategory};
use crate::identity::AccountId;
use crate::storage::{Achievement, ActivationState, BeneficiaryRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Key prefixes
mod keys {
    pub const BENEFICIARY_PREFIX: &[u8] = b"beneficiary:";
    pub const ACTIVATION_PREFIX: &[u8] = b"activation:";
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cannot open reward store: {0}")]
    OpenFailed(String),

    #[error("Store operation failed: {0}")]
    DatabaseError(String),

    #[error("Cannot encode record: {0}")]
    SerializationFailed(String),

    #[error("Cannot decode record: {0}")]
    DeserializationFailed(String),

    #[error("Cannot flush reward store: {0}")]
    FlushFailed(String),

    #[error("Unknown beneficiary: {0}")]
    UnknownBeneficiary(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

impl Categorized for StoreError {
    fn category(&self) -> ErrorCategory {
        match self {
            StoreError::UnknownBeneficiary(_) => ErrorCategory::NotFound,
            _ => ErrorCategory::Storage,
        }
    }
}

/// Size of the store
#[derive(Clone, Debug)]
pub struct StorageStats {
    pub key_count: usize,
    /// As reported by sled, approximate
    pub disk_size_bytes: u64,
}

/// Outcome of reconciling the public id on file with a derived one
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublicIdUpdate {
    Unchanged,
    Replaced { previous: Option<AccountId> },
}

/// Beneficiary records and activation state, shared behind an `Arc`
///
/// Single-key writes are atomic; call [`flush`](Self::flush) before exit.
pub struct RewardStore {
    db: sled::Db,
}

fn beneficiary_key(id: &str) -> Vec<u8> {
    [keys::BENEFICIARY_PREFIX, id.as_bytes()].concat()
}

fn activation_key(account: &AccountId) -> Vec<u8> {
    [keys::ACTIVATION_PREFIX, account.as_bytes().as_slice()].concat()
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    postcard::to_allocvec(value).map_err(|e| StoreError::SerializationFailed(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
}

impl RewardStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    /// Open a store that is deleted when dropped
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.db.is_empty())
    }

    /// Block until every write so far is on disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StorageStats, StoreError> {
        Ok(StorageStats {
            key_count: self.db.len(),
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
        })
    }

    // ========================================================================
    // BENEFICIARIES
    // ========================================================================

    /// Insert or replace a beneficiary record
    pub fn put_beneficiary(&self, record: &BeneficiaryRecord) -> Result<(), StoreError> {
        self.db.insert(beneficiary_key(&record.id), encode(record)?)?;
        Ok(())
    }

    pub fn get_beneficiary(&self, id: &str) -> Result<Option<BeneficiaryRecord>, StoreError> {
        match self.db.get(beneficiary_key(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All beneficiaries, ordered by id
    pub fn list_beneficiaries(&self) -> Result<Vec<BeneficiaryRecord>, StoreError> {
        let mut records = Vec::new();
        for result in self.db.scan_prefix(keys::BENEFICIARY_PREFIX) {
            let (_, bytes) = result?;
            records.push(decode(&bytes)?);
        }
        Ok(records)
    }

    /// Beneficiary whose public id on file is `account`
    pub fn find_by_account(
        &self,
        account: &AccountId,
    ) -> Result<Option<BeneficiaryRecord>, StoreError> {
        Ok(self
            .list_beneficiaries()?
            .into_iter()
            .find(|r| r.public_id.as_ref() == Some(account)))
    }

    /// Make `derived` the public id on file, creating the record if needed
    pub fn reconcile_public_id(
        &self,
        beneficiary: &str,
        derived: AccountId,
    ) -> Result<PublicIdUpdate, StoreError> {
        let mut record = self
            .get_beneficiary(beneficiary)?
            .unwrap_or_else(|| BeneficiaryRecord::new(beneficiary, beneficiary));

        if record.public_id == Some(derived) {
            return Ok(PublicIdUpdate::Unchanged);
        }

        let previous = record.public_id.replace(derived);
        self.put_beneficiary(&record)?;
        info!(
            beneficiary,
            previous = ?previous,
            current = %derived,
            "public id on file updated from credential"
        );
        Ok(PublicIdUpdate::Replaced { previous })
    }

    /// Append an achievement atomically with respect to other writers
    pub fn append_achievement(
        &self,
        beneficiary: &str,
        achievement: Achievement,
    ) -> Result<(), StoreError> {
        let key = beneficiary_key(beneficiary);
        let mut failure: Option<StoreError> = None;

        let updated = self.db.update_and_fetch(&key, |old| {
            failure = None;
            let old = old?;
            let appended = decode::<BeneficiaryRecord>(old).and_then(|mut record| {
                record.achievements.push(achievement.clone());
                encode(&record)
            });
            match appended {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    failure = Some(e);
                    Some(old.to_vec())
                }
            }
        })?;

        if let Some(e) = failure {
            return Err(e);
        }
        if updated.is_none() {
            return Err(StoreError::UnknownBeneficiary(beneficiary.to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // ACTIVATION STATE
    // ========================================================================

    /// Activation state of an account (`Pending` when never recorded)
    pub fn activation_state(&self, account: &AccountId) -> Result<ActivationState, StoreError> {
        match self.db.get(activation_key(account))? {
            Some(bytes) => decode(&bytes),
            None => Ok(ActivationState::Pending),
        }
    }

    /// Record `Active`. There is no way to record `Pending` again.
    pub fn mark_active(&self, account: &AccountId) -> Result<(), StoreError> {
        self.db
            .insert(activation_key(account), encode(&ActivationState::Active)?)?;
        Ok(())
    }
}
