// Merit grants - two-signature approval for collectible awards
//
// PENDING_MULTI_SIG -> GRANTED | REJECTED
//
// The issuer is the first signer; only configured validators may add the
// second. A grant is final only when the signer set holds REQUIRED_SIGNATURES
// distinct identities; a repeated identity never counts twice. Signing and
// finalization happen under one lock, so racing decisions are linearized.
// Minting the on-chain collectible belongs to an external MeritMinter called
// after GRANTED.

use crate::config::{Config, ConfigError, ENV_VALIDATOR_PUBLIC};
use crate::error::{Categorized, ErrorCategory};
use crate::identity::AccountId;
use crate::queue::{Decision, GrantId, IdGenerator};
use crate::storage::{Achievement, RewardStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Signatures needed before a grant is final: issuer + validator
pub const REQUIRED_SIGNATURES: usize = 2;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrantStatus {
    PendingMultiSig,
    Granted,
    Rejected,
}

impl fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantStatus::PendingMultiSig => f.write_str("PENDING_MULTI_SIG"),
            GrantStatus::Granted => f.write_str("GRANTED"),
            GrantStatus::Rejected => f.write_str("REJECTED"),
        }
    }
}

/// A grant still collecting signatures
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMeritGrant {
    pub id: GrantId,
    pub beneficiary: String,
    pub issuer: AccountId,
    pub achievement_type: String,
    pub description: String,
    signers: Vec<AccountId>,
    required_signatures: usize,
    pub created_at: DateTime<Utc>,
}

impl PendingMeritGrant {
    pub fn status(&self) -> GrantStatus {
        GrantStatus::PendingMultiSig
    }

    /// Signers so far, in signing order
    pub fn signers(&self) -> &[AccountId] {
        &self.signers
    }

    pub fn required_signatures(&self) -> usize {
        self.required_signatures
    }

    pub fn has_signed(&self, signer: &AccountId) -> bool {
        self.signers.contains(signer)
    }

    /// Consume a grant whose signer set is complete
    fn into_granted(self) -> Option<GrantedMerit> {
        if self.signers.len() < self.required_signatures {
            return None;
        }
        Some(GrantedMerit {
            id: self.id,
            beneficiary: self.beneficiary,
            achievement_type: self.achievement_type,
            description: self.description,
            signers: self.signers,
            granted_at: Utc::now(),
        })
    }
}

/// A final merit grant. Only constructed once every required signer has signed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantedMerit {
    id: GrantId,
    beneficiary: String,
    achievement_type: String,
    description: String,
    signers: Vec<AccountId>,
    granted_at: DateTime<Utc>,
}

impl GrantedMerit {
    pub fn id(&self) -> &GrantId {
        &self.id
    }

    pub fn beneficiary(&self) -> &str {
        &self.beneficiary
    }

    pub fn achievement_type(&self) -> &str {
        &self.achievement_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn signers(&self) -> &[AccountId] {
        &self.signers
    }

    pub fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }
}

/// Result of handing a granted merit to the minter
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MintStatus {
    NotConfigured,
    Minted(String),
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantOutcome {
    /// Signature recorded, more are needed
    Pending {
        id: GrantId,
        signatures: usize,
        required: usize,
    },
    Granted {
        merit: GrantedMerit,
        achievement_recorded: bool,
        mint: MintStatus,
    },
    Rejected {
        id: GrantId,
    },
}

impl GrantOutcome {
    pub fn status(&self) -> GrantStatus {
        match self {
            GrantOutcome::Pending { .. } => GrantStatus::PendingMultiSig,
            GrantOutcome::Granted { .. } => GrantStatus::Granted,
            GrantOutcome::Rejected { .. } => GrantStatus::Rejected,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantAuditEntry {
    pub id: GrantId,
    pub beneficiary: String,
    pub status: GrantStatus,
    pub signers: Vec<AccountId>,
    pub decided_by: AccountId,
    pub decided_at: DateTime<Utc>,
}

/// Events emitted by the merit grant queue
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantEvent {
    Initiated { id: GrantId, beneficiary: String },
    Signed { id: GrantId, signer: AccountId, signatures: usize },
    Granted { id: GrantId },
    Rejected { id: GrantId, by: AccountId },
}

// ============================================================================
// ERRORS AND COLLABORATORS
// ============================================================================

#[derive(Error, Debug)]
pub enum GrantError {
    #[error("No pending merit grant with id {0}")]
    NotFound(GrantId),

    #[error("{signer} has already signed merit grant {id}")]
    DuplicateSigner { id: GrantId, signer: AccountId },

    #[error("{signer} is not an authorized signer for merit grant {id}")]
    UnauthorizedSigner { id: GrantId, signer: AccountId },

    #[error("No beneficiary record for {0}")]
    UnknownBeneficiary(String),

    #[error("Invalid merit grant: {0}")]
    InvalidGrant(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Categorized for GrantError {
    fn category(&self) -> ErrorCategory {
        match self {
            GrantError::NotFound(_) | GrantError::UnknownBeneficiary(_) => ErrorCategory::NotFound,
            GrantError::DuplicateSigner { .. } | GrantError::InvalidGrant(_) => {
                ErrorCategory::InvalidInput
            }
            GrantError::UnauthorizedSigner { .. } => ErrorCategory::CredentialMismatch,
            GrantError::Store(e) => e.category(),
        }
    }
}

#[derive(Error, Debug)]
#[error("Minting failed: {0}")]
pub struct MintError(pub String);

/// External collaborator that mints the on-chain collectible for a final grant
#[async_trait]
pub trait MeritMinter: Send + Sync {
    /// Returns a reference to the minted token
    async fn mint(&self, merit: &GrantedMerit) -> Result<String, MintError>;
}

// ============================================================================
// MERIT GRANT QUEUE
// ============================================================================

#[derive(Default)]
struct GrantState {
    pending: BTreeMap<GrantId, PendingMeritGrant>,
    audit: Vec<GrantAuditEntry>,
    events: Vec<GrantEvent>,
}

/// Sole owner of pending merit grants
pub struct MeritGrantQueue {
    issuer: AccountId,
    validators: BTreeSet<AccountId>,
    store: Arc<RewardStore>,
    minter: Option<Arc<dyn MeritMinter>>,
    ids: IdGenerator,
    state: Mutex<GrantState>,
}

enum Applied {
    Pending { signatures: usize },
    Granted(GrantedMerit),
    Rejected,
}

impl MeritGrantQueue {
    /// Queue whose grants need `validator` as the second signer
    pub fn new(issuer: AccountId, validator: AccountId, store: Arc<RewardStore>) -> Self {
        Self {
            issuer,
            validators: BTreeSet::from([validator]),
            store,
            minter: None,
            ids: IdGenerator::new(),
            state: Mutex::new(GrantState::default()),
        }
    }

    /// Issuer and validator from configuration; the validator is required
    pub fn from_config(config: &Config, store: Arc<RewardStore>) -> Result<Self, ConfigError> {
        config.validate()?;
        let validator = config
            .validator_public
            .ok_or(ConfigError::Missing(ENV_VALIDATOR_PUBLIC))?;
        Ok(Self::new(config.issuer()?, validator, store))
    }

    /// Authorize another validator to supply the second signature
    pub fn with_validator(mut self, validator: AccountId) -> Self {
        self.validators.insert(validator);
        self
    }

    pub fn with_minter(mut self, minter: Arc<dyn MeritMinter>) -> Self {
        self.minter = Some(minter);
        self
    }

    pub fn issuer(&self) -> &AccountId {
        &self.issuer
    }

    pub fn is_validator(&self, account: &AccountId) -> bool {
        self.validators.contains(account)
    }

    fn lock(&self) -> MutexGuard<'_, GrantState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open a grant with the issuer as first signer. The beneficiary must
    /// have a stored record for the achievement to land on.
    pub fn initiate(
        &self,
        beneficiary: &str,
        achievement_type: &str,
        description: &str,
    ) -> Result<GrantId, GrantError> {
        if beneficiary.trim().is_empty() {
            return Err(GrantError::InvalidGrant("beneficiary is required".to_string()));
        }
        if achievement_type.trim().is_empty() {
            return Err(GrantError::InvalidGrant(
                "achievement type is required".to_string(),
            ));
        }
        if self.store.get_beneficiary(beneficiary)?.is_none() {
            debug!(beneficiary, "merit grant for unknown beneficiary");
            return Err(GrantError::UnknownBeneficiary(beneficiary.to_string()));
        }

        let mut state = self.lock();
        let mut id = self.ids.next_grant_id();
        while state.pending.contains_key(&id) {
            id = self.ids.next_grant_id();
        }

        state.pending.insert(
            id.clone(),
            PendingMeritGrant {
                id: id.clone(),
                beneficiary: beneficiary.to_string(),
                issuer: self.issuer,
                achievement_type: achievement_type.to_string(),
                description: description.to_string(),
                signers: vec![self.issuer],
                required_signatures: REQUIRED_SIGNATURES,
                created_at: Utc::now(),
            },
        );
        state.events.push(GrantEvent::Initiated {
            id: id.clone(),
            beneficiary: beneficiary.to_string(),
        });
        info!(id = %id, beneficiary, achievement_type, "merit grant awaiting signatures");

        Ok(id)
    }

    /// Sign (approve) or reject a pending grant as `signer`
    pub async fn decide(
        &self,
        id: &GrantId,
        decision: Decision,
        signer: &AccountId,
    ) -> Result<GrantOutcome, GrantError> {
        let applied = self.apply(id, decision, signer)?;

        match applied {
            Applied::Pending { signatures } => Ok(GrantOutcome::Pending {
                id: id.clone(),
                signatures,
                required: REQUIRED_SIGNATURES,
            }),
            Applied::Rejected => Ok(GrantOutcome::Rejected { id: id.clone() }),
            Applied::Granted(merit) => {
                let achievement = Achievement::merit(
                    merit.achievement_type(),
                    merit.description(),
                    merit.id().as_str(),
                );
                let achievement_recorded =
                    match self.store.append_achievement(merit.beneficiary(), achievement) {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(id = %id, error = %e, "merit granted but achievement not recorded");
                            false
                        }
                    };

                let mint = match &self.minter {
                    None => MintStatus::NotConfigured,
                    Some(minter) => match minter.mint(&merit).await {
                        Ok(token) => MintStatus::Minted(token),
                        Err(e) => {
                            warn!(id = %id, error = %e, "merit granted but minting failed");
                            MintStatus::Failed(e.to_string())
                        }
                    },
                };

                Ok(GrantOutcome::Granted {
                    merit,
                    achievement_recorded,
                    mint,
                })
            }
        }
    }

    /// State transition under the lock; no I/O
    fn apply(
        &self,
        id: &GrantId,
        decision: Decision,
        signer: &AccountId,
    ) -> Result<Applied, GrantError> {
        let mut state = self.lock();

        let grant = match state.pending.get_mut(id) {
            Some(grant) => grant,
            None => {
                debug!(id = %id, %decision, "decision on unknown or finalized merit grant");
                return Err(GrantError::NotFound(id.clone()));
            }
        };

        let authorized = match decision {
            Decision::Reject => *signer == self.issuer || self.validators.contains(signer),
            Decision::Approve => grant.has_signed(signer) || self.validators.contains(signer),
        };
        if !authorized {
            warn!(id = %id, signer = %signer, %decision, "merit decision from unauthorized signer");
            return Err(GrantError::UnauthorizedSigner {
                id: id.clone(),
                signer: *signer,
            });
        }

        match decision {
            Decision::Reject => {
                let grant = state
                    .pending
                    .remove(id)
                    .ok_or_else(|| GrantError::NotFound(id.clone()))?;
                state.audit.push(GrantAuditEntry {
                    id: id.clone(),
                    beneficiary: grant.beneficiary,
                    status: GrantStatus::Rejected,
                    signers: grant.signers,
                    decided_by: *signer,
                    decided_at: Utc::now(),
                });
                state.events.push(GrantEvent::Rejected {
                    id: id.clone(),
                    by: *signer,
                });
                info!(id = %id, by = %signer, "merit grant rejected");
                Ok(Applied::Rejected)
            }
            Decision::Approve => {
                if grant.has_signed(signer) {
                    debug!(id = %id, signer = %signer, "duplicate merit signature ignored");
                    return Err(GrantError::DuplicateSigner {
                        id: id.clone(),
                        signer: *signer,
                    });
                }
                grant.signers.push(*signer);
                let signatures = grant.signers.len();
                let complete = signatures >= grant.required_signatures;

                state.events.push(GrantEvent::Signed {
                    id: id.clone(),
                    signer: *signer,
                    signatures,
                });

                if !complete {
                    return Ok(Applied::Pending { signatures });
                }

                let merit = state
                    .pending
                    .remove(id)
                    .and_then(PendingMeritGrant::into_granted)
                    .ok_or_else(|| GrantError::NotFound(id.clone()))?;
                state.audit.push(GrantAuditEntry {
                    id: id.clone(),
                    beneficiary: merit.beneficiary.clone(),
                    status: GrantStatus::Granted,
                    signers: merit.signers.clone(),
                    decided_by: *signer,
                    decided_at: merit.granted_at,
                });
                state.events.push(GrantEvent::Granted { id: id.clone() });
                info!(id = %id, beneficiary = %merit.beneficiary, "merit granted");
                Ok(Applied::Granted(merit))
            }
        }
    }

    /// Grants still collecting signatures, oldest first
    pub fn pending(&self) -> Vec<PendingMeritGrant> {
        self.lock().pending.values().cloned().collect()
    }

    pub fn get(&self, id: &GrantId) -> Option<PendingMeritGrant> {
        self.lock().pending.get(id).cloned()
    }

    pub fn audit_log(&self) -> Vec<GrantAuditEntry> {
        self.lock().audit.clone()
    }

    /// Poll for events (clears the event queue)
    pub fn poll_events(&self) -> Vec<GrantEvent> {
        std::mem::take(&mut self.lock().events)
    }
}
