// Payment queue - issuer-signed rewards awaiting a validator's decision
//
// PENDING_VALIDATION -> SUBMITTED | REJECTED
//
// A decision removes the entry under the lock before anything else happens,
// so of two racing decisions on one id exactly one proceeds and the other
// sees NotFound. The lock is never held across the gateway call. A failed
// submission ends REJECTED and is not requeued; retrying means building a
// new payment.

use crate::error::{Categorized, ErrorCategory};
use crate::identity::AccountId;
use crate::issuance::SigningBackend;
use crate::ledger::{Amount, EnvelopeCodec, GatewayError, Operation, SignedPayload, SubmitReceipt};
use crate::queue::{IdGenerator, PaymentId};
use crate::storage::{Achievement, RewardStore};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// TYPES
// ============================================================================

/// Lifecycle of a payment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentStatus {
    PendingValidation,
    Submitted,
    Rejected,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::PendingValidation => f.write_str("PENDING_VALIDATION"),
            PaymentStatus::Submitted => f.write_str("SUBMITTED"),
            PaymentStatus::Rejected => f.write_str("REJECTED"),
        }
    }
}

/// A validator's decision
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approve => f.write_str("APPROVE"),
            Decision::Reject => f.write_str("REJECT"),
        }
    }
}

/// What the issuer says the payload pays, recorded alongside it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentMetadata {
    /// Beneficiary record the achievement is appended to
    pub beneficiary: String,
    pub destination: AccountId,
    pub amount: Amount,
    /// Human-readable task label
    pub task: String,
}

impl PaymentMetadata {
    pub fn new(beneficiary: &str, destination: AccountId, amount: Amount, task: &str) -> Self {
        Self {
            beneficiary: beneficiary.to_string(),
            destination,
            amount,
            task: task.to_string(),
        }
    }
}

/// An issuer-authorized payment that has not been decided yet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingPayment {
    pub id: PaymentId,
    pub issuer: AccountId,
    pub metadata: PaymentMetadata,
    pub payload: SignedPayload,
    pub created_at: DateTime<Utc>,
}

impl PendingPayment {
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::PendingValidation
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecisionOutcome {
    Submitted {
        id: PaymentId,
        receipt: SubmitReceipt,
        /// The beneficiary's achievement was stored
        achievement_recorded: bool,
    },
    Rejected {
        id: PaymentId,
    },
}

impl DecisionOutcome {
    pub fn status(&self) -> PaymentStatus {
        match self {
            DecisionOutcome::Submitted { .. } => PaymentStatus::Submitted,
            DecisionOutcome::Rejected { .. } => PaymentStatus::Rejected,
        }
    }
}

/// Record of a decision, kept after the entry leaves the pending set
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: PaymentId,
    pub decision: Decision,
    pub status: PaymentStatus,
    pub destination: AccountId,
    pub amount: Amount,
    pub tx_hash: Option<String>,
    /// Gateway diagnostic for failed submissions
    pub error: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// Events emitted by the payment queue
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentEvent {
    Enqueued {
        id: PaymentId,
        destination: AccountId,
        amount: Amount,
    },
    Submitted {
        id: PaymentId,
        hash: String,
    },
    SubmissionFailed {
        id: PaymentId,
        error: String,
    },
    Rejected {
        id: PaymentId,
    },
}

/// Statistics about queue operations
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub submitted: u64,
    pub rejected: u64,
    pub failed: u64,
    pub not_found: u64,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum EnqueueError {
    #[error("Payment amount must be greater than zero, got {0}")]
    InvalidAmount(Amount),

    #[error("Signed payload is empty")]
    EmptyPayload,

    #[error("Signed payload does not match its metadata: {0}")]
    PayloadMismatch(String),
}

impl Categorized for EnqueueError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::InvalidInput
    }
}

#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("No pending payment with id {0}")]
    NotFound(PaymentId),

    #[error("Submission of {id} failed: {source}")]
    SubmissionFailed {
        id: PaymentId,
        #[source]
        source: GatewayError,
    },
}

impl DecisionError {
    /// Gateway diagnostic of a failed submission, verbatim
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            DecisionError::SubmissionFailed { source, .. } => Some(source),
            DecisionError::NotFound(_) => None,
        }
    }
}

impl Categorized for DecisionError {
    fn category(&self) -> ErrorCategory {
        match self {
            DecisionError::NotFound(_) => ErrorCategory::NotFound,
            DecisionError::SubmissionFailed { source, .. } => source.category(),
        }
    }
}

// ============================================================================
// PAYMENT QUEUE
// ============================================================================

#[derive(Default)]
struct QueueState {
    pending: BTreeMap<PaymentId, PendingPayment>,
    audit: Vec<AuditEntry>,
    events: Vec<PaymentEvent>,
    refresh: BTreeSet<AccountId>,
    stats: QueueStats,
}

/// Sole owner of pending payments between build and decision
pub struct PaymentQueue {
    backend: Arc<dyn SigningBackend>,
    store: Arc<RewardStore>,
    ids: IdGenerator,
    state: Mutex<QueueState>,
}

impl PaymentQueue {
    pub fn new(backend: Arc<dyn SigningBackend>, store: Arc<RewardStore>) -> Self {
        Self {
            backend,
            store,
            ids: IdGenerator::new(),
            state: Mutex::new(QueueState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Hold a signed payload for validation; the payload is stored unmodified.
    /// A decodable payload must pay the metadata's destination and amount
    /// from the issuer.
    pub fn enqueue(
        &self,
        payload: SignedPayload,
        metadata: PaymentMetadata,
    ) -> Result<PaymentId, EnqueueError> {
        if !metadata.amount.is_positive() {
            return Err(EnqueueError::InvalidAmount(metadata.amount));
        }
        if payload.as_str().is_empty() {
            return Err(EnqueueError::EmptyPayload);
        }
        self.check_payload(&payload, &metadata)?;

        let mut state = self.lock();
        let mut id = self.ids.next_payment_id();
        while state.pending.contains_key(&id) {
            id = self.ids.next_payment_id();
        }

        let entry = PendingPayment {
            id: id.clone(),
            issuer: *self.backend.issuer(),
            metadata,
            payload,
            created_at: Utc::now(),
        };
        state.events.push(PaymentEvent::Enqueued {
            id: id.clone(),
            destination: entry.metadata.destination,
            amount: entry.metadata.amount,
        });
        state.stats.enqueued += 1;
        info!(
            id = %id,
            destination = %entry.metadata.destination,
            amount = %entry.metadata.amount,
            task = %entry.metadata.task,
            "payment awaiting validation"
        );
        state.pending.insert(id.clone(), entry);

        Ok(id)
    }

    /// What a validator sees is the metadata; the payload must say the same.
    /// Opaque payloads from a remote backend are taken as given.
    fn check_payload(
        &self,
        payload: &SignedPayload,
        metadata: &PaymentMetadata,
    ) -> Result<(), EnqueueError> {
        let envelope = match EnvelopeCodec::decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "payload not decodable, metadata unchecked");
                return Ok(());
            }
        };

        let tx = envelope.tx();
        if tx.source() != self.backend.issuer() {
            return Err(EnqueueError::PayloadMismatch(format!(
                "source {} is not the issuer {}",
                tx.source(),
                self.backend.issuer()
            )));
        }

        let (destination, amount) = match tx.operations() {
            [Operation::Payment {
                destination,
                amount,
                ..
            }] => (destination, amount),
            _ => {
                return Err(EnqueueError::PayloadMismatch(
                    "expected exactly one payment operation".to_string(),
                ))
            }
        };
        if *destination != metadata.destination {
            return Err(EnqueueError::PayloadMismatch(format!(
                "pays {} but metadata names {}",
                destination, metadata.destination
            )));
        }
        if *amount != metadata.amount {
            return Err(EnqueueError::PayloadMismatch(format!(
                "pays {} but metadata says {}",
                amount, metadata.amount
            )));
        }
        Ok(())
    }

    /// Decide a pending payment. The entry leaves the pending set first,
    /// whatever the outcome.
    pub async fn decide(
        &self,
        id: &PaymentId,
        decision: Decision,
    ) -> Result<DecisionOutcome, DecisionError> {
        let removed = {
            let mut state = self.lock();
            let removed = state.pending.remove(id);
            if removed.is_none() {
                state.stats.not_found += 1;
            }
            removed
        };
        let entry = match removed {
            Some(entry) => entry,
            None => {
                debug!(id = %id, %decision, "decision on unknown or already decided payment");
                return Err(DecisionError::NotFound(id.clone()));
            }
        };

        match decision {
            Decision::Reject => {
                let mut state = self.lock();
                let audit = audit_entry(&entry, decision, PaymentStatus::Rejected, None, None);
                state.audit.push(audit);
                state.events.push(PaymentEvent::Rejected { id: id.clone() });
                state.stats.rejected += 1;
                info!(id = %id, "payment rejected by validator");
                Ok(DecisionOutcome::Rejected { id: id.clone() })
            }
            Decision::Approve => self.submit(entry).await,
        }
    }

    async fn submit(&self, entry: PendingPayment) -> Result<DecisionOutcome, DecisionError> {
        let id = entry.id.clone();

        let receipt = match self.backend.submit(&entry.payload).await {
            Ok(receipt) => receipt,
            Err(source) => {
                let mut state = self.lock();
                state.audit.push(audit_entry(
                    &entry,
                    Decision::Approve,
                    PaymentStatus::Rejected,
                    None,
                    Some(source.to_string()),
                ));
                state.events.push(PaymentEvent::SubmissionFailed {
                    id: id.clone(),
                    error: source.to_string(),
                });
                state.stats.failed += 1;
                warn!(id = %id, error = %source, "approved payment failed to submit, discarded");
                return Err(DecisionError::SubmissionFailed { id, source });
            }
        };

        let achievement = Achievement::payment(
            &entry.metadata.task,
            id.as_str(),
            &receipt.hash,
            entry.metadata.amount,
        );
        let achievement_recorded = match self
            .store
            .append_achievement(&entry.metadata.beneficiary, achievement)
        {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    id = %id,
                    beneficiary = %entry.metadata.beneficiary,
                    error = %e,
                    "payment submitted but achievement not recorded"
                );
                false
            }
        };

        let mut state = self.lock();
        state.refresh.insert(entry.metadata.destination);
        state.audit.push(audit_entry(
            &entry,
            Decision::Approve,
            PaymentStatus::Submitted,
            Some(receipt.hash.clone()),
            None,
        ));
        state.events.push(PaymentEvent::Submitted {
            id: id.clone(),
            hash: receipt.hash.clone(),
        });
        state.stats.submitted += 1;
        info!(id = %id, hash = %receipt.hash, ledger = receipt.ledger, "payment submitted");

        Ok(DecisionOutcome::Submitted {
            id,
            receipt,
            achievement_recorded,
        })
    }

    /// Pending payments, oldest first
    pub fn pending(&self) -> Vec<PendingPayment> {
        self.lock().pending.values().cloned().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn get(&self, id: &PaymentId) -> Option<PendingPayment> {
        self.lock().pending.get(id).cloned()
    }

    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.lock().audit.clone()
    }

    /// Accounts whose balances changed since the last call
    pub fn take_refresh_requests(&self) -> Vec<AccountId> {
        std::mem::take(&mut self.lock().refresh).into_iter().collect()
    }

    /// Poll for events (clears the event queue)
    pub fn poll_events(&self) -> Vec<PaymentEvent> {
        std::mem::take(&mut self.lock().events)
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().stats.clone()
    }
}

fn audit_entry(
    entry: &PendingPayment,
    decision: Decision,
    status: PaymentStatus,
    tx_hash: Option<String>,
    error: Option<String>,
) -> AuditEntry {
    AuditEntry {
        id: entry.id.clone(),
        decision,
        status,
        destination: entry.metadata.destination,
        amount: entry.metadata.amount,
        tx_hash,
        error,
        decided_at: Utc::now(),
    }
}
