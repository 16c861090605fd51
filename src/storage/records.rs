// Persisted records - beneficiaries, their achievements, activation state

use crate::identity::AccountId;
use crate::ledger::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Activation state of a ledger account. Only moves `Pending -> Active`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationState {
    #[default]
    Pending,
    Active,
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationState::Pending => f.write_str("PENDING"),
            ActivationState::Active => f.write_str("ACTIVE"),
        }
    }
}

/// A reward or merit recorded against a beneficiary once it is final
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub name: String,
    pub description: Option<String>,
    pub recorded_at: DateTime<Utc>,
    /// Merit grant (collectible) rather than a token payment
    pub is_merit: bool,
    /// Queue id of the payment or grant that produced it
    pub reference: String,
    /// Ledger hash, for submitted payments
    pub tx_hash: Option<String>,
    /// Reward amount, for payments
    pub amount: Option<Amount>,
}

impl Achievement {
    /// Achievement for a submitted reward payment
    pub fn payment(task: &str, reference: &str, tx_hash: &str, amount: Amount) -> Self {
        Self {
            name: task.to_string(),
            description: None,
            recorded_at: Utc::now(),
            is_merit: false,
            reference: reference.to_string(),
            tx_hash: Some(tx_hash.to_string()),
            amount: Some(amount),
        }
    }

    /// Achievement for a granted merit
    pub fn merit(achievement_type: &str, description: &str, reference: &str) -> Self {
        Self {
            name: format!("Merit: {}", achievement_type),
            description: Some(description.to_string()),
            recorded_at: Utc::now(),
            is_merit: true,
            reference: reference.to_string(),
            tx_hash: None,
            amount: None,
        }
    }
}

/// A person who can receive rewards
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeneficiaryRecord {
    pub id: String,
    pub name: String,
    /// Ledger account currently on file; replaced when a credential derives another
    pub public_id: Option<AccountId>,
    pub achievements: Vec<Achievement>,
    pub registered_at: DateTime<Utc>,
}

impl BeneficiaryRecord {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            public_id: None,
            achievements: Vec::new(),
            registered_at: Utc::now(),
        }
    }

    pub fn with_public_id(mut self, public_id: AccountId) -> Self {
        self.public_id = Some(public_id);
        self
    }

    /// Number of merit grants received
    pub fn merit_count(&self) -> usize {
        self.achievements.iter().filter(|a| a.is_merit).count()
    }
}
