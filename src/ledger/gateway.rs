// Ledger Gateway - the external ledger network behind an async trait
//
// Account state, friendbot-style funding, and transaction broadcast.
// Implementations: HorizonGateway (HTTP) and InMemoryLedger.

use crate::error::{Categorized, ErrorCategory};
use crate::identity::AccountId;
use crate::ledger::{Amount, Asset, RewardAsset, SignedPayload};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// ACCOUNT STATE
// ============================================================================

/// One asset holding of an account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceLine {
    pub asset: Asset,
    pub balance: Amount,
    /// Trustline limit; `None` for the native asset
    pub limit: Option<Amount>,
}

/// Account as reported by the ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub id: AccountId,
    pub sequence: i64,
    pub balances: Vec<BalanceLine>,
}

impl AccountState {
    /// Balance of the reward asset, if a trustline exists
    pub fn reward_balance(&self, asset: &RewardAsset) -> Option<Amount> {
        self.balances
            .iter()
            .find(|line| asset.matches(&line.asset))
            .map(|line| line.balance)
    }

    /// Whether the account trusts the reward asset
    pub fn has_trustline(&self, asset: &RewardAsset) -> bool {
        self.reward_balance(asset).is_some()
    }

    pub fn native_balance(&self) -> Amount {
        self.balances
            .iter()
            .find(|line| line.asset.is_native())
            .map(|line| line.balance)
            .unwrap_or(Amount::ZERO)
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// Outcome of a funding request; both are success
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FundOutcome {
    Funded,
    AlreadyFunded,
}

/// Receipt for an accepted transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// Hex transaction hash
    pub hash: String,
    /// Ledger the transaction was included in
    pub ledger: u64,
    /// Fee charged, in native stroops
    pub fee_charged: i64,
}

/// Ledger-native result codes, kept verbatim
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCodes {
    pub transaction: String,
    pub operations: Vec<String>,
}

impl ResultCodes {
    /// Transaction-level failure with no operation codes
    pub fn transaction(code: &str) -> Self {
        Self {
            transaction: code.to_string(),
            operations: Vec::new(),
        }
    }

    pub fn with_operations(mut self, ops: &[&str]) -> Self {
        self.operations = ops.iter().map(|s| s.to_string()).collect();
        self
    }
}

impl fmt::Display for ResultCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.transaction)?;
        if !self.operations.is_empty() {
            write!(f, " [{}]", self.operations.join(", "))?;
        }
        Ok(())
    }
}

// ============================================================================
// GATEWAY ERROR
// ============================================================================

/// Errors reported by a ledger gateway
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Account not found on ledger: {0}")]
    AccountNotFound(AccountId),

    #[error("Ledger gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Transaction rejected by ledger: {result_codes}")]
    Rejected { result_codes: ResultCodes },

    #[error("Funding request failed: {0}")]
    FundingFailed(String),

    #[error("Gateway transport error: {0}")]
    Transport(String),

    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Ledger result codes, when the ledger itself rejected the transaction
    pub fn result_codes(&self) -> Option<&ResultCodes> {
        match self {
            GatewayError::Rejected { result_codes } => Some(result_codes),
            _ => None,
        }
    }
}

impl Categorized for GatewayError {
    fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::AccountNotFound(_) => ErrorCategory::NotFound,
            GatewayError::Unavailable(_) => ErrorCategory::GatewayUnavailable,
            GatewayError::Rejected { .. } => ErrorCategory::GatewayRejected,
            GatewayError::FundingFailed(_)
            | GatewayError::Transport(_)
            | GatewayError::InvalidResponse(_) => ErrorCategory::Transport,
        }
    }
}

// ============================================================================
// LEDGER GATEWAY TRAIT
// ============================================================================

/// Asynchronous access to the external ledger network
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Current state of an account; `AccountNotFound` if it does not exist
    async fn get_account(&self, id: &AccountId) -> Result<AccountState, GatewayError>;

    /// Create and fund an account; funding an existing account is not an error
    async fn fund_account(&self, id: &AccountId) -> Result<FundOutcome, GatewayError>;

    /// Broadcast a signed payload exactly as given
    async fn submit_transaction(
        &self,
        payload: &SignedPayload,
    ) -> Result<SubmitReceipt, GatewayError>;
}
