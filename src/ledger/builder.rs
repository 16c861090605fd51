use crate::error::{Categorized, ErrorCategory};
use crate::identity::AccountId;
use crate::ledger::{
    Operation, TimeBounds, Transaction, BASE_FEE, MAX_MEMO_BYTES, MAX_OPERATIONS,
};
use chrono::Utc;
use thiserror::Error;

/// Default validity window for built transactions
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur when building a transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxBuildError {
    #[error("Missing source: source account and sequence are required")]
    MissingSource,

    #[error("No operations: a transaction needs at least one operation")]
    NoOperations,

    #[error("Too many operations: {0} exceeds the limit of 100")]
    TooManyOperations(usize),

    #[error("Memo too long: {0} bytes exceeds the limit of 28")]
    MemoTooLong(usize),

    #[error("Invalid amount in operation {index}: {reason}")]
    InvalidOperation { index: usize, reason: String },

    #[error("Sequence overflow: account sequence is exhausted")]
    SequenceOverflow,

    #[error("Fee overflow: base fee times operation count exceeds u32")]
    FeeOverflow,
}

impl Categorized for TxBuildError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::InvalidInput
    }
}

/// Builder for transactions; the sequence is taken from the source
/// account's current state and incremented by one.
pub struct TransactionBuilder {
    source: Option<(AccountId, i64)>,
    base_fee: u32,
    timeout_secs: Option<u64>,
    now: Option<u64>,
    memo: Option<String>,
    operations: Vec<Operation>,
}

impl TransactionBuilder {
    /// Create a new TransactionBuilder
    pub fn new() -> Self {
        Self {
            source: None,
            base_fee: BASE_FEE,
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            now: None,
            memo: None,
            operations: Vec::new(),
        }
    }

    /// Set the source account and its current sequence number (required)
    pub fn source(mut self, account: AccountId, current_sequence: i64) -> Self {
        self.source = Some((account, current_sequence));
        self
    }

    /// Set the per-operation fee
    pub fn base_fee(mut self, fee: u32) -> Self {
        self.base_fee = fee;
        self
    }

    /// Set the validity window; `None` leaves the transaction unbounded
    pub fn timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the clock used for time bounds (optional - wall clock otherwise)
    pub fn now(mut self, unix_secs: u64) -> Self {
        self.now = Some(unix_secs);
        self
    }

    pub fn memo(mut self, memo: &str) -> Self {
        self.memo = Some(memo.to_string());
        self
    }

    pub fn operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    /// Validate and assemble the transaction
    pub fn build(self) -> Result<Transaction, TxBuildError> {
        let (source, current_sequence) = self.source.ok_or(TxBuildError::MissingSource)?;

        if self.operations.is_empty() {
            return Err(TxBuildError::NoOperations);
        }
        if self.operations.len() > MAX_OPERATIONS {
            return Err(TxBuildError::TooManyOperations(self.operations.len()));
        }
        if let Some(memo) = &self.memo {
            if memo.len() > MAX_MEMO_BYTES {
                return Err(TxBuildError::MemoTooLong(memo.len()));
            }
        }

        for (index, op) in self.operations.iter().enumerate() {
            match op {
                Operation::Payment { amount, .. } if !amount.is_positive() => {
                    return Err(TxBuildError::InvalidOperation {
                        index,
                        reason: format!("payment amount {} must be positive", amount),
                    });
                }
                Operation::ChangeTrust { asset, .. } if asset.is_native() => {
                    return Err(TxBuildError::InvalidOperation {
                        index,
                        reason: "cannot trust the native asset".to_string(),
                    });
                }
                Operation::ChangeTrust { limit, .. } if limit.stroops() < 0 => {
                    return Err(TxBuildError::InvalidOperation {
                        index,
                        reason: "trust limit cannot be negative".to_string(),
                    });
                }
                _ => {}
            }
        }

        let sequence = current_sequence
            .checked_add(1)
            .ok_or(TxBuildError::SequenceOverflow)?;

        let fee = self
            .base_fee
            .checked_mul(self.operations.len() as u32)
            .ok_or(TxBuildError::FeeOverflow)?;

        let time_bounds = self.timeout_secs.map(|timeout| {
            let now = self
                .now
                .unwrap_or_else(|| Utc::now().timestamp().max(0) as u64);
            TimeBounds {
                min_time: 0,
                max_time: now + timeout,
            }
        });

        Ok(Transaction::new(
            source,
            fee,
            sequence,
            time_bounds,
            self.memo,
            self.operations,
        ))
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
