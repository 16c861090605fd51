// Queue identifiers - `TX<millis>` for payments, `NFT<millis>` for merit grants
//
// Derived from wall-clock milliseconds but strictly increasing per
// generator, so two ids minted in the same millisecond still differ.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub const PAYMENT_ID_PREFIX: &str = "TX";
pub const GRANT_ID_PREFIX: &str = "NFT";

/// Monotonic millisecond source
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next value: the current time in ms, or one more than the last value
    /// handed out if the clock has not moved forward
    pub fn next_millis(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut last = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange(last, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return candidate,
                Err(observed) => last = observed,
            }
        }
    }

    pub fn next_payment_id(&self) -> PaymentId {
        PaymentId(format!("{}{}", PAYMENT_ID_PREFIX, self.next_millis()))
    }

    pub fn next_grant_id(&self) -> GrantId {
        GrantId(format!("{}{}", GRANT_ID_PREFIX, self.next_millis()))
    }
}

/// Identifier of a pending payment
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PaymentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a pending merit grant
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantId(String);

impl GrantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GrantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
