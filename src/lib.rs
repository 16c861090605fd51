//! Reward issuance and two-party approval over a ledger gateway.
//!
//! A reward becomes an issuer-signed payment ([`issuance`]), waits in the
//! [`queue`] for a validator, and is broadcast through a
//! [`ledger::LedgerGateway`] only once approved. Merit grants follow the same
//! shape with a second signature in place of the approval. Beneficiary
//! accounts are provisioned and verified by [`activation`].

pub mod activation;
pub mod config;
pub mod error;
pub mod identity;
pub mod issuance;
pub mod ledger;
pub mod queue;
pub mod storage;

pub use config::{Config, ConfigError};
pub use error::{Categorized, ErrorCategory};
