// Error categories shared by every user-visible failure
//
// Each module keeps its own thiserror enum for the message; the category
// lets callers branch without matching on module-specific variants
// (e.g. offer "fund issuer" on IssuerNotFunded).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured category attached to every error this crate surfaces
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Malformed signing credential or account identifier
    InvalidCredentialFormat,
    /// Credential does not derive the claimed public identifier
    CredentialMismatch,
    /// Caller-supplied value failed a precondition
    InvalidInput,
    /// The issuing account does not exist on the ledger yet
    IssuerNotFunded,
    /// No functioning ledger client or signing backend is configured
    GatewayUnavailable,
    /// Activation verification could not observe the account
    ActivationTimeout,
    /// Activation verification observed the account but it is not ready
    ActivationIncomplete,
    /// Activation provisioning step failed
    ActivationFailed,
    /// Pending entry unknown or already decided
    NotFound,
    /// Ledger rejected the transaction with native result codes
    GatewayRejected,
    /// Network or protocol failure talking to a gateway or backend
    Transport,
    /// Local persistence failure
    Storage,
    /// Invalid process configuration
    Configuration,
}

impl ErrorCategory {
    /// Stable machine-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidCredentialFormat => "invalid_credential_format",
            ErrorCategory::CredentialMismatch => "credential_mismatch",
            ErrorCategory::InvalidInput => "invalid_input",
            ErrorCategory::IssuerNotFunded => "issuer_not_funded",
            ErrorCategory::GatewayUnavailable => "gateway_unavailable",
            ErrorCategory::ActivationTimeout => "activation_timeout",
            ErrorCategory::ActivationIncomplete => "activation_incomplete",
            ErrorCategory::ActivationFailed => "activation_failed",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::GatewayRejected => "gateway_rejected",
            ErrorCategory::Transport => "transport",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that expose a structured category alongside their message
pub trait Categorized: std::error::Error {
    fn category(&self) -> ErrorCategory;
}
