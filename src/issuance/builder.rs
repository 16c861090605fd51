// RewardIssuanceBuilder - turns a reward into a signed payload
//
// Validates the request, then delegates to the signing backend. Nothing is
// broadcast and nothing is enqueued here; the caller hands the payload to
// the payment queue.

use crate::identity::AccountId;
use crate::issuance::{BackendMode, BuildError, SigningBackend};
use crate::ledger::{Amount, FundOutcome, GatewayError, LedgerGateway, SignedPayload};
use std::sync::Arc;
use tracing::info;

/// Parse a user-entered reward amount
pub fn parse_reward_amount(input: &str) -> Result<Amount, BuildError> {
    let amount = Amount::parse(input).map_err(|e| BuildError::InvalidAmount(e.to_string()))?;
    if !amount.is_positive() {
        return Err(BuildError::InvalidAmount(format!(
            "{} must be greater than zero",
            input.trim()
        )));
    }
    Ok(amount)
}

pub struct RewardIssuanceBuilder {
    backend: Arc<dyn SigningBackend>,
    gateway: Arc<dyn LedgerGateway>,
}

impl RewardIssuanceBuilder {
    pub fn new(backend: Arc<dyn SigningBackend>, gateway: Arc<dyn LedgerGateway>) -> Self {
        Self { backend, gateway }
    }

    pub fn issuer(&self) -> &AccountId {
        self.backend.issuer()
    }

    pub fn backend_mode(&self) -> BackendMode {
        self.backend.mode()
    }

    /// Shared handle to the backend, for submitting what this builder produced
    pub fn backend(&self) -> Arc<dyn SigningBackend> {
        Arc::clone(&self.backend)
    }

    /// Build an issuer-signed payment of `amount` reward tokens to `beneficiary`
    ///
    /// Fails with `IssuerNotFunded` when the issuer account does not exist
    /// yet; see [`fund_issuer`](Self::fund_issuer).
    pub async fn build_reward_transaction(
        &self,
        beneficiary: &str,
        amount: Amount,
    ) -> Result<SignedPayload, BuildError> {
        if !amount.is_positive() {
            return Err(BuildError::InvalidAmount(format!(
                "{} must be greater than zero",
                amount
            )));
        }
        let destination = AccountId::parse(beneficiary.trim())
            .map_err(|e| BuildError::InvalidBeneficiary(e.to_string()))?;
        if destination == *self.backend.issuer() {
            return Err(BuildError::InvalidBeneficiary(
                "issuer cannot reward itself".to_string(),
            ));
        }

        self.backend.build_payment(&destination, amount).await
    }

    /// Ask the ledger to create and fund the issuer account
    pub async fn fund_issuer(&self) -> Result<FundOutcome, GatewayError> {
        let issuer = *self.backend.issuer();
        let outcome = self.gateway.fund_account(&issuer).await?;
        info!(issuer = %issuer, ?outcome, "issuer funding requested");
        Ok(outcome)
    }
}
