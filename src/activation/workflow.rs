// Activation workflow - provision then verify
//
// Provision: fund the account (idempotent) and submit a ChangeTrust signed
// by the account's own credential. Verify: poll the gateway until the
// account is funded and trusts the reward asset, within a fixed budget.
// Only a successful verification records ACTIVE.

use crate::activation::{Delay, RetryPolicy, TokioDelay};
use crate::error::{Categorized, ErrorCategory};
use crate::identity::{AccountError, AccountId, AccountReference};
use crate::ledger::{
    Amount, CodecError, EnvelopeCodec, FundOutcome, GatewayError, LedgerGateway, Network,
    Operation, RewardAsset, TransactionBuilder, TransactionEnvelope, TxBuildError,
};
use crate::storage::{ActivationState, PublicIdUpdate, RewardStore, StoreError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// ERRORS
// ============================================================================

/// Provisioning step that failed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisionStep {
    Funding,
    LoadAccount,
    TrustSubmission,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionStep::Funding => f.write_str("funding"),
            ProvisionStep::LoadAccount => f.write_str("account lookup"),
            ProvisionStep::TrustSubmission => f.write_str("trustline submission"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ActivationError {
    #[error(transparent)]
    Credential(#[from] AccountError),

    #[error("Account reference carries no signing credential")]
    MissingCredential,

    #[error("Provisioning failed during {step}: {source}")]
    ProvisionFailed {
        step: ProvisionStep,
        #[source]
        source: GatewayError,
    },

    #[error("Failed to build trustline transaction: {0}")]
    TrustBuild(#[from] TxBuildError),

    #[error("Failed to encode trustline transaction: {0}")]
    TrustEncode(#[from] CodecError),

    #[error("Activation not confirmed after {attempts} attempts: {last_error}")]
    ActivationTimeout {
        attempts: u32,
        last_error: GatewayError,
    },

    #[error(
        "Activation incomplete after {attempts} attempts (funded: {funded}, trustline: {trust_established})"
    )]
    ActivationIncomplete {
        funded: bool,
        trust_established: bool,
        attempts: u32,
    },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl Categorized for ActivationError {
    fn category(&self) -> ErrorCategory {
        match self {
            ActivationError::Credential(e) => e.category(),
            ActivationError::MissingCredential => ErrorCategory::InvalidCredentialFormat,
            ActivationError::ProvisionFailed { source, .. } => match source {
                GatewayError::Unavailable(_) => ErrorCategory::GatewayUnavailable,
                _ => ErrorCategory::ActivationFailed,
            },
            ActivationError::TrustBuild(_) | ActivationError::TrustEncode(_) => {
                ErrorCategory::ActivationFailed
            }
            ActivationError::ActivationTimeout { .. } => ErrorCategory::ActivationTimeout,
            ActivationError::ActivationIncomplete { .. } => ErrorCategory::ActivationIncomplete,
            ActivationError::Storage(e) => e.category(),
        }
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// What provisioning did
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionReport {
    pub funding: FundOutcome,
    /// Hash of the ChangeTrust submission; `None` when the trustline already existed
    pub trust_tx_hash: Option<String>,
}

/// Successful activation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivationOutcome {
    pub public_id: AccountId,
    pub state: ActivationState,
    /// Public id on file was replaced by the one derived from the credential
    pub public_id_updated: bool,
    /// `None` when the account was already ACTIVE and nothing was provisioned
    pub provision: Option<ProvisionReport>,
    /// Verification polls made
    pub attempts: u32,
}

/// Last thing verification saw
enum Observation {
    Account { funded: bool, trust_established: bool },
    Failed(GatewayError),
}

// ============================================================================
// WORKFLOW
// ============================================================================

/// Provisions and verifies beneficiary accounts; sole writer of activation state
pub struct ActivationWorkflow {
    gateway: Arc<dyn LedgerGateway>,
    store: Arc<RewardStore>,
    asset: RewardAsset,
    network: Network,
    policy: RetryPolicy,
    delay: Arc<dyn Delay>,
}

impl ActivationWorkflow {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        store: Arc<RewardStore>,
        asset: RewardAsset,
        network: Network,
    ) -> Self {
        Self {
            gateway,
            store,
            asset,
            network,
            policy: RetryPolicy::default(),
            delay: Arc::new(TokioDelay),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Current activation state of an account
    pub fn state(&self, account: &AccountId) -> Result<ActivationState, ActivationError> {
        Ok(self.store.activation_state(account)?)
    }

    /// Activate the account controlled by `credential` for `beneficiary`
    ///
    /// The credential is validated before any network call. The public id
    /// derived from it replaces whatever was on file for the beneficiary.
    pub async fn activate(
        &self,
        beneficiary: &str,
        credential: &str,
    ) -> Result<ActivationOutcome, ActivationError> {
        let reference = AccountReference::parse_credential(credential)?;
        let public_id = *reference.public_id();

        let public_id_updated = matches!(
            self.store.reconcile_public_id(beneficiary, public_id)?,
            PublicIdUpdate::Replaced { .. }
        );

        if self.store.activation_state(&public_id)? == ActivationState::Active {
            debug!(account = %public_id, "account already active");
            return Ok(ActivationOutcome {
                public_id,
                state: ActivationState::Active,
                public_id_updated,
                provision: None,
                attempts: 0,
            });
        }

        let provision = self.provision(&reference).await?;
        let attempts = self.verify(&public_id).await?;

        self.store.mark_active(&public_id)?;
        info!(beneficiary, account = %public_id, attempts, "account activated");

        Ok(ActivationOutcome {
            public_id,
            state: ActivationState::Active,
            public_id_updated,
            provision: Some(provision),
            attempts,
        })
    }

    /// Fund the account and establish its trustline to the reward asset
    pub async fn provision(
        &self,
        reference: &AccountReference,
    ) -> Result<ProvisionReport, ActivationError> {
        let seed = reference
            .credential()
            .ok_or(ActivationError::MissingCredential)?;
        let id = *reference.public_id();

        let funding = self
            .gateway
            .fund_account(&id)
            .await
            .map_err(|source| ActivationError::ProvisionFailed {
                step: ProvisionStep::Funding,
                source,
            })?;
        debug!(account = %id, ?funding, "funding requested");

        let state = self
            .gateway
            .get_account(&id)
            .await
            .map_err(|source| ActivationError::ProvisionFailed {
                step: ProvisionStep::LoadAccount,
                source,
            })?;

        if state.has_trustline(&self.asset) {
            debug!(account = %id, asset = %self.asset, "trustline already present");
            return Ok(ProvisionReport {
                funding,
                trust_tx_hash: None,
            });
        }

        let tx = TransactionBuilder::new()
            .source(id, state.sequence)
            .operation(Operation::ChangeTrust {
                asset: self.asset.to_asset(),
                limit: Amount::MAX,
            })
            .build()?;
        let mut envelope = TransactionEnvelope::new(tx);
        envelope.sign(seed.keypair(), &self.network);
        let payload = EnvelopeCodec::encode(&envelope)?;

        let receipt = self
            .gateway
            .submit_transaction(&payload)
            .await
            .map_err(|source| ActivationError::ProvisionFailed {
                step: ProvisionStep::TrustSubmission,
                source,
            })?;
        info!(account = %id, hash = %receipt.hash, "trustline established");

        Ok(ProvisionReport {
            funding,
            trust_tx_hash: Some(receipt.hash),
        })
    }

    /// Poll until the account is funded and trusts the reward asset.
    /// Returns the number of attempts used. Never changes stored state.
    pub async fn verify(&self, account: &AccountId) -> Result<u32, ActivationError> {
        let max_attempts = self.policy.max_attempts();
        let mut last = Observation::Account {
            funded: false,
            trust_established: false,
        };

        for attempt in 1..=max_attempts {
            last = match self.gateway.get_account(account).await {
                Ok(state) => {
                    let trust_established = state.has_trustline(&self.asset);
                    if trust_established {
                        return Ok(attempt);
                    }
                    Observation::Account {
                        funded: true,
                        trust_established,
                    }
                }
                Err(GatewayError::AccountNotFound(_)) => Observation::Account {
                    funded: false,
                    trust_established: false,
                },
                Err(e) => Observation::Failed(e),
            };
            debug!(account = %account, attempt, max_attempts, "activation not yet confirmed");

            if attempt < max_attempts {
                self.delay.wait(self.policy.delay()).await;
            }
        }

        let err = match last {
            Observation::Account {
                funded,
                trust_established,
            } => ActivationError::ActivationIncomplete {
                funded,
                trust_established,
                attempts: max_attempts,
            },
            Observation::Failed(last_error) => ActivationError::ActivationTimeout {
                attempts: max_attempts,
                last_error,
            },
        };
        warn!(account = %account, error = %err, "activation verification exhausted");
        Err(err)
    }
}
