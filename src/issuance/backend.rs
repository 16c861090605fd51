// Signing backends - who builds and signs issuer payments
//
// Chosen once from configuration:
// - RemoteSigningBackend when a backend URL and key are configured
// - LocalSigner when the issuer secret is held in-process
// - UnavailableBackend otherwise (every call reports GatewayUnavailable)

use crate::config::{Config, ConfigError};
use crate::error::{Categorized, ErrorCategory};
use crate::identity::{AccountId, SecretSeed};
use crate::issuance::RemoteSigningBackend;
use crate::ledger::{
    Amount, CodecError, EnvelopeCodec, GatewayError, LedgerGateway, Network, Operation,
    RewardAsset, SignedPayload, SubmitReceipt, TransactionBuilder, TransactionEnvelope,
    TxBuildError, DEFAULT_TIMEOUT_SECS,
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// BUILD ERROR
// ============================================================================

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Invalid reward amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid beneficiary identifier: {0}")]
    InvalidBeneficiary(String),

    #[error("Issuer account {0} is not funded on the ledger")]
    IssuerNotFunded(AccountId),

    #[error("No ledger client or signing backend available: {0}")]
    GatewayUnavailable(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Failed to assemble transaction: {0}")]
    Transaction(#[from] TxBuildError),

    #[error("Failed to encode transaction: {0}")]
    Codec(#[from] CodecError),

    #[error("Signing backend error ({status}): {message}")]
    Backend { status: u16, message: String },
}

impl Categorized for BuildError {
    fn category(&self) -> ErrorCategory {
        match self {
            BuildError::InvalidAmount(_) | BuildError::InvalidBeneficiary(_) => {
                ErrorCategory::InvalidInput
            }
            BuildError::IssuerNotFunded(_) => ErrorCategory::IssuerNotFunded,
            BuildError::GatewayUnavailable(_) => ErrorCategory::GatewayUnavailable,
            BuildError::Gateway(e) => e.category(),
            BuildError::Transaction(e) => e.category(),
            BuildError::Codec(e) => e.category(),
            BuildError::Backend { .. } => ErrorCategory::Transport,
        }
    }
}

// ============================================================================
// SIGNING BACKEND TRAIT
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendMode {
    Local,
    Remote,
    Unavailable,
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Local => f.write_str("local"),
            BackendMode::Remote => f.write_str("remote"),
            BackendMode::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Capability to produce issuer-signed reward payments and broadcast them
#[async_trait]
pub trait SigningBackend: Send + Sync {
    fn mode(&self) -> BackendMode;

    /// The issuing account payments are built from
    fn issuer(&self) -> &AccountId;

    /// Build and sign a reward payment without broadcasting it
    async fn build_payment(
        &self,
        destination: &AccountId,
        amount: Amount,
    ) -> Result<SignedPayload, BuildError>;

    /// Broadcast a payload exactly as given
    async fn submit(&self, payload: &SignedPayload) -> Result<SubmitReceipt, GatewayError>;
}

// ============================================================================
// LOCAL SIGNER
// ============================================================================

/// Holds the issuer secret in-process and signs against a ledger gateway
pub struct LocalSigner {
    issuer: SecretSeed,
    issuer_id: AccountId,
    gateway: Arc<dyn LedgerGateway>,
    asset: RewardAsset,
    network: Network,
    timeout_secs: u64,
}

impl LocalSigner {
    pub fn new(
        issuer: SecretSeed,
        gateway: Arc<dyn LedgerGateway>,
        asset: RewardAsset,
        network: Network,
    ) -> Self {
        let issuer_id = issuer.account_id();
        Self {
            issuer,
            issuer_id,
            gateway,
            asset,
            network,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// How long a built payment stays valid for submission
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn asset(&self) -> &RewardAsset {
        &self.asset
    }
}

#[async_trait]
impl SigningBackend for LocalSigner {
    fn mode(&self) -> BackendMode {
        BackendMode::Local
    }

    fn issuer(&self) -> &AccountId {
        &self.issuer_id
    }

    async fn build_payment(
        &self,
        destination: &AccountId,
        amount: Amount,
    ) -> Result<SignedPayload, BuildError> {
        let state = match self.gateway.get_account(&self.issuer_id).await {
            Ok(state) => state,
            Err(GatewayError::AccountNotFound(_)) => {
                return Err(BuildError::IssuerNotFunded(self.issuer_id));
            }
            Err(e) => return Err(BuildError::Gateway(e)),
        };

        let tx = TransactionBuilder::new()
            .source(self.issuer_id, state.sequence)
            .operation(Operation::Payment {
                destination: *destination,
                asset: self.asset.to_asset(),
                amount,
            })
            .timeout_secs(Some(self.timeout_secs))
            .build()?;

        let mut envelope = TransactionEnvelope::new(tx);
        envelope.sign(self.issuer.keypair(), &self.network);
        let payload = EnvelopeCodec::encode(&envelope)?;

        debug!(
            destination = %destination,
            amount = %amount,
            hash = %envelope.hash(&self.network),
            "reward payment signed"
        );
        Ok(payload)
    }

    async fn submit(&self, payload: &SignedPayload) -> Result<SubmitReceipt, GatewayError> {
        self.gateway.submit_transaction(payload).await
    }
}

// ============================================================================
// UNAVAILABLE BACKEND
// ============================================================================

/// Stand-in when neither an issuer secret nor a remote backend is configured
pub struct UnavailableBackend {
    issuer: AccountId,
    reason: String,
}

impl UnavailableBackend {
    pub fn new(issuer: AccountId, reason: &str) -> Self {
        Self {
            issuer,
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl SigningBackend for UnavailableBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Unavailable
    }

    fn issuer(&self) -> &AccountId {
        &self.issuer
    }

    async fn build_payment(
        &self,
        _destination: &AccountId,
        _amount: Amount,
    ) -> Result<SignedPayload, BuildError> {
        Err(BuildError::GatewayUnavailable(self.reason.clone()))
    }

    async fn submit(&self, _payload: &SignedPayload) -> Result<SubmitReceipt, GatewayError> {
        Err(GatewayError::Unavailable(self.reason.clone()))
    }
}

// ============================================================================
// SELECTION
// ============================================================================

/// Pick the signing backend once, at configuration time
pub fn select_backend(
    config: &Config,
    gateway: Arc<dyn LedgerGateway>,
) -> Result<Arc<dyn SigningBackend>, ConfigError> {
    config.validate()?;
    let issuer = config.issuer()?;

    if let (Some(url), Some(key)) = (&config.signing_backend_url, &config.signing_backend_key) {
        let remote = RemoteSigningBackend::new(url, key, issuer).map_err(|e| {
            ConfigError::Invalid(format!("signing backend client: {}", e))
        })?;
        info!(issuer = %issuer, url = %url, "using remote signing backend");
        return Ok(Arc::new(remote));
    }

    if let Some(seed) = &config.issuer_secret {
        info!(issuer = %issuer, "using local issuer signer");
        let signer = LocalSigner::new(
            seed.clone(),
            gateway,
            config.reward_asset()?,
            config.network(),
        )
        .with_timeout(config.payment_timeout_secs);
        return Ok(Arc::new(signer));
    }

    warn!(issuer = %issuer, "no issuer secret or signing backend configured");
    Ok(Arc::new(UnavailableBackend::new(
        issuer,
        "no issuer secret or signing backend configured",
    )))
}
