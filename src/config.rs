// Process configuration
//
// Loaded from EDUCHAIN_* environment variables, then adjusted with the
// builder-style setters. The reward asset identity is derived from here
// and passed explicitly to every component.

use crate::activation::RetryPolicy;
use crate::error::{Categorized, ErrorCategory};
use crate::identity::{AccountId, SecretSeed};
use crate::ledger::{Network, RewardAsset, DEFAULT_FRIENDBOT_URL, DEFAULT_HORIZON_URL};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ENV_ISSUER_PUBLIC: &str = "EDUCHAIN_ISSUER_PUBLIC";
pub const ENV_ISSUER_SECRET: &str = "EDUCHAIN_ISSUER_SECRET";
pub const ENV_VALIDATOR_PUBLIC: &str = "EDUCHAIN_VALIDATOR_PUBLIC";
pub const ENV_SIGNING_BACKEND_URL: &str = "EDUCHAIN_SIGNING_BACKEND_URL";
pub const ENV_SIGNING_BACKEND_KEY: &str = "EDUCHAIN_SIGNING_BACKEND_KEY";
pub const ENV_HORIZON_URL: &str = "EDUCHAIN_HORIZON_URL";
pub const ENV_FRIENDBOT_URL: &str = "EDUCHAIN_FRIENDBOT_URL";
pub const ENV_NETWORK_PASSPHRASE: &str = "EDUCHAIN_NETWORK_PASSPHRASE";
pub const ENV_ASSET_CODE: &str = "EDUCHAIN_ASSET_CODE";
pub const ENV_STORE_PATH: &str = "EDUCHAIN_STORE_PATH";
pub const ENV_ACTIVATION_ATTEMPTS: &str = "EDUCHAIN_ACTIVATION_ATTEMPTS";
pub const ENV_ACTIVATION_DELAY_MS: &str = "EDUCHAIN_ACTIVATION_DELAY_MS";
pub const ENV_PAYMENT_TIMEOUT_SECS: &str = "EDUCHAIN_PAYMENT_TIMEOUT_SECS";

/// Reward token code used when none is configured
pub const DEFAULT_ASSET_CODE: &str = "TASK";

/// Validity window of a queued reward payload. Payloads wait for a human
/// validator, so this is measured in hours rather than seconds.
pub const DEFAULT_PAYMENT_TIMEOUT_SECS: u64 = 86_400;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Issuer secret controls {derived}, but issuer public id is {configured}")]
    IssuerMismatch {
        configured: AccountId,
        derived: AccountId,
    },

    #[error("Signing backend URL and key must be configured together")]
    IncompleteBackend,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl Categorized for ConfigError {
    fn category(&self) -> ErrorCategory {
        match self {
            ConfigError::IssuerMismatch { .. } => ErrorCategory::CredentialMismatch,
            _ => ErrorCategory::Configuration,
        }
    }
}

/// Process-wide settings
#[derive(Clone, Debug)]
pub struct Config {
    /// Issuer public id; derived from the secret when only that is given
    pub issuer_public: Option<AccountId>,
    /// Absent when signing is delegated to a remote backend
    pub issuer_secret: Option<SecretSeed>,
    pub validator_public: Option<AccountId>,
    pub signing_backend_url: Option<String>,
    pub signing_backend_key: Option<String>,
    pub horizon_url: String,
    pub friendbot_url: String,
    pub network_passphrase: String,
    pub asset_code: String,
    pub store_path: PathBuf,
    pub activation_attempts: u32,
    pub activation_delay_ms: u64,
    /// Upper time bound of reward payloads, relative to build time
    pub payment_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            issuer_public: None,
            issuer_secret: None,
            validator_public: None,
            signing_backend_url: None,
            signing_backend_key: None,
            horizon_url: DEFAULT_HORIZON_URL.to_string(),
            friendbot_url: DEFAULT_FRIENDBOT_URL.to_string(),
            network_passphrase: Network::TESTNET_PASSPHRASE.to_string(),
            asset_code: DEFAULT_ASSET_CODE.to_string(),
            store_path: PathBuf::from("educhain-data"),
            activation_attempts: 5,
            activation_delay_ms: 2000,
            payment_timeout_secs: DEFAULT_PAYMENT_TIMEOUT_SECS,
        }
    }
}

fn parse_var<T, E: std::fmt::Display>(
    var: &'static str,
    value: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Result<T, ConfigError> {
    parse(value.trim()).map_err(|e| ConfigError::InvalidValue {
        var,
        reason: e.to_string(),
    })
}

impl Config {
    /// Create a new config with builder pattern
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup; unset or empty keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get(ENV_ISSUER_PUBLIC) {
            config.issuer_public = Some(parse_var(ENV_ISSUER_PUBLIC, &v, AccountId::parse)?);
        }
        if let Some(v) = get(ENV_ISSUER_SECRET) {
            config.issuer_secret = Some(parse_var(ENV_ISSUER_SECRET, &v, SecretSeed::parse)?);
        }
        if let Some(v) = get(ENV_VALIDATOR_PUBLIC) {
            config.validator_public =
                Some(parse_var(ENV_VALIDATOR_PUBLIC, &v, AccountId::parse)?);
        }
        config.signing_backend_url = get(ENV_SIGNING_BACKEND_URL);
        config.signing_backend_key = get(ENV_SIGNING_BACKEND_KEY);

        if let Some(v) = get(ENV_HORIZON_URL) {
            config.horizon_url = v;
        }
        if let Some(v) = get(ENV_FRIENDBOT_URL) {
            config.friendbot_url = v;
        }
        if let Some(v) = get(ENV_NETWORK_PASSPHRASE) {
            config.network_passphrase = v;
        }
        if let Some(v) = get(ENV_ASSET_CODE) {
            config.asset_code = v;
        }
        if let Some(v) = get(ENV_STORE_PATH) {
            config.store_path = PathBuf::from(v);
        }
        if let Some(v) = get(ENV_ACTIVATION_ATTEMPTS) {
            config.activation_attempts =
                parse_var(ENV_ACTIVATION_ATTEMPTS, &v, str::parse::<u32>)?;
        }
        if let Some(v) = get(ENV_ACTIVATION_DELAY_MS) {
            config.activation_delay_ms =
                parse_var(ENV_ACTIVATION_DELAY_MS, &v, str::parse::<u64>)?;
        }
        if let Some(v) = get(ENV_PAYMENT_TIMEOUT_SECS) {
            config.payment_timeout_secs =
                parse_var(ENV_PAYMENT_TIMEOUT_SECS, &v, str::parse::<u64>)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_issuer_public(mut self, id: AccountId) -> Self {
        self.issuer_public = Some(id);
        self
    }

    pub fn with_issuer_secret(mut self, seed: SecretSeed) -> Self {
        self.issuer_secret = Some(seed);
        self
    }

    pub fn with_validator_public(mut self, id: AccountId) -> Self {
        self.validator_public = Some(id);
        self
    }

    /// Delegate build/submit to a remote signing backend
    pub fn with_signing_backend(mut self, url: &str, api_key: &str) -> Self {
        self.signing_backend_url = Some(url.to_string());
        self.signing_backend_key = Some(api_key.to_string());
        self
    }

    pub fn with_horizon_url(mut self, url: &str) -> Self {
        self.horizon_url = url.to_string();
        self
    }

    pub fn with_friendbot_url(mut self, url: &str) -> Self {
        self.friendbot_url = url.to_string();
        self
    }

    pub fn with_network_passphrase(mut self, passphrase: &str) -> Self {
        self.network_passphrase = passphrase.to_string();
        self
    }

    pub fn with_asset_code(mut self, code: &str) -> Self {
        self.asset_code = code.to_string();
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn with_activation_retry(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.activation_attempts = attempts;
        self.activation_delay_ms = delay_ms;
        self
    }

    pub fn with_payment_timeout(mut self, secs: u64) -> Self {
        self.payment_timeout_secs = secs;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let (Some(configured), Some(seed)) = (&self.issuer_public, &self.issuer_secret) {
            let derived = seed.account_id();
            if derived != *configured {
                return Err(ConfigError::IssuerMismatch {
                    configured: *configured,
                    derived,
                });
            }
        }
        if let (Some(validator), Ok(issuer)) = (&self.validator_public, self.issuer()) {
            if *validator == issuer {
                return Err(ConfigError::Invalid(
                    "validator must differ from the issuer".to_string(),
                ));
            }
        }
        if self.signing_backend_url.is_some() != self.signing_backend_key.is_some() {
            return Err(ConfigError::IncompleteBackend);
        }
        if self.activation_attempts == 0 {
            return Err(ConfigError::Invalid(
                "activation_attempts must be > 0".to_string(),
            ));
        }
        if self.payment_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "payment_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.network_passphrase.is_empty() {
            return Err(ConfigError::Invalid(
                "network_passphrase must not be empty".to_string(),
            ));
        }
        RewardAsset::validate_code(&self.asset_code).map_err(|e| ConfigError::InvalidValue {
            var: ENV_ASSET_CODE,
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Issuer public id, configured or derived from the secret
    pub fn issuer(&self) -> Result<AccountId, ConfigError> {
        self.issuer_public
            .or_else(|| self.issuer_secret.as_ref().map(SecretSeed::account_id))
            .ok_or(ConfigError::Missing(ENV_ISSUER_PUBLIC))
    }

    /// The fixed reward token: configured code issued by the issuer
    pub fn reward_asset(&self) -> Result<RewardAsset, ConfigError> {
        RewardAsset::new(&self.asset_code, self.issuer()?).map_err(|e| {
            ConfigError::InvalidValue {
                var: ENV_ASSET_CODE,
                reason: e.to_string(),
            }
        })
    }

    pub fn network(&self) -> Network {
        Network::new(&self.network_passphrase)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.activation_attempts,
            Duration::from_millis(self.activation_delay_ms),
        )
    }

    /// Both remote backend settings are present
    pub fn has_signing_backend(&self) -> bool {
        self.signing_backend_url.is_some() && self.signing_backend_key.is_some()
    }
}
