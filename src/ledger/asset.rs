// Assets and fixed-point amounts

use crate::error::{Categorized, ErrorCategory};
use crate::identity::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Smallest unit count per whole asset unit (7 decimal places)
pub const STROOPS_PER_UNIT: i64 = 10_000_000;

const DECIMALS: usize = 7;
const MAX_ASSET_CODE_LEN: usize = 12;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Invalid amount: '{0}' is not a decimal number")]
    InvalidFormat(String),

    #[error("Invalid amount: negative values are not allowed")]
    Negative,

    #[error("Invalid amount: more than 7 decimal places")]
    TooPrecise,

    #[error("Invalid amount: value does not fit in the ledger's range")]
    Overflow,

    #[error("Invalid amount: value is not finite")]
    NonFinite,
}

impl Categorized for AmountError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::InvalidInput
    }
}

/// Asset-denominated quantity stored as stroops (1 unit = 10^7 stroops)
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Largest representable amount; used as the default trustline limit
    pub const MAX: Amount = Amount(i64::MAX);

    /// Whole units, e.g. `Amount::from_units(10)` is 10.0000000
    pub const fn from_units(units: u32) -> Self {
        Self(units as i64 * STROOPS_PER_UNIT)
    }

    pub const fn from_stroops(stroops: i64) -> Self {
        Self(stroops)
    }

    pub const fn stroops(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Parse a decimal string such as `"10"` or `"2.5000000"`
    pub fn parse(s: &str) -> Result<Self, AmountError> {
        let s = s.trim();
        if s.starts_with('-') {
            return Err(AmountError::Negative);
        }

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(frac) {
            return Err(AmountError::InvalidFormat(s.to_string()));
        }
        if frac.len() > DECIMALS {
            return Err(AmountError::TooPrecise);
        }

        let whole: i64 = whole.parse().map_err(|_| AmountError::Overflow)?;
        let mut frac_stroops: i64 = 0;
        if !frac.is_empty() {
            let padded = format!("{:0<width$}", frac, width = DECIMALS);
            frac_stroops = padded
                .parse()
                .map_err(|_| AmountError::InvalidFormat(s.to_string()))?;
        }

        whole
            .checked_mul(STROOPS_PER_UNIT)
            .and_then(|w| w.checked_add(frac_stroops))
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    /// Convert a floating point quantity, rejecting NaN, infinities and negatives
    pub fn try_from_f64(value: f64) -> Result<Self, AmountError> {
        if !value.is_finite() {
            return Err(AmountError::NonFinite);
        }
        if value < 0.0 {
            return Err(AmountError::Negative);
        }
        let stroops = (value * STROOPS_PER_UNIT as f64).round();
        if stroops >= i64::MAX as f64 {
            return Err(AmountError::Overflow);
        }
        Ok(Amount(stroops as i64))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let unit = STROOPS_PER_UNIT as u64;
        write!(f, "{}{}.{:07}", sign, abs / unit, abs % unit)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// ASSET
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("Invalid asset code '{0}': expected 1-12 ASCII alphanumerics")]
    InvalidCode(String),
}

impl Categorized for AssetError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// An asset held on the ledger
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// The ledger's native currency (pays fees)
    Native,
    /// An issued asset, identified by code and issuing account
    Credit { code: String, issuer: AccountId },
}

impl Asset {
    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => f.write_str("native"),
            Asset::Credit { code, issuer } => write!(f, "{}:{}", code, issuer),
        }
    }
}

/// The fungible reward token: fixed code + fixed issuing identity.
///
/// Passed explicitly to every component so tests can substitute a
/// sandboxed pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RewardAsset {
    code: String,
    issuer: AccountId,
}

impl RewardAsset {
    pub fn new(code: &str, issuer: AccountId) -> Result<Self, AssetError> {
        Self::validate_code(code)?;
        Ok(Self {
            code: code.to_string(),
            issuer,
        })
    }

    /// 1 to 12 ASCII alphanumerics
    pub fn validate_code(code: &str) -> Result<(), AssetError> {
        let valid = !code.is_empty()
            && code.len() <= MAX_ASSET_CODE_LEN
            && code.bytes().all(|b| b.is_ascii_alphanumeric());
        if !valid {
            return Err(AssetError::InvalidCode(code.to_string()));
        }
        Ok(())
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn issuer(&self) -> &AccountId {
        &self.issuer
    }

    /// Whether a ledger asset is this reward token
    pub fn matches(&self, asset: &Asset) -> bool {
        match asset {
            Asset::Credit { code, issuer } => code == &self.code && issuer == &self.issuer,
            Asset::Native => false,
        }
    }

    pub fn to_asset(&self) -> Asset {
        Asset::Credit {
            code: self.code.clone(),
            issuer: self.issuer,
        }
    }
}

impl fmt::Display for RewardAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.code, self.issuer)
    }
}
