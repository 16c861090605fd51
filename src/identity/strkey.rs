//! StrKey encoding for account identifiers and signing seeds.
//!
//! Format: base32(version_byte || key(32) || crc16_xmodem_le(2)), RFC 4648
//! alphabet without padding. 35 payload bytes encode to exactly 56 chars.
//!
//! | Kind       | Version byte | Leading char |
//! |------------|--------------|--------------|
//! | Account id | `6 << 3`     | `G`          |
//! | Seed       | `18 << 3`    | `S`          |

use crate::error::{Categorized, ErrorCategory};
use crate::identity::{KeyError, Keypair, PublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of every encoded StrKey
pub const STRKEY_LEN: usize = 56;

const PAYLOAD_LEN: usize = 35;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// ASCII byte -> 5-bit value (0xFF = invalid)
const BASE32_DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let mut i = 0;
    while i < 32 {
        table[BASE32_ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrKeyError {
    #[error("Invalid key length: expected {expected} characters, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("Invalid key prefix: expected '{expected}', found '{found}'")]
    WrongPrefix { expected: char, found: char },

    #[error("Invalid base32 character: '{0}'")]
    InvalidCharacter(char),

    #[error("Invalid version byte: expected {expected:#04x}, got {got:#04x}")]
    WrongVersion { expected: u8, got: u8 },

    #[error("Checksum mismatch")]
    BadChecksum,

    #[error("Invalid key material: {0}")]
    InvalidKey(String),
}

impl Categorized for StrKeyError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::InvalidCredentialFormat
    }
}

impl From<KeyError> for StrKeyError {
    fn from(err: KeyError) -> Self {
        StrKeyError::InvalidKey(err.to_string())
    }
}

/// Kind of key carried by a StrKey
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum VersionByte {
    AccountId = 6 << 3,
    Seed = 18 << 3,
}

impl VersionByte {
    /// The leading character every key of this kind starts with
    pub fn prefix(self) -> char {
        BASE32_ALPHABET[(self as u8 >> 3) as usize] as char
    }
}

fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

fn encode_base32(bytes: &[u8]) -> String {
    let mut result = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | byte as u64;
        bits_in_buffer += 8;
        while bits_in_buffer >= 5 {
            bits_in_buffer -= 5;
            let idx = ((buffer >> bits_in_buffer) & 0x1F) as usize;
            result.push(BASE32_ALPHABET[idx] as char);
        }
    }
    if bits_in_buffer > 0 {
        let idx = ((buffer << (5 - bits_in_buffer)) & 0x1F) as usize;
        result.push(BASE32_ALPHABET[idx] as char);
    }

    result
}

fn decode_base32_payload(s: &str) -> Result<[u8; PAYLOAD_LEN], StrKeyError> {
    let mut buffer: u64 = 0;
    let mut bits_in_buffer = 0;
    let mut result = [0u8; PAYLOAD_LEN];
    let mut pos = 0;

    for c in s.chars() {
        let val = if c.is_ascii() {
            BASE32_DECODE[c as usize]
        } else {
            0xFF
        };
        if val == 0xFF {
            return Err(StrKeyError::InvalidCharacter(c));
        }
        buffer = (buffer << 5) | val as u64;
        bits_in_buffer += 5;
        if bits_in_buffer >= 8 {
            bits_in_buffer -= 8;
            if pos < PAYLOAD_LEN {
                result[pos] = (buffer >> bits_in_buffer) as u8;
                pos += 1;
            }
        }
    }

    if pos < PAYLOAD_LEN {
        return Err(StrKeyError::InvalidLength {
            expected: STRKEY_LEN,
            got: s.chars().count(),
        });
    }
    Ok(result)
}

/// Encode a 32-byte key as a StrKey of the given kind
pub fn encode(version: VersionByte, key: &[u8; 32]) -> String {
    let mut payload = [0u8; PAYLOAD_LEN];
    payload[0] = version as u8;
    payload[1..33].copy_from_slice(key);
    let crc = crc16_xmodem(&payload[..33]);
    payload[33..].copy_from_slice(&crc.to_le_bytes());
    encode_base32(&payload)
}

/// Decode a StrKey, checking length, prefix, alphabet, version and checksum
/// in that order. No key derivation happens here.
pub fn decode(version: VersionByte, s: &str) -> Result<[u8; 32], StrKeyError> {
    let got = s.chars().count();
    if got != STRKEY_LEN {
        return Err(StrKeyError::InvalidLength {
            expected: STRKEY_LEN,
            got,
        });
    }

    let found = s.chars().next().unwrap_or_default();
    if found != version.prefix() {
        return Err(StrKeyError::WrongPrefix {
            expected: version.prefix(),
            found,
        });
    }

    let payload = decode_base32_payload(s)?;
    if payload[0] != version as u8 {
        return Err(StrKeyError::WrongVersion {
            expected: version as u8,
            got: payload[0],
        });
    }

    let expected_crc = crc16_xmodem(&payload[..33]);
    let actual_crc = u16::from_le_bytes([payload[33], payload[34]]);
    if expected_crc != actual_crc {
        return Err(StrKeyError::BadChecksum);
    }

    let mut key = [0u8; 32];
    key.copy_from_slice(&payload[1..33]);
    Ok(key)
}

// ============================================================================
// ACCOUNT ID
// ============================================================================

/// Public identifier of a ledger account (`G…`)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId([u8; 32]);

impl AccountId {
    /// Account id for a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Self(*public_key.as_bytes())
    }

    /// Account id from raw key bytes as carried on the wire
    pub(crate) fn from_raw(key: [u8; 32]) -> Self {
        Self(key)
    }

    /// Parse a `G…` StrKey
    pub fn parse(s: &str) -> Result<Self, StrKeyError> {
        decode(VersionByte::AccountId, s).map(Self)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The ed25519 key behind this account
    pub fn public_key(&self) -> Result<PublicKey, KeyError> {
        PublicKey::from_bytes(&self.0)
    }

    /// Last four key bytes, used to tag decorated signatures
    pub fn signature_hint(&self) -> [u8; 4] {
        let mut hint = [0u8; 4];
        hint.copy_from_slice(&self.0[28..]);
        hint
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(VersionByte::AccountId, &self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self)
    }
}

impl FromStr for AccountId {
    type Err = StrKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// SECRET SEED
// ============================================================================

/// Private signing credential (`S…`)
#[derive(Clone)]
pub struct SecretSeed {
    keypair: Keypair,
}

impl SecretSeed {
    /// Parse an `S…` StrKey. Format is fully validated before the key is derived.
    pub fn parse(s: &str) -> Result<Self, StrKeyError> {
        let seed = decode(VersionByte::Seed, s)?;
        let keypair = Keypair::from_seed(&seed)?;
        Ok(Self { keypair })
    }

    /// Generate a fresh random credential
    pub fn generate() -> Self {
        Self {
            keypair: Keypair::generate(),
        }
    }

    /// Wrap an existing keypair
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// The account this credential controls
    pub fn account_id(&self) -> AccountId {
        AccountId::from_public_key(&self.keypair.public_key())
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Render the credential as an `S…` string
    pub fn expose(&self) -> String {
        encode(VersionByte::Seed, &self.keypair.seed_bytes())
    }
}

impl fmt::Debug for SecretSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretSeed(<redacted> for {})", self.account_id())
    }
}
