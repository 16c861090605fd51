// Identity module - ed25519 keys, StrKey account ids and signing credentials

mod account;
mod keypair;
mod signer;
mod strkey;

pub use account::*;
pub use keypair::*;
pub use signer::*;
pub use strkey::{decode as decode_strkey, encode as encode_strkey};
pub use strkey::{AccountId, SecretSeed, StrKeyError, VersionByte, STRKEY_LEN};
