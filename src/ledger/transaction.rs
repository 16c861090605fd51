// Transaction model - operations, transactions, signed envelopes

use crate::identity::{AccountId, Keypair, Signature, Signer};
use crate::ledger::{Amount, Asset, WriteXdr, ENVELOPE_TYPE_TX};
use sha2::{Digest, Sha256};
use std::fmt;

/// Fee charged per operation, in stroops of the native asset
pub const BASE_FEE: u32 = 100;

/// Upper bound on operations in one transaction
pub const MAX_OPERATIONS: usize = 100;

/// Upper bound on memo text, in bytes
pub const MAX_MEMO_BYTES: usize = 28;

/// Network the transaction is bound to; signatures over one network's
/// hash are invalid on any other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Network {
    passphrase: String,
}

impl Network {
    pub const TESTNET_PASSPHRASE: &'static str = "Test SDF Network ; September 2015";

    pub fn new(passphrase: &str) -> Self {
        Self {
            passphrase: passphrase.to_string(),
        }
    }

    pub fn testnet() -> Self {
        Self::new(Self::TESTNET_PASSPHRASE)
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// sha256 of the passphrase
    pub fn id(&self) -> [u8; 32] {
        Sha256::digest(self.passphrase.as_bytes()).into()
    }
}

/// Hash identifying a transaction on a network
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Validity window in unix seconds; 0 means unbounded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeBounds {
    pub min_time: u64,
    pub max_time: u64,
}

impl TimeBounds {
    pub fn contains(&self, now: u64) -> bool {
        now >= self.min_time && (self.max_time == 0 || now <= self.max_time)
    }
}

/// A single ledger operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Move `amount` of `asset` from the source to `destination`
    Payment {
        destination: AccountId,
        asset: Asset,
        amount: Amount,
    },
    /// Create, resize, or (with a zero limit) remove a trustline
    ChangeTrust { asset: Asset, limit: Amount },
}

/// An unsigned transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    source: AccountId,
    fee: u32,
    sequence: i64,
    time_bounds: Option<TimeBounds>,
    memo: Option<String>,
    operations: Vec<Operation>,
}

impl Transaction {
    pub(crate) fn new(
        source: AccountId,
        fee: u32,
        sequence: i64,
        time_bounds: Option<TimeBounds>,
        memo: Option<String>,
        operations: Vec<Operation>,
    ) -> Self {
        Self {
            source,
            fee,
            sequence,
            time_bounds,
            memo,
            operations,
        }
    }

    pub fn source(&self) -> &AccountId {
        &self.source
    }

    pub fn fee(&self) -> u32 {
        self.fee
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    pub fn time_bounds(&self) -> Option<&TimeBounds> {
        self.time_bounds.as_ref()
    }

    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// XDR encoding of the transaction body
    pub fn to_signing_bytes(&self) -> Vec<u8> {
        self.to_xdr()
    }

    /// Hash signed by every party: sha256 of the XDR signature payload
    /// (network id, envelope type, transaction)
    pub fn hash(&self, network: &Network) -> TxHash {
        let mut hasher = Sha256::new();
        hasher.update(network.id());
        hasher.update(ENVELOPE_TYPE_TX.to_be_bytes());
        hasher.update(self.to_signing_bytes());
        TxHash(hasher.finalize().into())
    }
}

/// Signature tagged with the last four bytes of the signer's key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoratedSignature {
    hint: [u8; 4],
    signature: Signature,
}

impl DecoratedSignature {
    pub(crate) fn new(hint: [u8; 4], signature: Signature) -> Self {
        Self { hint, signature }
    }

    pub fn hint(&self) -> &[u8; 4] {
        &self.hint
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

/// A transaction plus the signatures authorizing it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionEnvelope {
    tx: Transaction,
    signatures: Vec<DecoratedSignature>,
}

impl TransactionEnvelope {
    /// Wrap a transaction with no signatures yet
    pub fn new(tx: Transaction) -> Self {
        Self {
            tx,
            signatures: Vec::new(),
        }
    }

    pub(crate) fn from_parts(tx: Transaction, signatures: Vec<DecoratedSignature>) -> Self {
        Self { tx, signatures }
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn signatures(&self) -> &[DecoratedSignature] {
        &self.signatures
    }

    pub fn hash(&self, network: &Network) -> TxHash {
        self.tx.hash(network)
    }

    /// Add a signature by `keypair` over the network-bound hash
    pub fn sign(&mut self, keypair: &Keypair, network: &Network) {
        let hash = self.tx.hash(network);
        let signer = AccountId::from_public_key(&keypair.public_key());
        self.signatures.push(DecoratedSignature {
            hint: signer.signature_hint(),
            signature: Signer::sign(keypair, hash.as_bytes()),
        });
    }

    /// Whether any attached signature is a valid one by `account`
    pub fn is_signed_by(&self, account: &AccountId, network: &Network) -> bool {
        let public_key = match account.public_key() {
            Ok(pk) => pk,
            Err(_) => return false,
        };
        let hash = self.tx.hash(network);
        let hint = account.signature_hint();

        self.signatures
            .iter()
            .filter(|ds| ds.hint == hint)
            .any(|ds| Signer::verify(&public_key, hash.as_bytes(), &ds.signature))
    }
}
