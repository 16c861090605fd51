// XDR (RFC 4506) for the ledger's transaction types
//
// Big-endian, 4-byte aligned. Covers what this crate builds: v1 envelopes
// with ed25519 accounts, text memos, time-bound preconditions, payment and
// change-trust operations. Anything else decodes as `Unsupported`.

use crate::identity::{AccountId, Signature};
use crate::ledger::{
    Amount, Asset, DecoratedSignature, Operation, TimeBounds, Transaction,
    TransactionEnvelope, MAX_MEMO_BYTES, MAX_OPERATIONS,
};
use thiserror::Error;

/// Signatures a v1 envelope can carry
pub const MAX_SIGNATURES: usize = 20;

pub(crate) const ENVELOPE_TYPE_TX: i32 = 2;

const KEY_TYPE_ED25519: i32 = 0;
const PRECOND_NONE: i32 = 0;
const PRECOND_TIME: i32 = 1;
const MEMO_NONE: i32 = 0;
const MEMO_TEXT: i32 = 1;
const OP_PAYMENT: i32 = 1;
const OP_CHANGE_TRUST: i32 = 6;
const ASSET_NATIVE: i32 = 0;
const ASSET_ALPHANUM4: i32 = 1;
const ASSET_ALPHANUM12: i32 = 2;
const SIGNATURE_MAX_BYTES: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XdrError {
    #[error("Unexpected end of input at byte {0}")]
    UnexpectedEof(usize),

    #[error("Unsupported {what}: discriminant {value}")]
    Unsupported { what: &'static str, value: i32 },

    #[error("{what} length {len} exceeds {max}")]
    TooLong {
        what: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Invalid {0}")]
    Invalid(&'static str),

    #[error("{0} trailing bytes after envelope")]
    TrailingBytes(usize),
}

// ============================================================================
// PRIMITIVES
// ============================================================================

fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

#[derive(Default)]
pub(crate) struct XdrWriter {
    buf: Vec<u8>,
}

impl XdrWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn bool(&mut self, value: bool) {
        self.u32(value as u32);
    }

    /// Fixed-length opaque
    fn fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.buf.resize(self.buf.len() + padding(bytes.len()), 0);
    }

    /// Variable-length opaque or string
    fn var(&mut self, bytes: &[u8]) {
        self.u32(bytes.len() as u32);
        self.fixed(bytes);
    }
}

pub(crate) struct XdrReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> XdrReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Fails unless every byte was consumed
    pub(crate) fn finish(self) -> Result<(), XdrError> {
        match self.bytes.len() - self.pos {
            0 => Ok(()),
            rest => Err(XdrError::TrailingBytes(rest)),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], XdrError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(XdrError::UnexpectedEof(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], XdrError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, XdrError> {
        self.array().map(u32::from_be_bytes)
    }

    fn i32(&mut self) -> Result<i32, XdrError> {
        self.array().map(i32::from_be_bytes)
    }

    fn u64(&mut self) -> Result<u64, XdrError> {
        self.array().map(u64::from_be_bytes)
    }

    fn i64(&mut self) -> Result<i64, XdrError> {
        self.array().map(i64::from_be_bytes)
    }

    fn bool(&mut self) -> Result<bool, XdrError> {
        match self.u32()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(XdrError::Invalid("boolean")),
        }
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N], XdrError> {
        let out = self.array::<N>()?;
        self.take(padding(N))?;
        Ok(out)
    }

    fn var(&mut self, what: &'static str, max: usize) -> Result<&'a [u8], XdrError> {
        let len = self.u32()? as usize;
        if len > max {
            return Err(XdrError::TooLong { what, len, max });
        }
        let bytes = self.take(len)?;
        self.take(padding(len))?;
        Ok(bytes)
    }

    fn count(&mut self, what: &'static str, max: usize) -> Result<usize, XdrError> {
        let len = self.u32()? as usize;
        if len > max {
            return Err(XdrError::TooLong { what, len, max });
        }
        Ok(len)
    }
}

// ============================================================================
// LEDGER TYPES
// ============================================================================

pub(crate) trait WriteXdr {
    fn write_xdr(&self, w: &mut XdrWriter);

    fn to_xdr(&self) -> Vec<u8> {
        let mut w = XdrWriter::new();
        self.write_xdr(&mut w);
        w.into_bytes()
    }
}

pub(crate) trait ReadXdr: Sized {
    fn read_xdr(r: &mut XdrReader<'_>) -> Result<Self, XdrError>;
}

// AccountID and MuxedAccount share this shape for ed25519 keys
impl WriteXdr for AccountId {
    fn write_xdr(&self, w: &mut XdrWriter) {
        w.i32(KEY_TYPE_ED25519);
        w.fixed(self.as_bytes());
    }
}

impl ReadXdr for AccountId {
    fn read_xdr(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        match r.i32()? {
            KEY_TYPE_ED25519 => Ok(AccountId::from_raw(r.fixed::<32>()?)),
            value => Err(XdrError::Unsupported {
                what: "account key type",
                value,
            }),
        }
    }
}

impl WriteXdr for Asset {
    fn write_xdr(&self, w: &mut XdrWriter) {
        match self {
            Asset::Native => w.i32(ASSET_NATIVE),
            Asset::Credit { code, issuer } if code.len() <= 4 => {
                let mut padded = [0u8; 4];
                padded[..code.len()].copy_from_slice(code.as_bytes());
                w.i32(ASSET_ALPHANUM4);
                w.fixed(&padded);
                issuer.write_xdr(w);
            }
            Asset::Credit { code, issuer } => {
                let mut padded = [0u8; 12];
                let len = code.len().min(12);
                padded[..len].copy_from_slice(&code.as_bytes()[..len]);
                w.i32(ASSET_ALPHANUM12);
                w.fixed(&padded);
                issuer.write_xdr(w);
            }
        }
    }
}

fn asset_code(padded: &[u8], min_len: usize) -> Result<String, XdrError> {
    let len = padded.iter().position(|b| *b == 0).unwrap_or(padded.len());
    let (code, rest) = padded.split_at(len);
    let valid = len >= min_len
        && rest.iter().all(|b| *b == 0)
        && code.iter().all(u8::is_ascii_alphanumeric);
    if !valid {
        return Err(XdrError::Invalid("asset code"));
    }
    Ok(String::from_utf8_lossy(code).into_owned())
}

impl ReadXdr for Asset {
    fn read_xdr(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        match r.i32()? {
            ASSET_NATIVE => Ok(Asset::Native),
            ASSET_ALPHANUM4 => {
                let code = asset_code(&r.fixed::<4>()?, 1)?;
                Ok(Asset::Credit {
                    code,
                    issuer: AccountId::read_xdr(r)?,
                })
            }
            ASSET_ALPHANUM12 => {
                let code = asset_code(&r.fixed::<12>()?, 5)?;
                Ok(Asset::Credit {
                    code,
                    issuer: AccountId::read_xdr(r)?,
                })
            }
            value => Err(XdrError::Unsupported {
                what: "asset type",
                value,
            }),
        }
    }
}

impl WriteXdr for Operation {
    fn write_xdr(&self, w: &mut XdrWriter) {
        // no per-operation source account
        w.bool(false);
        match self {
            Operation::Payment {
                destination,
                asset,
                amount,
            } => {
                w.i32(OP_PAYMENT);
                destination.write_xdr(w);
                asset.write_xdr(w);
                w.i64(amount.stroops());
            }
            Operation::ChangeTrust { asset, limit } => {
                w.i32(OP_CHANGE_TRUST);
                asset.write_xdr(w);
                w.i64(limit.stroops());
            }
        }
    }
}

impl ReadXdr for Operation {
    fn read_xdr(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        if r.bool()? {
            return Err(XdrError::Unsupported {
                what: "operation source account",
                value: 1,
            });
        }
        match r.i32()? {
            OP_PAYMENT => Ok(Operation::Payment {
                destination: AccountId::read_xdr(r)?,
                asset: Asset::read_xdr(r)?,
                amount: Amount::from_stroops(r.i64()?),
            }),
            OP_CHANGE_TRUST => Ok(Operation::ChangeTrust {
                asset: Asset::read_xdr(r)?,
                limit: Amount::from_stroops(r.i64()?),
            }),
            value => Err(XdrError::Unsupported {
                what: "operation type",
                value,
            }),
        }
    }
}

impl WriteXdr for Transaction {
    fn write_xdr(&self, w: &mut XdrWriter) {
        self.source().write_xdr(w);
        w.u32(self.fee());
        w.i64(self.sequence());

        match self.time_bounds() {
            None => w.i32(PRECOND_NONE),
            Some(bounds) => {
                w.i32(PRECOND_TIME);
                w.u64(bounds.min_time);
                w.u64(bounds.max_time);
            }
        }

        match self.memo() {
            None => w.i32(MEMO_NONE),
            Some(text) => {
                w.i32(MEMO_TEXT);
                w.var(text.as_bytes());
            }
        }

        w.u32(self.operations().len() as u32);
        for op in self.operations() {
            op.write_xdr(w);
        }

        // ext v0
        w.i32(0);
    }
}

impl ReadXdr for Transaction {
    fn read_xdr(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        let source = AccountId::read_xdr(r)?;
        let fee = r.u32()?;
        let sequence = r.i64()?;

        let time_bounds = match r.i32()? {
            PRECOND_NONE => None,
            PRECOND_TIME => Some(TimeBounds {
                min_time: r.u64()?,
                max_time: r.u64()?,
            }),
            value => {
                return Err(XdrError::Unsupported {
                    what: "precondition type",
                    value,
                })
            }
        };

        let memo = match r.i32()? {
            MEMO_NONE => None,
            MEMO_TEXT => {
                let bytes = r.var("memo text", MAX_MEMO_BYTES)?;
                let text =
                    std::str::from_utf8(bytes).map_err(|_| XdrError::Invalid("memo text"))?;
                Some(text.to_string())
            }
            value => {
                return Err(XdrError::Unsupported {
                    what: "memo type",
                    value,
                })
            }
        };

        let count = r.count("operations", MAX_OPERATIONS)?;
        let mut operations = Vec::with_capacity(count);
        for _ in 0..count {
            operations.push(Operation::read_xdr(r)?);
        }

        match r.i32()? {
            0 => {}
            value => {
                return Err(XdrError::Unsupported {
                    what: "transaction extension",
                    value,
                })
            }
        }

        Ok(Transaction::new(
            source,
            fee,
            sequence,
            time_bounds,
            memo,
            operations,
        ))
    }
}

impl WriteXdr for DecoratedSignature {
    fn write_xdr(&self, w: &mut XdrWriter) {
        w.fixed(self.hint());
        w.var(&self.signature().to_bytes());
    }
}

impl ReadXdr for DecoratedSignature {
    fn read_xdr(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        let hint = r.fixed::<4>()?;
        let bytes = r.var("signature", SIGNATURE_MAX_BYTES)?;
        let signature = Signature::from_bytes(bytes).map_err(|_| XdrError::Invalid("signature"))?;
        Ok(DecoratedSignature::new(hint, signature))
    }
}

impl WriteXdr for TransactionEnvelope {
    fn write_xdr(&self, w: &mut XdrWriter) {
        w.i32(ENVELOPE_TYPE_TX);
        self.tx().write_xdr(w);
        w.u32(self.signatures().len() as u32);
        for signature in self.signatures() {
            signature.write_xdr(w);
        }
    }
}

impl ReadXdr for TransactionEnvelope {
    fn read_xdr(r: &mut XdrReader<'_>) -> Result<Self, XdrError> {
        match r.i32()? {
            ENVELOPE_TYPE_TX => {}
            value => {
                return Err(XdrError::Unsupported {
                    what: "envelope type",
                    value,
                })
            }
        }
        let tx = Transaction::read_xdr(r)?;
        let count = r.count("signatures", MAX_SIGNATURES)?;
        let mut signatures = Vec::with_capacity(count);
        for _ in 0..count {
            signatures.push(DecoratedSignature::read_xdr(r)?);
        }
        Ok(TransactionEnvelope::from_parts(tx, signatures))
    }
}
