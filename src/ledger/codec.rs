// Envelope codec - XDR bytes, standard base64 text, as the network accepts them

use crate::error::{Categorized, ErrorCategory};
use crate::ledger::{
    ReadXdr, TransactionEnvelope, WriteXdr, XdrError, XdrReader, MAX_SIGNATURES,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to encode envelope: {0}")]
    EncodeError(String),

    #[error("Failed to decode envelope: {0}")]
    DecodeError(String),

    #[error("Invalid base64 string: {0}")]
    InvalidBase64(String),
}

impl Categorized for CodecError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::InvalidInput
    }
}

/// A serialized, signed transaction envelope ready for broadcast.
///
/// Opaque to everything except the ledger codec; it is moved between
/// builder, queue, and gateway without being re-encoded.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedPayload(String);

impl SignedPayload {
    /// Wrap a payload produced elsewhere (e.g. a remote signing backend)
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for SignedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.0.chars().take(16).collect();
        write!(f, "SignedPayload({}…, {} chars)", preview, self.0.len())
    }
}

impl fmt::Display for SignedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Codec for transaction envelopes
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Encode an envelope to XDR bytes
    pub fn encode_bytes(envelope: &TransactionEnvelope) -> Result<Vec<u8>, CodecError> {
        if envelope.signatures().len() > MAX_SIGNATURES {
            return Err(CodecError::EncodeError(format!(
                "{} signatures exceed the limit of {}",
                envelope.signatures().len(),
                MAX_SIGNATURES
            )));
        }
        Ok(envelope.to_xdr())
    }

    /// Decode an envelope from XDR bytes; trailing bytes are an error
    pub fn decode_bytes(bytes: &[u8]) -> Result<TransactionEnvelope, CodecError> {
        let decode_error = |e: XdrError| CodecError::DecodeError(e.to_string());
        let mut reader = XdrReader::new(bytes);
        let envelope = TransactionEnvelope::read_xdr(&mut reader).map_err(decode_error)?;
        reader.finish().map_err(decode_error)?;
        Ok(envelope)
    }

    /// Encode to a broadcastable payload
    pub fn encode(envelope: &TransactionEnvelope) -> Result<SignedPayload, CodecError> {
        Ok(SignedPayload(STANDARD.encode(Self::encode_bytes(envelope)?)))
    }

    /// Decode a payload back into its envelope
    pub fn decode(payload: &SignedPayload) -> Result<TransactionEnvelope, CodecError> {
        let bytes = STANDARD
            .decode(payload.as_str())
            .map_err(|e| CodecError::InvalidBase64(e.to_string()))?;
        Self::decode_bytes(&bytes)
    }
}
