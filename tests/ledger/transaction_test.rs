// Transaction Builder and Codec Tests

use base64::{engine::general_purpose::STANDARD, Engine};
use educhain::identity::SecretSeed;
use educhain::ledger::{
    Amount, Asset, CodecError, EnvelopeCodec, Network, Operation, SignedPayload,
    TransactionBuilder, TransactionEnvelope, TxBuildError, BASE_FEE,
};
use sha2::{Digest, Sha256};

fn payment(amount: Amount) -> Operation {
    Operation::Payment {
        destination: SecretSeed::generate().account_id(),
        asset: Asset::Native,
        amount,
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Test: Sequence is the account's current sequence plus one
#[test]
fn test_sequence_and_fee() {
    let source = SecretSeed::generate().account_id();
    let tx = TransactionBuilder::new()
        .source(source, 41)
        .operation(payment(Amount::from_units(1)))
        .operation(payment(Amount::from_units(2)))
        .build()
        .unwrap();

    assert_eq!(tx.sequence(), 42);
    assert_eq!(tx.fee(), BASE_FEE * 2);
    assert_eq!(*tx.source(), source);
    assert_eq!(tx.operations().len(), 2);
}

/// Test: Time bounds end `timeout` seconds after `now`
#[test]
fn test_time_bounds() {
    let tx = TransactionBuilder::new()
        .source(SecretSeed::generate().account_id(), 0)
        .now(1_000)
        .timeout_secs(Some(30))
        .operation(payment(Amount::from_units(1)))
        .build()
        .unwrap();

    let bounds = tx.time_bounds().unwrap();
    assert_eq!(bounds.max_time, 1_030);
    assert!(bounds.contains(1_030));
    assert!(!bounds.contains(1_031));

    let unbounded = TransactionBuilder::new()
        .source(SecretSeed::generate().account_id(), 0)
        .timeout_secs(None)
        .operation(payment(Amount::from_units(1)))
        .build()
        .unwrap();
    assert!(unbounded.time_bounds().is_none());
}

/// Test: Invalid transactions are refused before signing
#[test]
fn test_build_errors() {
    let source = SecretSeed::generate().account_id();

    assert_eq!(
        TransactionBuilder::new()
            .operation(payment(Amount::from_units(1)))
            .build()
            .unwrap_err(),
        TxBuildError::MissingSource
    );
    assert_eq!(
        TransactionBuilder::new().source(source, 0).build().unwrap_err(),
        TxBuildError::NoOperations
    );
    assert_eq!(
        TransactionBuilder::new()
            .source(source, 0)
            .memo("this memo is far too long to fit")
            .operation(payment(Amount::from_units(1)))
            .build()
            .unwrap_err(),
        TxBuildError::MemoTooLong(32)
    );
    assert!(matches!(
        TransactionBuilder::new()
            .source(source, 0)
            .operation(payment(Amount::ZERO))
            .build(),
        Err(TxBuildError::InvalidOperation { index: 0, .. })
    ));
    assert_eq!(
        TransactionBuilder::new()
            .source(source, i64::MAX)
            .operation(payment(Amount::from_units(1)))
            .build()
            .unwrap_err(),
        TxBuildError::SequenceOverflow
    );
}

/// Test: Trusting the native asset is not a valid operation
#[test]
fn test_native_trust_rejected() {
    let result = TransactionBuilder::new()
        .source(SecretSeed::generate().account_id(), 0)
        .operation(Operation::ChangeTrust {
            asset: Asset::Native,
            limit: Amount::MAX,
        })
        .build();

    assert!(matches!(result, Err(TxBuildError::InvalidOperation { .. })));
}

// ============================================================================
// SIGNING AND CODEC
// ============================================================================

/// Test: Signatures are bound to the network
#[test]
fn test_signature_network_bound() {
    let seed = SecretSeed::generate();
    let tx = TransactionBuilder::new()
        .source(seed.account_id(), 0)
        .operation(payment(Amount::from_units(1)))
        .build()
        .unwrap();

    let mut envelope = TransactionEnvelope::new(tx);
    envelope.sign(seed.keypair(), &Network::testnet());

    assert!(envelope.is_signed_by(&seed.account_id(), &Network::testnet()));
    assert!(!envelope.is_signed_by(&seed.account_id(), &Network::new("Other Network")));
    assert!(!envelope.is_signed_by(&SecretSeed::generate().account_id(), &Network::testnet()));
}

/// Test: Encoded payload decodes to the same envelope
#[test]
fn test_codec_preserves_envelope() {
    let seed = SecretSeed::generate();
    let tx = TransactionBuilder::new()
        .source(seed.account_id(), 7)
        .memo("S001")
        .operation(payment(Amount::from_units(10)))
        .build()
        .unwrap();
    let mut envelope = TransactionEnvelope::new(tx);
    envelope.sign(seed.keypair(), &Network::testnet());

    let payload = EnvelopeCodec::encode(&envelope).unwrap();
    let decoded = EnvelopeCodec::decode(&payload).unwrap();

    assert_eq!(decoded, envelope);
    assert_eq!(decoded.tx().memo(), Some("S001"));
    assert!(decoded.is_signed_by(&seed.account_id(), &Network::testnet()));
}

/// Test: Garbage payloads fail to decode
#[test]
fn test_codec_rejects_garbage() {
    assert!(matches!(
        EnvelopeCodec::decode(&SignedPayload::new("not base64!")),
        Err(CodecError::InvalidBase64(_))
    ));
    assert!(matches!(
        EnvelopeCodec::decode(&SignedPayload::new("AAAA")),
        Err(CodecError::DecodeError(_))
    ));
}

/// Test: Testnet id is the sha256 of its passphrase
#[test]
fn test_testnet_network_id() {
    assert_eq!(
        hex::encode(Network::testnet().id()),
        "cee0302d59844d32bdca915c8203dd44b33fbb7edc19051ea37abedf28ecd472"
    );
}

/// Test: Payload bytes are a v1 XDR envelope, field by field
#[test]
fn test_payload_is_xdr_envelope() {
    let issuer = SecretSeed::generate();
    let issuer_id = issuer.account_id();
    let destination = SecretSeed::generate().account_id();
    let tx = TransactionBuilder::new()
        .source(issuer_id, 41)
        .now(1_700_000_000)
        .memo("S001")
        .operation(Operation::Payment {
            destination,
            asset: Asset::Credit {
                code: "TASK".to_string(),
                issuer: issuer_id,
            },
            amount: Amount::from_units(10),
        })
        .build()
        .unwrap();
    let mut envelope = TransactionEnvelope::new(tx);
    envelope.sign(issuer.keypair(), &Network::testnet());

    let payload = EnvelopeCodec::encode(&envelope).unwrap();
    let bytes = STANDARD.decode(payload.as_str()).unwrap();

    // envelope type TX, then the source as an ed25519 muxed account
    assert_eq!(&bytes[0..8], &[0, 0, 0, 2, 0, 0, 0, 0]);
    assert_eq!(&bytes[8..40], issuer_id.as_bytes());
    assert_eq!(&bytes[40..44], &BASE_FEE.to_be_bytes());
    assert_eq!(&bytes[44..52], &42i64.to_be_bytes());
    // time-bound precondition
    assert_eq!(&bytes[52..56], &[0, 0, 0, 1]);
    assert_eq!(&bytes[56..64], &0u64.to_be_bytes());
    assert_eq!(&bytes[64..72], &1_700_000_030u64.to_be_bytes());
    // text memo
    assert_eq!(&bytes[72..84], &[0, 0, 0, 1, 0, 0, 0, 4, b'S', b'0', b'0', b'1']);
    // one payment, no operation source
    assert_eq!(&bytes[84..96], &[0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1]);
    assert_eq!(&bytes[96..100], &[0, 0, 0, 0]);
    assert_eq!(&bytes[100..132], destination.as_bytes());
    assert_eq!(&bytes[132..140], &[0, 0, 0, 1, b'T', b'A', b'S', b'K']);
    assert_eq!(&bytes[140..144], &[0, 0, 0, 0]);
    assert_eq!(&bytes[144..176], issuer_id.as_bytes());
    assert_eq!(&bytes[176..184], &100_000_000i64.to_be_bytes());
    // empty extension, then one decorated signature
    assert_eq!(&bytes[184..192], &[0, 0, 0, 0, 0, 0, 0, 1]);
    assert_eq!(&bytes[192..196], &issuer_id.as_bytes()[28..]);
    assert_eq!(&bytes[196..200], &[0, 0, 0, 64]);
    assert_eq!(bytes.len(), 264);

    // hash covers network id, envelope type and exactly the transaction bytes
    let mut hasher = Sha256::new();
    hasher.update(Network::testnet().id());
    hasher.update([0, 0, 0, 2]);
    hasher.update(&bytes[4..188]);
    let expected: [u8; 32] = hasher.finalize().into();
    assert_eq!(envelope.hash(&Network::testnet()).as_bytes(), &expected);
}

/// Test: Trailing bytes after an envelope are rejected
#[test]
fn test_codec_rejects_trailing_bytes() {
    let seed = SecretSeed::generate();
    let tx = TransactionBuilder::new()
        .source(seed.account_id(), 0)
        .operation(payment(Amount::from_units(1)))
        .build()
        .unwrap();
    let mut envelope = TransactionEnvelope::new(tx);
    envelope.sign(seed.keypair(), &Network::testnet());

    let mut bytes = EnvelopeCodec::encode_bytes(&envelope).unwrap();
    bytes.extend_from_slice(&[0, 0, 0, 0]);

    assert!(matches!(
        EnvelopeCodec::decode_bytes(&bytes),
        Err(CodecError::DecodeError(_))
    ));
}

/// Test: Debug output of a payload is truncated
#[test]
fn test_payload_debug_preview() {
    let payload = SignedPayload::new("A".repeat(200));
    let rendered = format!("{:?}", payload);

    assert!(rendered.len() < 60);
    assert!(rendered.contains("200 chars"));
}
