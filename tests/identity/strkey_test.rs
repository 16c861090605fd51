// StrKey Tests
// Account ids (G...) and credentials (S...)

use educhain::identity::{
    decode_strkey, encode_strkey, AccountId, Keypair, SecretSeed, StrKeyError, VersionByte,
    STRKEY_LEN,
};
use educhain::{Categorized, ErrorCategory};

// ============================================================================
// ENCODING
// ============================================================================

/// Test: Account ids are 56 chars starting with G
#[test]
fn test_account_id_shape() {
    let id = SecretSeed::generate().account_id();
    let rendered = id.to_string();

    assert_eq!(rendered.len(), STRKEY_LEN);
    assert!(rendered.starts_with('G'));
    assert_eq!(AccountId::parse(&rendered).unwrap(), id);
}

/// Test: Credentials are 56 chars starting with S and derive the same account
#[test]
fn test_seed_roundtrip() {
    let seed = SecretSeed::generate();
    let rendered = seed.expose();

    assert_eq!(rendered.len(), STRKEY_LEN);
    assert!(rendered.starts_with('S'));

    let parsed = SecretSeed::parse(&rendered).unwrap();
    assert_eq!(parsed.account_id(), seed.account_id());
}

/// Test: The all-zero key encodes to a well-known account id
#[test]
fn test_known_zero_account() {
    let encoded = encode_strkey(VersionByte::AccountId, &[0u8; 32]);
    assert_eq!(
        encoded,
        "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF"
    );
    assert_eq!(decode_strkey(VersionByte::AccountId, &encoded).unwrap(), [0u8; 32]);
}

/// Test: Keypair wrapped as a credential keeps its identity
#[test]
fn test_from_keypair() {
    let keypair = Keypair::generate();
    let expected = AccountId::from_public_key(&keypair.public_key());

    assert_eq!(SecretSeed::from_keypair(keypair).account_id(), expected);
}

// ============================================================================
// REJECTION
// ============================================================================

/// Test: Wrong length is rejected before anything else
#[test]
fn test_wrong_length() {
    let err = SecretSeed::parse("SABC").unwrap_err();
    assert_eq!(
        err,
        StrKeyError::InvalidLength {
            expected: STRKEY_LEN,
            got: 4
        }
    );
}

/// Test: An account id is not accepted as a credential
#[test]
fn test_wrong_prefix() {
    let account = SecretSeed::generate().account_id().to_string();
    let err = SecretSeed::parse(&account).unwrap_err();

    assert!(matches!(
        err,
        StrKeyError::WrongPrefix {
            expected: 'S',
            found: 'G'
        }
    ));
}

/// Test: Lowercase or non-alphabet characters are rejected
#[test]
fn test_invalid_character() {
    let mut seed = SecretSeed::generate().expose();
    seed.replace_range(10..11, "1");

    assert_eq!(
        SecretSeed::parse(&seed).unwrap_err(),
        StrKeyError::InvalidCharacter('1')
    );
}

/// Test: A single changed character breaks the checksum
#[test]
fn test_bad_checksum() {
    let seed = SecretSeed::generate().expose();
    let mut chars: Vec<char> = seed.chars().collect();
    chars[20] = if chars[20] == 'A' { 'B' } else { 'A' };
    let tampered: String = chars.into_iter().collect();

    assert_eq!(SecretSeed::parse(&tampered).unwrap_err(), StrKeyError::BadChecksum);
}

/// Test: Every format error is reported as an invalid credential
#[test]
fn test_error_category() {
    let err = AccountId::parse("not-a-key").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::InvalidCredentialFormat);
}

/// Test: Debug output never contains the credential
#[test]
fn test_seed_debug_redacted() {
    let seed = SecretSeed::generate();
    let rendered = format!("{:?}", seed);

    assert!(!rendered.contains(&seed.expose()));
    assert!(rendered.contains(&seed.account_id().to_string()));
}
