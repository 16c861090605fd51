use educhain::identity::{Keypair, PublicKey};

/// Test: Can generate a new keypair
#[test]
fn test_generate_keypair() {
    let keypair = Keypair::generate();

    let _public = keypair.public_key();
    assert_eq!(keypair.seed_bytes().len(), 32);
}

/// Test: Each generated keypair should be unique
#[test]
fn test_keypairs_are_unique() {
    let keypair1 = Keypair::generate();
    let keypair2 = Keypair::generate();

    assert_ne!(
        keypair1.public_key().as_bytes(),
        keypair2.public_key().as_bytes(),
        "Two generated keypairs should have different public keys"
    );
}

/// Test: Same seed derives the same public key
#[test]
fn test_keypair_from_seed() {
    let original = Keypair::generate();
    let restored = Keypair::from_seed(&original.seed_bytes())
        .expect("Should derive keypair from seed");

    assert_eq!(
        original.public_key().as_bytes(),
        restored.public_key().as_bytes(),
        "Keypair from same seed should have same public key"
    );
}

/// Test: Seed of the wrong length is rejected
#[test]
fn test_invalid_seed_length_fails() {
    let result = Keypair::from_seed(&[7u8; 10]);
    assert!(result.is_err(), "Short seed should be rejected");
}

/// Test: Public key bytes roundtrip
#[test]
fn test_public_key_serialization() {
    let keypair = Keypair::generate();
    let public_key = keypair.public_key();

    let restored = PublicKey::from_bytes(public_key.as_bytes())
        .expect("Should deserialize public key from bytes");

    assert_eq!(public_key, restored);
}

/// Test: Invalid public key bytes should fail
#[test]
fn test_invalid_public_key_bytes_fails() {
    let invalid_bytes = [0u8; 16];

    let result = PublicKey::from_bytes(&invalid_bytes);
    assert!(result.is_err(), "Invalid public key bytes should fail");
}
