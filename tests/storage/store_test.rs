// Store Tests
// Tests for the sled-backed beneficiary and activation store

use educhain::identity::SecretSeed;
use educhain::ledger::Amount;
use educhain::storage::{
    Achievement, ActivationState, BeneficiaryRecord, PublicIdUpdate, RewardStore, StoreError,
};
use educhain::{Categorized, ErrorCategory};
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// STORE CREATION AND BASIC OPERATIONS
// ============================================================================

#[test]
fn test_store_open_new() {
    let temp_dir = TempDir::new().unwrap();
    let store = RewardStore::open(temp_dir.path()).unwrap();

    assert!(store.is_empty().unwrap());
}

#[test]
fn test_store_reopen_keeps_data() {
    let temp_dir = TempDir::new().unwrap();
    let account = SecretSeed::generate().account_id();

    {
        let store = RewardStore::open(temp_dir.path()).unwrap();
        store
            .put_beneficiary(&BeneficiaryRecord::new("S001", "Alicia").with_public_id(account))
            .unwrap();
        store.mark_active(&account).unwrap();
        store.flush().unwrap();
    }

    {
        let store = RewardStore::open(temp_dir.path()).unwrap();
        let record = store.get_beneficiary("S001").unwrap().unwrap();
        assert_eq!(record.public_id, Some(account));
        assert_eq!(store.activation_state(&account).unwrap(), ActivationState::Active);
    }
}

#[test]
fn test_stats_count_keys() {
    let store = RewardStore::temporary().unwrap();
    store.put_beneficiary(&BeneficiaryRecord::new("S001", "A")).unwrap();
    store.put_beneficiary(&BeneficiaryRecord::new("S002", "B")).unwrap();

    assert_eq!(store.stats().unwrap().key_count, 2);
}

// ============================================================================
// BENEFICIARIES
// ============================================================================

#[test]
fn test_list_and_find() {
    let store = RewardStore::temporary().unwrap();
    let account = SecretSeed::generate().account_id();
    store.put_beneficiary(&BeneficiaryRecord::new("S002", "Bo")).unwrap();
    store
        .put_beneficiary(&BeneficiaryRecord::new("S001", "Alicia").with_public_id(account))
        .unwrap();

    let ids: Vec<String> = store
        .list_beneficiaries()
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["S001", "S002"]);

    let found = store.find_by_account(&account).unwrap().unwrap();
    assert_eq!(found.id, "S001");
    assert!(store
        .find_by_account(&SecretSeed::generate().account_id())
        .unwrap()
        .is_none());
}

#[test]
fn test_get_missing_beneficiary() {
    let store = RewardStore::temporary().unwrap();
    assert!(store.get_beneficiary("nobody").unwrap().is_none());
}

// ============================================================================
// PUBLIC ID RECONCILIATION
// ============================================================================

#[test]
fn test_reconcile_replaces_stale_id() {
    let store = RewardStore::temporary().unwrap();
    let stale = SecretSeed::generate().account_id();
    let derived = SecretSeed::generate().account_id();
    store
        .put_beneficiary(&BeneficiaryRecord::new("S001", "Alicia").with_public_id(stale))
        .unwrap();

    let update = store.reconcile_public_id("S001", derived).unwrap();
    assert_eq!(update, PublicIdUpdate::Replaced { previous: Some(stale) });
    assert_eq!(
        store.get_beneficiary("S001").unwrap().unwrap().public_id,
        Some(derived)
    );

    let again = store.reconcile_public_id("S001", derived).unwrap();
    assert_eq!(again, PublicIdUpdate::Unchanged);
}

#[test]
fn test_reconcile_creates_missing_record() {
    let store = RewardStore::temporary().unwrap();
    let derived = SecretSeed::generate().account_id();

    let update = store.reconcile_public_id("S009", derived).unwrap();
    assert_eq!(update, PublicIdUpdate::Replaced { previous: None });

    let record = store.get_beneficiary("S009").unwrap().unwrap();
    assert_eq!(record.public_id, Some(derived));
}

// ============================================================================
// ACHIEVEMENTS
// ============================================================================

#[test]
fn test_append_achievement() {
    let store = RewardStore::temporary().unwrap();
    store.put_beneficiary(&BeneficiaryRecord::new("S001", "Alicia")).unwrap();

    store
        .append_achievement(
            "S001",
            Achievement::payment("Essay", "TX1", "abcd", Amount::from_units(10)),
        )
        .unwrap();
    store
        .append_achievement(
            "S001",
            Achievement::merit("Top Contributor", "Every task done", "NFT1"),
        )
        .unwrap();

    let record = store.get_beneficiary("S001").unwrap().unwrap();
    assert_eq!(record.achievements.len(), 2);
    assert_eq!(record.achievements[0].amount, Some(Amount::from_units(10)));
    assert_eq!(record.achievements[1].name, "Merit: Top Contributor");
    assert_eq!(record.merit_count(), 1);
}

#[test]
fn test_append_to_unknown_beneficiary() {
    let store = RewardStore::temporary().unwrap();

    let err = store
        .append_achievement("ghost", Achievement::merit("X", "Y", "NFT1"))
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownBeneficiary(_)));
    assert_eq!(err.category(), ErrorCategory::NotFound);
    assert!(store.get_beneficiary("ghost").unwrap().is_none());
}

#[test]
fn test_concurrent_appends_are_not_lost() {
    let store = Arc::new(RewardStore::temporary().unwrap());
    store.put_beneficiary(&BeneficiaryRecord::new("S001", "Alicia")).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            std::thread::spawn(move || {
                store
                    .append_achievement(
                        "S001",
                        Achievement::merit("Helper", "Helped", &format!("NFT{i}")),
                    )
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let record = store.get_beneficiary("S001").unwrap().unwrap();
    assert_eq!(record.achievements.len(), 8);
}

// ============================================================================
// ACTIVATION STATE
// ============================================================================

#[test]
fn test_activation_defaults_to_pending() {
    let store = RewardStore::temporary().unwrap();
    let account = SecretSeed::generate().account_id();

    assert_eq!(store.activation_state(&account).unwrap(), ActivationState::Pending);
    store.mark_active(&account).unwrap();
    assert_eq!(store.activation_state(&account).unwrap(), ActivationState::Active);
    assert_eq!(ActivationState::Active.to_string(), "ACTIVE");
}
