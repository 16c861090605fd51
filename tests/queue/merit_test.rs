// Merit Grant Queue Tests
// Two distinct signatures before a grant is final

use async_trait::async_trait;
use educhain::identity::{AccountId, SecretSeed};
use educhain::queue::{
    Decision, GrantError, GrantEvent, GrantId, GrantOutcome, GrantStatus, GrantedMerit,
    MeritGrantQueue, MeritMinter, MintError, MintStatus, REQUIRED_SIGNATURES,
};
use educhain::storage::{BeneficiaryRecord, RewardStore};
use educhain::{Categorized, Config, ConfigError, ErrorCategory};
use std::sync::{Arc, Mutex};

struct Setup {
    issuer: AccountId,
    validator: AccountId,
    store: Arc<RewardStore>,
    queue: Arc<MeritGrantQueue>,
}

fn setup() -> Setup {
    let issuer = SecretSeed::generate().account_id();
    let validator = SecretSeed::generate().account_id();
    let store = Arc::new(RewardStore::temporary().unwrap());
    store
        .put_beneficiary(&BeneficiaryRecord::new("S001", "Alicia"))
        .unwrap();
    let queue = Arc::new(MeritGrantQueue::new(issuer, validator, store.clone()));

    Setup {
        issuer,
        validator,
        store,
        queue,
    }
}

/// Records every grant it is asked to mint
#[derive(Default)]
struct RecordingMinter {
    minted: Mutex<Vec<GrantId>>,
    fail: bool,
}

#[async_trait]
impl MeritMinter for RecordingMinter {
    async fn mint(&self, merit: &GrantedMerit) -> Result<String, MintError> {
        if self.fail {
            return Err(MintError("collection not deployed".to_string()));
        }
        self.minted.lock().unwrap().push(merit.id().clone());
        Ok(format!("token-{}", merit.id()))
    }
}

// ============================================================================
// INITIATE
// ============================================================================

/// Test: New grant has the issuer as its only signer
#[test]
fn test_initiate() {
    let s = setup();

    let id = s
        .queue
        .initiate("S001", "Top Contributor", "Finished every task")
        .unwrap();

    assert!(id.as_str().starts_with("NFT"));
    let grant = s.queue.get(&id).unwrap();
    assert_eq!(grant.status(), GrantStatus::PendingMultiSig);
    assert_eq!(grant.signers(), &[s.issuer]);
    assert_eq!(grant.required_signatures(), REQUIRED_SIGNATURES);
    assert_eq!(grant.issuer, s.issuer);
    assert_eq!(
        s.queue.poll_events(),
        vec![GrantEvent::Initiated {
            id,
            beneficiary: "S001".to_string()
        }]
    );
}

/// Test: Beneficiary and achievement type are required
#[test]
fn test_initiate_validation() {
    let s = setup();

    assert!(matches!(
        s.queue.initiate(" ", "Top Contributor", ""),
        Err(GrantError::InvalidGrant(_))
    ));
    assert!(matches!(
        s.queue.initiate("S001", "", ""),
        Err(GrantError::InvalidGrant(_))
    ));
    assert!(s.queue.pending().is_empty());
}

/// Test: A grant needs a stored beneficiary record to land on
#[test]
fn test_initiate_unknown_beneficiary() {
    let s = setup();

    let err = s
        .queue
        .initiate("S404", "Top Contributor", "Finished every task")
        .unwrap_err();

    assert!(matches!(err, GrantError::UnknownBeneficiary(ref id) if id == "S404"));
    assert_eq!(err.category(), ErrorCategory::NotFound);
    assert!(s.queue.pending().is_empty());
    assert!(s.queue.poll_events().is_empty());
}

/// Test: Queue built from configuration authorizes the configured validator only
#[tokio::test]
async fn test_from_config() {
    let issuer = SecretSeed::generate();
    let validator = SecretSeed::generate().account_id();
    let store = Arc::new(RewardStore::temporary().unwrap());
    store
        .put_beneficiary(&BeneficiaryRecord::new("S001", "Alicia"))
        .unwrap();

    let unconfigured = Config::new().with_issuer_secret(issuer.clone());
    assert!(matches!(
        MeritGrantQueue::from_config(&unconfigured, store.clone()),
        Err(ConfigError::Missing(_))
    ));

    let config = unconfigured.with_validator_public(validator);
    let queue = MeritGrantQueue::from_config(&config, store).unwrap();
    assert_eq!(*queue.issuer(), issuer.account_id());
    assert!(queue.is_validator(&validator));
    assert!(!queue.is_validator(&issuer.account_id()));

    let id = queue.initiate("S001", "Helper", "").unwrap();
    let outcome = queue.decide(&id, Decision::Approve, &validator).await.unwrap();
    assert_eq!(outcome.status(), GrantStatus::Granted);
}

// ============================================================================
// SIGNING
// ============================================================================

/// Test: Validator signature completes the grant and records the achievement
#[tokio::test]
async fn test_validator_grants() {
    let s = setup();
    let id = s.queue.initiate("S001", "Top Contributor", "Every task").unwrap();

    let outcome = s
        .queue
        .decide(&id, Decision::Approve, &s.validator)
        .await
        .unwrap();

    assert_eq!(outcome.status(), GrantStatus::Granted);
    match outcome {
        GrantOutcome::Granted {
            merit,
            achievement_recorded,
            mint,
        } => {
            assert_eq!(merit.signers(), &[s.issuer, s.validator]);
            assert_eq!(merit.beneficiary(), "S001");
            assert_eq!(merit.achievement_type(), "Top Contributor");
            assert!(achievement_recorded);
            assert_eq!(mint, MintStatus::NotConfigured);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert!(s.queue.get(&id).is_none());
    let record = s.store.get_beneficiary("S001").unwrap().unwrap();
    assert_eq!(record.merit_count(), 1);
    assert_eq!(record.achievements[0].name, "Merit: Top Contributor");
    assert_eq!(record.achievements[0].reference, id.as_str());

    let audit = s.queue.audit_log();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].status, GrantStatus::Granted);
    assert_eq!(audit[0].decided_by, s.validator);
}

/// Test: The issuer signing again does not count as the second signature
#[tokio::test]
async fn test_duplicate_signer_rejected() {
    let s = setup();
    let id = s.queue.initiate("S001", "Helper", "Helped others").unwrap();

    let err = s
        .queue
        .decide(&id, Decision::Approve, &s.issuer)
        .await
        .unwrap_err();

    assert!(matches!(err, GrantError::DuplicateSigner { signer, .. } if signer == s.issuer));
    assert_eq!(err.category(), ErrorCategory::InvalidInput);

    let grant = s.queue.get(&id).unwrap();
    assert_eq!(grant.signers().len(), 1);
    assert_eq!(grant.status(), GrantStatus::PendingMultiSig);
    assert_eq!(s.store.get_beneficiary("S001").unwrap().unwrap().merit_count(), 0);

    // the grant can still be completed by a distinct signer
    let outcome = s
        .queue
        .decide(&id, Decision::Approve, &s.validator)
        .await
        .unwrap();
    assert_eq!(outcome.status(), GrantStatus::Granted);
}

/// Test: An account outside the validator set cannot supply the second signature
#[tokio::test]
async fn test_stranger_cannot_approve() {
    let s = setup();
    let id = s.queue.initiate("S001", "Helper", "Helped others").unwrap();
    s.queue.poll_events();
    let stranger = SecretSeed::generate().account_id();

    let err = s
        .queue
        .decide(&id, Decision::Approve, &stranger)
        .await
        .unwrap_err();

    assert!(matches!(err, GrantError::UnauthorizedSigner { signer, .. } if signer == stranger));
    assert_eq!(err.category(), ErrorCategory::CredentialMismatch);

    let grant = s.queue.get(&id).unwrap();
    assert_eq!(grant.status(), GrantStatus::PendingMultiSig);
    assert_eq!(grant.signers(), &[s.issuer]);
    assert!(s.queue.poll_events().is_empty());
    assert!(s.queue.audit_log().is_empty());
    assert_eq!(s.store.get_beneficiary("S001").unwrap().unwrap().merit_count(), 0);

    let outcome = s
        .queue
        .decide(&id, Decision::Approve, &s.validator)
        .await
        .unwrap();
    assert_eq!(outcome.status(), GrantStatus::Granted);
}

/// Test: An account outside the validator set cannot reject either
#[tokio::test]
async fn test_stranger_cannot_reject() {
    let s = setup();
    let id = s.queue.initiate("S001", "Helper", "").unwrap();

    let err = s
        .queue
        .decide(&id, Decision::Reject, &SecretSeed::generate().account_id())
        .await
        .unwrap_err();

    assert!(matches!(err, GrantError::UnauthorizedSigner { .. }));
    assert!(s.queue.get(&id).is_some());

    // the issuer may withdraw its own grant
    let outcome = s
        .queue
        .decide(&id, Decision::Reject, &s.issuer)
        .await
        .unwrap();
    assert_eq!(outcome, GrantOutcome::Rejected { id });
}

/// Test: Finalized grant answers NotFound to later decisions
#[tokio::test]
async fn test_decide_after_grant_not_found() {
    let s = setup();
    let id = s.queue.initiate("S001", "Helper", "").unwrap();
    s.queue
        .decide(&id, Decision::Approve, &s.validator)
        .await
        .unwrap();

    let err = s
        .queue
        .decide(&id, Decision::Approve, &SecretSeed::generate().account_id())
        .await
        .unwrap_err();
    assert!(matches!(err, GrantError::NotFound(_)));
    assert_eq!(err.category(), ErrorCategory::NotFound);
    assert_eq!(s.store.get_beneficiary("S001").unwrap().unwrap().merit_count(), 1);
}

/// Test: Racing validators produce exactly one grant
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_signers_single_grant() {
    let issuer = SecretSeed::generate().account_id();
    let validators: Vec<AccountId> = (0..4).map(|_| SecretSeed::generate().account_id()).collect();
    let store = Arc::new(RewardStore::temporary().unwrap());
    store
        .put_beneficiary(&BeneficiaryRecord::new("S001", "Alicia"))
        .unwrap();
    let queue = validators[1..]
        .iter()
        .fold(MeritGrantQueue::new(issuer, validators[0], store.clone()), |q, v| {
            q.with_validator(*v)
        });
    let queue = Arc::new(queue);
    let id = queue.initiate("S001", "Helper", "").unwrap();

    let tasks: Vec<_> = validators
        .into_iter()
        .map(|signer| {
            let queue = queue.clone();
            let id = id.clone();
            tokio::spawn(async move { queue.decide(&id, Decision::Approve, &signer).await })
        })
        .collect();

    let mut granted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(GrantOutcome::Granted { .. }) => granted += 1,
            Err(GrantError::NotFound(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    assert_eq!(granted, 1);
    assert_eq!(store.get_beneficiary("S001").unwrap().unwrap().merit_count(), 1);
}

// ============================================================================
// REJECT
// ============================================================================

/// Test: Rejection removes the grant without recording anything
#[tokio::test]
async fn test_reject() {
    let s = setup();
    let id = s.queue.initiate("S001", "Helper", "").unwrap();

    let outcome = s
        .queue
        .decide(&id, Decision::Reject, &s.validator)
        .await
        .unwrap();

    assert_eq!(outcome, GrantOutcome::Rejected { id: id.clone() });
    assert!(s.queue.pending().is_empty());
    assert_eq!(s.store.get_beneficiary("S001").unwrap().unwrap().merit_count(), 0);
    assert_eq!(s.queue.audit_log()[0].status, GrantStatus::Rejected);
    assert!(matches!(
        s.queue.decide(&id, Decision::Approve, &s.validator).await,
        Err(GrantError::NotFound(_))
    ));
}

// ============================================================================
// MINTING
// ============================================================================

/// Test: Minter is called once for a granted merit
#[tokio::test]
async fn test_minter_called_on_grant() {
    let issuer = SecretSeed::generate().account_id();
    let validator = SecretSeed::generate().account_id();
    let store = Arc::new(RewardStore::temporary().unwrap());
    store
        .put_beneficiary(&BeneficiaryRecord::new("S001", "Alicia"))
        .unwrap();
    let minter = Arc::new(RecordingMinter::default());
    let queue = MeritGrantQueue::new(issuer, validator, store).with_minter(minter.clone());

    let id = queue.initiate("S001", "Helper", "").unwrap();
    let outcome = queue
        .decide(&id, Decision::Approve, &validator)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        GrantOutcome::Granted { mint: MintStatus::Minted(ref token), .. } if *token == format!("token-{id}")
    ));
    assert_eq!(*minter.minted.lock().unwrap(), vec![id]);
}

/// Test: Minting failure does not undo the grant
#[tokio::test]
async fn test_mint_failure_keeps_grant() {
    let issuer = SecretSeed::generate().account_id();
    let validator = SecretSeed::generate().account_id();
    let store = Arc::new(RewardStore::temporary().unwrap());
    store
        .put_beneficiary(&BeneficiaryRecord::new("S001", "Alicia"))
        .unwrap();
    let minter = Arc::new(RecordingMinter {
        minted: Mutex::new(Vec::new()),
        fail: true,
    });
    let queue = MeritGrantQueue::new(issuer, validator, store.clone()).with_minter(minter);

    let id = queue.initiate("S001", "Helper", "").unwrap();
    let outcome = queue
        .decide(&id, Decision::Approve, &validator)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        GrantOutcome::Granted {
            mint: MintStatus::Failed(_),
            achievement_recorded: true,
            ..
        }
    ));
    assert_eq!(store.get_beneficiary("S001").unwrap().unwrap().merit_count(), 1);
}
