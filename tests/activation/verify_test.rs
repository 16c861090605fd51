// Activation Verification Tests
// Bounded polling: timeout vs incomplete, never ACTIVE on failure

use async_trait::async_trait;
use educhain::activation::{
    ActivationError, ActivationState, ActivationWorkflow, RecordingDelay, RetryPolicy,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY,
};
use educhain::identity::{AccountId, AccountReference, SecretSeed};
use educhain::ledger::{
    AccountState, FundOutcome, GatewayError, InMemoryLedger, LedgerGateway, Network, RewardAsset,
    SignedPayload, SubmitReceipt,
};
use educhain::storage::RewardStore;
use educhain::{Categorized, ErrorCategory};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fails the first `failures` account lookups, then defers to the inner ledger
struct FlakyGateway {
    inner: Arc<InMemoryLedger>,
    failures: AtomicU32,
    lookups: AtomicU32,
}

impl FlakyGateway {
    fn new(inner: Arc<InMemoryLedger>, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
            lookups: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl LedgerGateway for FlakyGateway {
    async fn get_account(&self, id: &AccountId) -> Result<AccountState, GatewayError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(GatewayError::Unavailable("horizon timeout".to_string()));
        }
        self.inner.get_account(id).await
    }

    async fn fund_account(&self, id: &AccountId) -> Result<FundOutcome, GatewayError> {
        self.inner.fund_account(id).await
    }

    async fn submit_transaction(
        &self,
        payload: &SignedPayload,
    ) -> Result<SubmitReceipt, GatewayError> {
        self.inner.submit_transaction(payload).await
    }
}

fn workflow(gateway: Arc<dyn LedgerGateway>, delay: Arc<RecordingDelay>) -> ActivationWorkflow {
    let asset = RewardAsset::new("TASK", SecretSeed::generate().account_id()).unwrap();
    ActivationWorkflow::new(
        gateway,
        Arc::new(RewardStore::temporary().unwrap()),
        asset,
        Network::testnet(),
    )
    .with_delay(delay)
}

// ============================================================================
// EXHAUSTION
// ============================================================================

/// Test: Never-funded account exhausts the budget as incomplete, funded=false
#[tokio::test]
async fn test_never_funded_is_incomplete() {
    let ledger = Arc::new(InMemoryLedger::new(Network::testnet()));
    let delay = Arc::new(RecordingDelay::new());
    let workflow = workflow(ledger, delay.clone());
    let account = SecretSeed::generate().account_id();

    let err = workflow.verify(&account).await.unwrap_err();

    match &err {
        ActivationError::ActivationIncomplete {
            funded,
            trust_established,
            attempts,
        } => {
            assert!(!funded);
            assert!(!trust_established);
            assert_eq!(*attempts, DEFAULT_MAX_ATTEMPTS);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.category(), ErrorCategory::ActivationIncomplete);

    // no wait after the last attempt
    assert_eq!(delay.calls(), DEFAULT_MAX_ATTEMPTS - 1);
    assert_eq!(delay.total(), DEFAULT_RETRY_DELAY * (DEFAULT_MAX_ATTEMPTS - 1));
    assert_eq!(workflow.state(&account).unwrap(), ActivationState::Pending);
}

/// Test: Funded account without a trustline keeps the funded sub-reason
#[tokio::test]
async fn test_funded_without_trust() {
    let ledger = Arc::new(InMemoryLedger::new(Network::testnet()));
    let account = SecretSeed::generate().account_id();
    ledger.fund_account(&account).await.unwrap();
    let workflow = workflow(ledger, Arc::new(RecordingDelay::new()))
        .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(5)));

    let err = workflow.verify(&account).await.unwrap_err();

    assert!(matches!(
        err,
        ActivationError::ActivationIncomplete {
            funded: true,
            trust_established: false,
            attempts: 2,
        }
    ));
    assert_eq!(workflow.state(&account).unwrap(), ActivationState::Pending);
}

/// Test: Gateway failing on every poll is a timeout carrying the last error
#[tokio::test]
async fn test_offline_is_timeout() {
    let ledger = Arc::new(InMemoryLedger::new(Network::testnet()));
    ledger.set_offline(true);
    let workflow = workflow(ledger, Arc::new(RecordingDelay::new()));
    let account = SecretSeed::generate().account_id();

    let err = workflow.verify(&account).await.unwrap_err();

    match &err {
        ActivationError::ActivationTimeout {
            attempts,
            last_error,
        } => {
            assert_eq!(*attempts, DEFAULT_MAX_ATTEMPTS);
            assert!(matches!(last_error, GatewayError::Unavailable(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.category(), ErrorCategory::ActivationTimeout);
}

// ============================================================================
// RECOVERY
// ============================================================================

/// Test: Transient lookup failures are absorbed by the retry budget
#[tokio::test]
async fn test_recovers_within_budget() {
    let ledger = Arc::new(InMemoryLedger::new(Network::testnet()));
    let delay = Arc::new(RecordingDelay::new());
    let student = SecretSeed::generate();

    let store = Arc::new(RewardStore::temporary().unwrap());
    let asset = RewardAsset::new("TASK", SecretSeed::generate().account_id()).unwrap();

    // provision through the healthy ledger first
    ActivationWorkflow::new(ledger.clone(), store.clone(), asset.clone(), Network::testnet())
        .provision(&AccountReference::from_credential(student.clone()))
        .await
        .unwrap();

    let flaky = Arc::new(FlakyGateway::new(ledger, 2));
    let verifier = ActivationWorkflow::new(flaky.clone(), store, asset, Network::testnet())
        .with_delay(delay.clone());

    let attempts = verifier.verify(&student.account_id()).await.unwrap();

    assert_eq!(attempts, 3);
    assert_eq!(flaky.lookups.load(Ordering::SeqCst), 3);
    assert_eq!(delay.calls(), 2);
}

/// Test: A single-attempt policy never waits
#[tokio::test]
async fn test_single_attempt_never_waits() {
    let ledger = Arc::new(InMemoryLedger::new(Network::testnet()));
    let delay = Arc::new(RecordingDelay::new());
    let workflow = workflow(ledger, delay.clone())
        .with_retry_policy(RetryPolicy::new(0, Duration::from_secs(60)));

    assert_eq!(workflow.policy().max_attempts(), 1);
    let err = workflow
        .verify(&SecretSeed::generate().account_id())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ActivationError::ActivationIncomplete { attempts: 1, .. }
    ));
    assert_eq!(delay.calls(), 0);
}
