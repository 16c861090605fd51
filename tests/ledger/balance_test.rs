// Balance Reader Tests

use educhain::identity::SecretSeed;
use educhain::ledger::{
    Amount, BalanceReader, InMemoryLedger, LedgerGateway, Network, RewardAsset,
};
use std::sync::Arc;

/// Test: Unfunded account reads as zero
#[tokio::test]
async fn test_unfunded_reads_zero() {
    let ledger = Arc::new(InMemoryLedger::new(Network::testnet()));
    let asset = RewardAsset::new("TASK", SecretSeed::generate().account_id()).unwrap();
    let reader = BalanceReader::new(ledger, asset);

    let balance = reader.reward_balance(&SecretSeed::generate().account_id()).await;
    assert_eq!(balance, Amount::ZERO);
}

/// Test: Funded account without a trustline reads as zero
#[tokio::test]
async fn test_no_trustline_reads_zero() {
    let ledger = Arc::new(InMemoryLedger::new(Network::testnet()));
    let asset = RewardAsset::new("TASK", SecretSeed::generate().account_id()).unwrap();
    let account = SecretSeed::generate().account_id();
    ledger.fund_account(&account).await.unwrap();

    let reader = BalanceReader::new(ledger, asset);
    assert_eq!(reader.reward_balance(&account).await, Amount::ZERO);
}

/// Test: Gateway failure degrades to zero instead of an error
#[tokio::test]
async fn test_offline_reads_zero() {
    let ledger = Arc::new(InMemoryLedger::new(Network::testnet()));
    let asset = RewardAsset::new("TASK", SecretSeed::generate().account_id()).unwrap();
    let account = SecretSeed::generate().account_id();
    ledger.fund_account(&account).await.unwrap();
    ledger.set_offline(true);

    let reader = BalanceReader::new(ledger, asset);
    let refreshed = reader.refresh(&[account]).await;
    assert_eq!(refreshed, vec![(account, Amount::ZERO)]);
}
