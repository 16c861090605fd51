// Balance reader - read-only projection of reward balances
//
// Display-only: any failure degrades to a zero balance.

use crate::identity::AccountId;
use crate::ledger::{Amount, GatewayError, LedgerGateway, RewardAsset};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct BalanceReader {
    gateway: Arc<dyn LedgerGateway>,
    asset: RewardAsset,
}

impl BalanceReader {
    pub fn new(gateway: Arc<dyn LedgerGateway>, asset: RewardAsset) -> Self {
        Self { gateway, asset }
    }

    pub fn asset(&self) -> &RewardAsset {
        &self.asset
    }

    /// Reward balance of an account; zero when the account or trustline is
    /// missing or the gateway fails
    pub async fn reward_balance(&self, account: &AccountId) -> Amount {
        match self.gateway.get_account(account).await {
            Ok(state) => state.reward_balance(&self.asset).unwrap_or(Amount::ZERO),
            Err(GatewayError::AccountNotFound(_)) => {
                debug!(account = %account, "balance query for unfunded account");
                Amount::ZERO
            }
            Err(e) => {
                warn!(account = %account, error = %e, "balance query failed, showing zero");
                Amount::ZERO
            }
        }
    }

    /// Re-query a set of accounts, e.g. those scheduled for refresh after a submission
    pub async fn refresh(&self, accounts: &[AccountId]) -> Vec<(AccountId, Amount)> {
        let mut balances = Vec::with_capacity(accounts.len());
        for account in accounts {
            balances.push((*account, self.reward_balance(account).await));
        }
        balances
    }
}
