// In-memory ledger - a deterministic LedgerGateway
//
// Validates and applies submitted envelopes the way the network does:
// sequence numbers, source signatures, trustlines, balances, fees.
// Faults can be switched on to exercise failure paths.

use crate::identity::AccountId;
use crate::ledger::{
    AccountState, Amount, Asset, BalanceLine, EnvelopeCodec, FundOutcome, GatewayError,
    LedgerGateway, Network, Operation, ResultCodes, SignedPayload, SubmitReceipt,
    TransactionEnvelope,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

/// Native balance given to accounts created by the funding faucet
pub const FRIENDBOT_STARTING_BALANCE: Amount = Amount::from_units(10_000);

#[derive(Clone, Debug)]
struct TrustLine {
    balance: Amount,
    limit: Amount,
}

#[derive(Clone, Debug)]
struct LedgerAccount {
    sequence: i64,
    native: Amount,
    trustlines: BTreeMap<(String, AccountId), TrustLine>,
}

impl LedgerAccount {
    fn new(native: Amount, ledger_seq: u64) -> Self {
        Self {
            sequence: (ledger_seq as i64) << 32,
            native,
            trustlines: BTreeMap::new(),
        }
    }

    fn snapshot(&self, id: AccountId) -> AccountState {
        let mut balances = vec![BalanceLine {
            asset: Asset::Native,
            balance: self.native,
            limit: None,
        }];
        for ((code, issuer), line) in &self.trustlines {
            balances.push(BalanceLine {
                asset: Asset::Credit {
                    code: code.clone(),
                    issuer: *issuer,
                },
                balance: line.balance,
                limit: Some(line.limit),
            });
        }
        AccountState {
            id,
            sequence: self.sequence,
            balances,
        }
    }
}

struct LedgerState {
    accounts: BTreeMap<AccountId, LedgerAccount>,
    ledger_seq: u64,
    funding_enabled: bool,
    offline: bool,
    scripted_rejections: VecDeque<ResultCodes>,
    submissions: Vec<SignedPayload>,
    fund_requests: usize,
}

/// Deterministic in-process ledger
pub struct InMemoryLedger {
    network: Network,
    state: Mutex<LedgerState>,
}

type OpResult = Result<(), &'static str>;

impl InMemoryLedger {
    /// Create an empty ledger bound to a network
    pub fn new(network: Network) -> Self {
        Self {
            network,
            state: Mutex::new(LedgerState {
                accounts: BTreeMap::new(),
                ledger_seq: 1,
                funding_enabled: true,
                offline: false,
                scripted_rejections: VecDeque::new(),
                submissions: Vec::new(),
                fund_requests: 0,
            }),
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    // FAULT INJECTION AND INSPECTION
    // ========================================================================

    /// Make funding requests fail (accounts are never created)
    pub fn set_funding_enabled(&self, enabled: bool) {
        self.lock().funding_enabled = enabled;
    }

    /// Make every call fail with `Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Reject the next submission with the given codes, without applying it
    pub fn reject_next_submission(&self, codes: ResultCodes) {
        self.lock().scripted_rejections.push_back(codes);
    }

    /// Create an account directly with a native balance
    pub fn create_account(&self, id: AccountId, native: Amount) {
        let mut state = self.lock();
        let ledger_seq = state.ledger_seq;
        state
            .accounts
            .entry(id)
            .or_insert_with(|| LedgerAccount::new(native, ledger_seq));
    }

    /// Every payload handed to `submit_transaction`, in order
    pub fn submissions(&self) -> Vec<SignedPayload> {
        self.lock().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.lock().submissions.len()
    }

    pub fn fund_request_count(&self) -> usize {
        self.lock().fund_requests
    }

    pub fn ledger_sequence(&self) -> u64 {
        self.lock().ledger_seq
    }

    // ========================================================================
    // APPLICATION
    // ========================================================================

    fn apply(
        &self,
        state: &mut LedgerState,
        envelope: &TransactionEnvelope,
    ) -> Result<SubmitReceipt, ResultCodes> {
        let tx = envelope.tx();
        let source_id = *tx.source();

        let source = state
            .accounts
            .get(&source_id)
            .ok_or_else(|| ResultCodes::transaction("tx_no_source_account"))?;

        if let Some(bounds) = tx.time_bounds() {
            let now = Utc::now().timestamp().max(0) as u64;
            if !bounds.contains(now) {
                let code = if now < bounds.min_time {
                    "tx_too_early"
                } else {
                    "tx_too_late"
                };
                return Err(ResultCodes::transaction(code));
            }
        }

        if tx.sequence() != source.sequence + 1 {
            return Err(ResultCodes::transaction("tx_bad_seq"));
        }

        if !envelope.is_signed_by(&source_id, &self.network) {
            return Err(ResultCodes::transaction("tx_bad_auth"));
        }

        let fee = Amount::from_stroops(tx.fee() as i64);
        if source.native < fee {
            return Err(ResultCodes::transaction("tx_insufficient_balance"));
        }

        // Fee and sequence are consumed even when an operation fails
        let mut charged = state.accounts.clone();
        if let Some(acct) = charged.get_mut(&source_id) {
            acct.sequence = tx.sequence();
            acct.native = acct.native.checked_sub(fee).unwrap_or(Amount::ZERO);
        }

        let mut working = charged.clone();
        let mut op_codes = Vec::with_capacity(tx.operations().len());
        let mut failed = false;
        for op in tx.operations() {
            let result = if failed {
                Ok(())
            } else {
                Self::apply_operation(&mut working, &source_id, op)
            };
            match result {
                Ok(()) => op_codes.push("op_success".to_string()),
                Err(code) => {
                    failed = true;
                    op_codes.push(code.to_string());
                }
            }
        }

        state.ledger_seq += 1;
        let hash = envelope.hash(&self.network).to_string();

        if failed {
            state.accounts = charged;
            return Err(ResultCodes {
                transaction: "tx_failed".to_string(),
                operations: op_codes,
            });
        }

        state.accounts = working;
        Ok(SubmitReceipt {
            hash,
            ledger: state.ledger_seq,
            fee_charged: fee.stroops(),
        })
    }

    fn apply_operation(
        accounts: &mut BTreeMap<AccountId, LedgerAccount>,
        source: &AccountId,
        op: &Operation,
    ) -> OpResult {
        match op {
            Operation::Payment {
                destination,
                asset,
                amount,
            } => Self::apply_payment(accounts, source, destination, asset, *amount),
            Operation::ChangeTrust { asset, limit } => {
                Self::apply_change_trust(accounts, source, asset, *limit)
            }
        }
    }

    fn apply_payment(
        accounts: &mut BTreeMap<AccountId, LedgerAccount>,
        source: &AccountId,
        destination: &AccountId,
        asset: &Asset,
        amount: Amount,
    ) -> OpResult {
        if !amount.is_positive() {
            return Err("op_malformed");
        }
        if !accounts.contains_key(destination) {
            return Err("op_no_destination");
        }

        match asset {
            Asset::Native => {
                let src = accounts.get_mut(source).ok_or("op_no_source_account")?;
                src.native = src
                    .native
                    .checked_sub(amount)
                    .filter(|b| b.stroops() >= 0)
                    .ok_or("op_underfunded")?;
                let dst = accounts.get_mut(destination).ok_or("op_no_destination")?;
                dst.native = dst.native.checked_add(amount).ok_or("op_line_full")?;
                Ok(())
            }
            Asset::Credit { code, issuer } => {
                let key = (code.clone(), *issuer);

                // the issuer creates the asset on payment out and destroys it on payment in
                if source != issuer {
                    let src = accounts.get_mut(source).ok_or("op_no_source_account")?;
                    let line = src.trustlines.get_mut(&key).ok_or("op_src_no_trust")?;
                    line.balance = line
                        .balance
                        .checked_sub(amount)
                        .filter(|b| b.stroops() >= 0)
                        .ok_or("op_underfunded")?;
                }

                if destination != issuer {
                    let dst = accounts.get_mut(destination).ok_or("op_no_destination")?;
                    let line = dst.trustlines.get_mut(&key).ok_or("op_no_trust")?;
                    let updated = line
                        .balance
                        .checked_add(amount)
                        .filter(|b| *b <= line.limit)
                        .ok_or("op_line_full")?;
                    line.balance = updated;
                }
                Ok(())
            }
        }
    }

    fn apply_change_trust(
        accounts: &mut BTreeMap<AccountId, LedgerAccount>,
        source: &AccountId,
        asset: &Asset,
        limit: Amount,
    ) -> OpResult {
        let (code, issuer) = match asset {
            Asset::Native => return Err("op_malformed"),
            Asset::Credit { code, issuer } => (code.clone(), *issuer),
        };
        // trustlines to an issuer that does not exist yet are allowed
        if &issuer == source {
            return Err("op_self_not_allowed");
        }

        let acct = accounts.get_mut(source).ok_or("op_no_source_account")?;
        let key = (code, issuer);
        match acct.trustlines.get_mut(&key) {
            Some(line) => {
                if limit.is_zero() {
                    if !line.balance.is_zero() {
                        return Err("op_invalid_limit");
                    }
                    acct.trustlines.remove(&key);
                } else if limit < line.balance {
                    return Err("op_invalid_limit");
                } else {
                    line.limit = limit;
                }
            }
            None => {
                if limit.is_zero() {
                    return Err("op_invalid_limit");
                }
                acct.trustlines.insert(
                    key,
                    TrustLine {
                        balance: Amount::ZERO,
                        limit,
                    },
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerGateway for InMemoryLedger {
    async fn get_account(&self, id: &AccountId) -> Result<AccountState, GatewayError> {
        let state = self.lock();
        if state.offline {
            return Err(GatewayError::Unavailable("ledger offline".to_string()));
        }
        state
            .accounts
            .get(id)
            .map(|acct| acct.snapshot(*id))
            .ok_or(GatewayError::AccountNotFound(*id))
    }

    async fn fund_account(&self, id: &AccountId) -> Result<FundOutcome, GatewayError> {
        let mut state = self.lock();
        if state.offline {
            return Err(GatewayError::Unavailable("ledger offline".to_string()));
        }
        state.fund_requests += 1;

        if !state.funding_enabled {
            return Err(GatewayError::FundingFailed(
                "funding faucet is disabled".to_string(),
            ));
        }
        if state.accounts.contains_key(id) {
            return Ok(FundOutcome::AlreadyFunded);
        }

        let ledger_seq = state.ledger_seq;
        state
            .accounts
            .insert(*id, LedgerAccount::new(FRIENDBOT_STARTING_BALANCE, ledger_seq));
        state.ledger_seq += 1;
        debug!(account = %id, "in-memory ledger funded account");
        Ok(FundOutcome::Funded)
    }

    async fn submit_transaction(
        &self,
        payload: &SignedPayload,
    ) -> Result<SubmitReceipt, GatewayError> {
        let mut state = self.lock();
        if state.offline {
            return Err(GatewayError::Unavailable("ledger offline".to_string()));
        }
        state.submissions.push(payload.clone());

        if let Some(result_codes) = state.scripted_rejections.pop_front() {
            return Err(GatewayError::Rejected { result_codes });
        }

        let envelope = EnvelopeCodec::decode(payload).map_err(|_| GatewayError::Rejected {
            result_codes: ResultCodes::transaction("tx_malformed"),
        })?;

        self.apply(&mut state, &envelope)
            .map_err(|result_codes| GatewayError::Rejected { result_codes })
    }
}
