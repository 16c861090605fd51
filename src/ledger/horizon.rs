// HorizonGateway - LedgerGateway over a Horizon-style REST API
//
// GET  {horizon}/accounts/{id}
// GET  {friendbot}?addr={id}
// POST {horizon}/transactions   (form: tx=<payload>)

use crate::identity::AccountId;
use crate::ledger::{
    AccountState, Amount, Asset, BalanceLine, FundOutcome, GatewayError, LedgerGateway,
    ResultCodes, SignedPayload, SubmitReceipt,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_HORIZON_URL: &str = "https://horizon-testnet.stellar.org";
pub const DEFAULT_FRIENDBOT_URL: &str = "https://friendbot.stellar.org";

#[derive(Debug, Deserialize)]
struct HorizonAccount {
    id: String,
    sequence: String,
    #[serde(default)]
    balances: Vec<HorizonBalance>,
}

#[derive(Debug, Deserialize)]
struct HorizonBalance {
    balance: String,
    #[serde(default)]
    limit: Option<String>,
    asset_type: String,
    #[serde(default)]
    asset_code: Option<String>,
    #[serde(default)]
    asset_issuer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HorizonSubmitResponse {
    hash: String,
    #[serde(default)]
    ledger: u64,
    #[serde(default)]
    fee_charged: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HorizonProblem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    extras: Option<HorizonExtras>,
}

#[derive(Debug, Deserialize)]
struct HorizonExtras {
    #[serde(default)]
    result_codes: Option<HorizonResultCodes>,
}

#[derive(Debug, Deserialize)]
struct HorizonResultCodes {
    transaction: String,
    #[serde(default)]
    operations: Vec<String>,
}

fn parse_account(raw: HorizonAccount) -> Result<AccountState, GatewayError> {
    let id = AccountId::parse(&raw.id)
        .map_err(|e| GatewayError::InvalidResponse(format!("account id: {}", e)))?;
    let sequence = raw
        .sequence
        .parse::<i64>()
        .map_err(|e| GatewayError::InvalidResponse(format!("sequence: {}", e)))?;

    let mut balances = Vec::with_capacity(raw.balances.len());
    for line in raw.balances {
        let balance = Amount::parse(&line.balance)
            .map_err(|e| GatewayError::InvalidResponse(format!("balance: {}", e)))?;
        let limit = line
            .limit
            .as_deref()
            .map(Amount::parse)
            .transpose()
            .map_err(|e| GatewayError::InvalidResponse(format!("limit: {}", e)))?;

        let asset = if line.asset_type == "native" {
            Asset::Native
        } else {
            match (line.asset_code, line.asset_issuer) {
                (Some(code), Some(issuer)) => Asset::Credit {
                    code,
                    issuer: AccountId::parse(&issuer)
                        .map_err(|e| GatewayError::InvalidResponse(format!("issuer: {}", e)))?,
                },
                // liquidity pool shares and other holdings carry no code/issuer
                _ => continue,
            }
        };

        balances.push(BalanceLine {
            asset,
            balance,
            limit,
        });
    }

    Ok(AccountState {
        id,
        sequence,
        balances,
    })
}

/// Map a failed submission body to a gateway error, keeping result codes verbatim
fn parse_problem(status: StatusCode, body: &str) -> GatewayError {
    match serde_json::from_str::<HorizonProblem>(body) {
        Ok(problem) => {
            if let Some(codes) = problem.extras.and_then(|e| e.result_codes) {
                return GatewayError::Rejected {
                    result_codes: ResultCodes {
                        transaction: codes.transaction,
                        operations: codes.operations,
                    },
                };
            }
            let message = problem
                .detail
                .or(problem.title)
                .unwrap_or_else(|| body.to_string());
            GatewayError::InvalidResponse(format!("HTTP {}: {}", status, message))
        }
        Err(_) => GatewayError::InvalidResponse(format!("HTTP {}: {}", status, body)),
    }
}

fn is_already_funded(body: &str) -> bool {
    body.contains("already funded") || body.contains("createAccountAlreadyExist")
}

/// HTTP client for a Horizon-compatible ledger API
#[derive(Clone)]
pub struct HorizonGateway {
    http: reqwest::Client,
    horizon_url: String,
    friendbot_url: String,
}

impl HorizonGateway {
    pub fn new(horizon_url: &str, friendbot_url: &str) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            horizon_url: horizon_url.trim_end_matches('/').to_string(),
            friendbot_url: friendbot_url.to_string(),
        })
    }

    /// Gateway pointed at the public test network
    pub fn testnet() -> Result<Self, GatewayError> {
        Self::new(DEFAULT_HORIZON_URL, DEFAULT_FRIENDBOT_URL)
    }

    pub fn horizon_url(&self) -> &str {
        &self.horizon_url
    }
}

#[async_trait]
impl LedgerGateway for HorizonGateway {
    async fn get_account(&self, id: &AccountId) -> Result<AccountState, GatewayError> {
        let url = format!("{}/accounts/{}", self.horizon_url, id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::AccountNotFound(*id));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::InvalidResponse(format!("HTTP {}: {}", status, body)));
        }

        let raw: HorizonAccount = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("invalid account JSON: {e}")))?;
        parse_account(raw)
    }

    async fn fund_account(&self, id: &AccountId) -> Result<FundOutcome, GatewayError> {
        let response = self
            .http
            .get(&self.friendbot_url)
            .query(&[("addr", id.to_string())])
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("friendbot request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            debug!(account = %id, "friendbot funded account");
            return Ok(FundOutcome::Funded);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && is_already_funded(&body) {
            return Ok(FundOutcome::AlreadyFunded);
        }
        Err(GatewayError::FundingFailed(format!(
            "friendbot responded {}: {}",
            status, body
        )))
    }

    async fn submit_transaction(
        &self,
        payload: &SignedPayload,
    ) -> Result<SubmitReceipt, GatewayError> {
        let url = format!("{}/transactions", self.horizon_url);
        let response = self
            .http
            .post(&url)
            .form(&[("tx", payload.as_str())])
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("submit failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = parse_problem(status, &body);
            warn!(error = %err, "ledger rejected submission");
            return Err(err);
        }

        let body: HorizonSubmitResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("invalid submit JSON: {e}")))?;
        Ok(SubmitReceipt {
            hash: body.hash,
            ledger: body.ledger,
            fee_charged: body
                .fee_charged
                .and_then(|f| f.parse().ok())
                .unwrap_or_default(),
        })
    }
}
