// RemoteSigningBackend - build/submit delegated to an HTTP signing service
//
// POST {base}/api/payment/build   {destination, amount}  -> {xdr}
// POST {base}/api/payment/submit  {xdr}                  -> {hash, ledger, fee_charged}
//
// Every request carries the access key in the `x-api-key` header. The issuer
// secret never leaves the service.

use crate::identity::AccountId;
use crate::issuance::{BackendMode, BuildError, SigningBackend};
use crate::ledger::{Amount, GatewayError, ResultCodes, SignedPayload, SubmitReceipt};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Error code the service returns when the issuer account does not exist
const ISSUER_NOT_FUNDED_CODE: &str = "issuer_not_funded";

#[derive(Debug, Serialize)]
struct BuildRequest<'a> {
    destination: String,
    amount: &'a str,
}

#[derive(Debug, Deserialize)]
struct BuildResponse {
    xdr: String,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    xdr: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    hash: String,
    #[serde(default)]
    ledger: u64,
    #[serde(default)]
    fee_charged: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result_codes: Option<ResultCodesBody>,
}

#[derive(Debug, Deserialize)]
struct ResultCodesBody {
    transaction: String,
    #[serde(default)]
    operations: Vec<String>,
}

impl ErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    fn message(&self, raw: &str) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| raw.to_string())
    }
}

fn build_error(status: StatusCode, body: &str, issuer: AccountId) -> BuildError {
    let parsed = ErrorBody::parse(body);
    if parsed.code.as_deref() == Some(ISSUER_NOT_FUNDED_CODE) {
        return BuildError::IssuerNotFunded(issuer);
    }
    if status == StatusCode::SERVICE_UNAVAILABLE {
        return BuildError::GatewayUnavailable(parsed.message(body));
    }
    BuildError::Backend {
        status: status.as_u16(),
        message: parsed.message(body),
    }
}

fn submit_error(status: StatusCode, body: &str) -> GatewayError {
    let parsed = ErrorBody::parse(body);
    if let Some(codes) = parsed.result_codes {
        return GatewayError::Rejected {
            result_codes: ResultCodes {
                transaction: codes.transaction,
                operations: codes.operations,
            },
        };
    }
    if status == StatusCode::SERVICE_UNAVAILABLE {
        return GatewayError::Unavailable(parsed.message(body));
    }
    GatewayError::InvalidResponse(format!("HTTP {}: {}", status, parsed.message(body)))
}

fn fee_charged(value: Option<serde_json::Value>) -> i64 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or_default(),
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or_default(),
        _ => 0,
    }
}

/// HTTP client for a remote signing service
#[derive(Clone)]
pub struct RemoteSigningBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    issuer: AccountId,
}

impl RemoteSigningBackend {
    pub fn new(base_url: &str, api_key: &str, issuer: AccountId) -> Result<Self, BuildError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                BuildError::GatewayUnavailable(format!("failed to create HTTP client: {e}"))
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            issuer,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SigningBackend for RemoteSigningBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Remote
    }

    fn issuer(&self) -> &AccountId {
        &self.issuer
    }

    async fn build_payment(
        &self,
        destination: &AccountId,
        amount: Amount,
    ) -> Result<SignedPayload, BuildError> {
        let amount = amount.to_string();
        let response = self
            .http
            .post(format!("{}/api/payment/build", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&BuildRequest {
                destination: destination.to_string(),
                amount: &amount,
            })
            .send()
            .await
            .map_err(|e| {
                BuildError::Gateway(GatewayError::Transport(format!("request failed: {e}")))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = build_error(status, &body, self.issuer);
            warn!(destination = %destination, error = %err, "signing backend refused build");
            return Err(err);
        }

        let body: BuildResponse = response.json().await.map_err(|e| {
            BuildError::Gateway(GatewayError::InvalidResponse(format!(
                "invalid build response: {e}"
            )))
        })?;
        debug!(destination = %destination, amount = %amount, "payment built by signing backend");
        Ok(SignedPayload::new(body.xdr))
    }

    async fn submit(&self, payload: &SignedPayload) -> Result<SubmitReceipt, GatewayError> {
        let response = self
            .http
            .post(format!("{}/api/payment/submit", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&SubmitRequest {
                xdr: payload.as_str(),
            })
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("submit failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(submit_error(status, &body));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("invalid submit response: {e}")))?;
        Ok(SubmitReceipt {
            hash: body.hash,
            ledger: body.ledger,
            fee_charged: fee_charged(body.fee_charged),
        })
    }
}
