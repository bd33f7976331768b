//! REST client for a Paypack-style mobile-money gateway
//!
//! - `POST /auth/agents/authorize` exchanges client credentials for a bearer
//!   token, cached until shortly before it expires
//! - `POST /transactions/cashin` starts a collection, carrying the attempt's
//!   `Idempotency-Key`
//! - `GET /transactions/find/{ref}` reports a transaction's status
//!
//! Retries are the caller's business; this client makes one request per call.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::application::ports::{CashInRequest, CashInResponse, PaymentGateway};
use crate::domain::GatewayStatus;
use crate::shared::errors::{GatewayError, InfraError};

/// Token lifetime assumed when the gateway does not say.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(600);
/// Refresh this long before the reported expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub timeout: Duration,
    /// Country prefix of normalized numbers, replaced by a leading `0` in the
    /// number sent to the gateway (`+250788123456` -> `0788123456`).
    pub country_prefix: String,
    /// Sent as `X-Webhook-Mode` on cash-in so the gateway knows which
    /// webhook target (`development` or `production`) to call back.
    pub webhook_mode: Option<String>,
}

#[derive(Serialize)]
struct AuthorizeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct AuthorizeResponse {
    access: String,
    /// Unix timestamp (seconds) at which the token expires.
    #[serde(default)]
    expires: Option<i64>,
}

#[derive(Serialize)]
struct CashInBody<'a> {
    amount: i64,
    number: &'a str,
}

#[derive(Deserialize)]
struct TransactionBody {
    #[serde(rename = "ref")]
    reference: String,
    status: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

struct CachedToken {
    access: String,
    refresh_at: Instant,
}

pub struct HttpPaymentGateway {
    client: Client,
    config: HttpGatewayConfig,
    token: RwLock<Option<CachedToken>>,
}

impl HttpPaymentGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("parking-service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InfraError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: HttpGatewayConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Number in the gateway's local format.
    fn gateway_number(&self, phone: &str) -> String {
        match phone.strip_prefix(self.config.country_prefix.as_str()) {
            Some(rest) if !self.config.country_prefix.is_empty() => format!("0{}", rest),
            _ => phone.to_string(),
        }
    }

    async fn bearer(&self) -> Result<String, GatewayError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = slot.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access.clone());
            }
        }

        debug!("Requesting gateway access token");
        let response = self
            .client
            .post(self.url("/auth/agents/authorize"))
            .json(&AuthorizeRequest {
                client_id: &self.config.client_id,
                client_secret: &self.config.client_secret,
            })
            .send()
            .await
            .map_err(transport_error)?;
        let body: AuthorizeResponse = decode(response).await?;

        let ttl = body
            .expires
            .map(|exp| exp - chrono::Utc::now().timestamp())
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs as u64))
            .unwrap_or(DEFAULT_TOKEN_TTL);
        let refresh_at = Instant::now() + ttl.saturating_sub(TOKEN_REFRESH_MARGIN);

        let access = body.access.clone();
        *slot = Some(CachedToken {
            access: body.access,
            refresh_at,
        });
        info!(ttl_secs = ttl.as_secs(), "🔑 Gateway access token refreshed");
        Ok(access)
    }

    async fn forget_token(&self) {
        *self.token.write().await = None;
    }
}

/// Whole currency units the gateway accepts, rounded up.
fn gateway_amount(amount: Decimal) -> Result<i64, GatewayError> {
    amount
        .ceil()
        .to_i64()
        .ok_or_else(|| GatewayError::Protocol(format!("Amount {} out of range", amount)))
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Transport(e.to_string())
    }
}

/// Map a non-success status: 5xx and 429 may succeed later, other 4xx are
/// the gateway's final word.
async fn status_error(response: Response) -> GatewayError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or(text);

    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        GatewayError::Transport(format!("HTTP {}: {}", status, detail))
    } else {
        GatewayError::Rejected(format!("HTTP {}: {}", status, detail))
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, GatewayError> {
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| GatewayError::Protocol(format!("Failed to parse response: {}", e)))
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn cash_in(&self, request: &CashInRequest) -> Result<CashInResponse, GatewayError> {
        let amount = gateway_amount(request.amount)?;
        let number = self.gateway_number(&request.phone);
        let token = self.bearer().await?;

        debug!(
            idempotency_key = %request.idempotency_key,
            amount,
            "Sending cash-in request"
        );
        let mut builder = self
            .client
            .post(self.url("/transactions/cashin"))
            .bearer_auth(token)
            .header("Idempotency-Key", &request.idempotency_key);
        if let Some(mode) = &self.config.webhook_mode {
            builder = builder.header("X-Webhook-Mode", mode);
        }
        let response = builder
            .json(&CashInBody {
                amount,
                number: &number,
            })
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.forget_token().await;
            return Err(GatewayError::Transport("Access token rejected".to_string()));
        }

        let body: TransactionBody = decode(response).await?;
        Ok(CashInResponse {
            reference: body.reference,
            status: GatewayStatus::parse(&body.status),
        })
    }

    async fn transaction_status(&self, reference: &str) -> Result<GatewayStatus, GatewayError> {
        let token = self.bearer().await?;
        let response = self
            .client
            .get(self.url(&format!("/transactions/find/{}", reference)))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.forget_token().await;
            return Err(GatewayError::Transport("Access token rejected".to_string()));
        }

        let body: TransactionBody = decode(response).await?;
        if body.reference != reference {
            warn!(
                requested = reference,
                returned = %body.reference,
                "Gateway returned a different transaction"
            );
            return Err(GatewayError::Protocol(format!(
                "Asked for {} but got {}",
                reference, body.reference
            )));
        }
        Ok(GatewayStatus::parse(&body.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockGateway {
        authorizations: AtomicUsize,
        cash_ins: Mutex<Vec<(Option<String>, Value)>>,
        fail_cash_in: Mutex<Option<AxumStatus>>,
    }

    async fn authorize(State(mock): State<Arc<MockGateway>>) -> Json<Value> {
        mock.authorizations.fetch_add(1, Ordering::SeqCst);
        Json(json!({
            "access": "token-1",
            "refresh": "refresh-1",
            "expires": chrono::Utc::now().timestamp() + 3600
        }))
    }

    async fn cashin(
        State(mock): State<Arc<MockGateway>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (AxumStatus, Json<Value>) {
        if let Some(status) = *mock.fail_cash_in.lock().unwrap() {
            return (status, Json(json!({ "message": "insufficient balance" })));
        }
        let key = headers
            .get("Idempotency-Key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let auth_ok = headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer token-1");
        assert!(auth_ok);
        mock.cash_ins.lock().unwrap().push((key, body));
        (
            AxumStatus::OK,
            Json(json!({ "ref": "PP-1", "status": "pending", "amount": 38 })),
        )
    }

    async fn find(Path(reference): Path<String>) -> (AxumStatus, Json<Value>) {
        match reference.as_str() {
            "PP-1" => (
                AxumStatus::OK,
                Json(json!({ "ref": "PP-1", "status": "successful" })),
            ),
            "PP-2" => (
                AxumStatus::OK,
                Json(json!({ "ref": "PP-2", "status": "failed" })),
            ),
            _ => (
                AxumStatus::NOT_FOUND,
                Json(json!({ "message": "transaction not found" })),
            ),
        }
    }

    async fn spawn_mock() -> (Arc<MockGateway>, HttpPaymentGateway) {
        let mock = Arc::new(MockGateway::default());
        let app = Router::new()
            .route("/auth/agents/authorize", post(authorize))
            .route("/transactions/cashin", post(cashin))
            .route("/transactions/find/{reference}", get(find))
            .with_state(mock.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let gateway = HttpPaymentGateway::new(HttpGatewayConfig {
            base_url: format!("http://{}/", addr),
            client_id: "id".into(),
            client_secret: "secret".into(),
            timeout: Duration::from_secs(5),
            country_prefix: "+250".into(),
            webhook_mode: Some("development".into()),
        })
        .unwrap();
        (mock, gateway)
    }

    fn request(amount: Decimal) -> CashInRequest {
        CashInRequest {
            phone: "+250788123456".into(),
            amount,
            idempotency_key: "parking-7-1".into(),
        }
    }

    #[test]
    fn amounts_round_up_to_whole_units() {
        assert_eq!(gateway_amount(dec!(37.5)).unwrap(), 38);
        assert_eq!(gateway_amount(dec!(450)).unwrap(), 450);
        assert_eq!(gateway_amount(dec!(0.01)).unwrap(), 1);
    }

    #[tokio::test]
    async fn cash_in_sends_key_local_number_and_rounded_amount() {
        let (mock, gateway) = spawn_mock().await;

        let response = gateway.cash_in(&request(dec!(37.5))).await.unwrap();
        assert_eq!(response.reference, "PP-1");
        assert_eq!(response.status, GatewayStatus::Pending);

        gateway.cash_in(&request(dec!(37.5))).await.unwrap();

        let sent = mock.cash_ins.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0.as_deref(), Some("parking-7-1"));
        assert_eq!(sent[0].1["amount"], json!(38));
        assert_eq!(sent[0].1["number"], json!("0788123456"));
        // Token cached across calls.
        assert_eq!(mock.authorizations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn status_lookup_maps_gateway_words() {
        let (_mock, gateway) = spawn_mock().await;
        assert_eq!(
            gateway.transaction_status("PP-1").await.unwrap(),
            GatewayStatus::Successful
        );
        assert_eq!(
            gateway.transaction_status("PP-2").await.unwrap(),
            GatewayStatus::Failed("failed".into())
        );
        assert!(matches!(
            gateway.transaction_status("PP-404").await,
            Err(GatewayError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn client_errors_reject_and_server_errors_are_retryable() {
        let (mock, gateway) = spawn_mock().await;

        *mock.fail_cash_in.lock().unwrap() = Some(AxumStatus::BAD_REQUEST);
        let rejected = gateway.cash_in(&request(dec!(10))).await.unwrap_err();
        assert!(matches!(&rejected, GatewayError::Rejected(m) if m.contains("insufficient balance")));
        assert!(!rejected.is_retryable());

        *mock.fail_cash_in.lock().unwrap() = Some(AxumStatus::BAD_GATEWAY);
        let outage = gateway.cash_in(&request(dec!(10))).await.unwrap_err();
        assert!(outage.is_retryable());
    }

    #[tokio::test]
    async fn unreachable_gateway_is_transport_error() {
        let gateway = HttpPaymentGateway::new(HttpGatewayConfig {
            base_url: "http://127.0.0.1:1".into(),
            client_id: "id".into(),
            client_secret: "secret".into(),
            timeout: Duration::from_secs(2),
            country_prefix: "+250".into(),
            webhook_mode: Some("development".into()),
        })
        .unwrap();
        let err = gateway.transaction_status("PP-1").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
