//! CLOB REST API Client
//!
//! Handles HTTP communication with Polymarket CLOB API
//! Endpoints documented at: https://docs.polymarket.com/developers/CLOB/clients/methods-public

use anyhow::{Context, Result};
use chrono::Utc;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client, RequestBuilder,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

use super::signing::{create_l1_signature, create_l2_signature};
use super::types::{
    BalanceAllowance, BalanceAllowanceParams, MarketsPage, OrderBookSnapshot, OrderType,
    SignedOrder,
};
use crate::error::UpstreamError;

/// Cursor the sampling endpoint expects for its first page.
pub const INITIAL_CURSOR: &str = "MA==";

/// Level-2 API credentials
#[derive(Clone)]
pub struct ApiCreds {
    pub api_key: String,
    pub api_secret: String,
    pub api_passphrase: String,
}

impl std::fmt::Debug for ApiCreds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCreds")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
struct L2Auth {
    address: Address,
    creds: ApiCreds,
}

/// REST API client for Polymarket CLOB
pub struct RestClient {
    client: Client,
    base_url: String,
    auth: Option<L2Auth>,
}

impl RestClient {
    /// Create a new unauthenticated REST client
    pub fn new(base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: None,
        })
    }

    /// Attach L2 credentials for authenticated endpoints
    pub fn with_credentials(mut self, address: Address, creds: ApiCreds) -> Self {
        self.auth = Some(L2Auth { address, creds });
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&str> {
        self.auth.as_ref().map(|auth| auth.creds.api_key.as_str())
    }

    fn build_l2_headers(&self, method: &str, request_path: &str, body: &str) -> Result<HeaderMap> {
        let auth = self
            .auth
            .as_ref()
            .context("API credentials not configured for authenticated CLOB requests")?;

        let timestamp = Utc::now().timestamp();
        let signature = create_l2_signature(
            &auth.creds.api_secret,
            timestamp,
            method,
            request_path,
            Some(body),
        )?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "POLY_ADDRESS",
            HeaderValue::from_str(&format!("{:#x}", auth.address))
                .context("Invalid POLY_ADDRESS header value")?,
        );
        headers.insert(
            "POLY_SIGNATURE",
            HeaderValue::from_str(&signature).context("Invalid POLY_SIGNATURE header value")?,
        );
        headers.insert(
            "POLY_TIMESTAMP",
            HeaderValue::from_str(&timestamp.to_string())
                .context("Invalid POLY_TIMESTAMP header value")?,
        );
        headers.insert(
            "POLY_API_KEY",
            HeaderValue::from_str(&auth.creds.api_key)
                .context("Invalid POLY_API_KEY header value")?,
        );
        headers.insert(
            "POLY_PASSPHRASE",
            HeaderValue::from_str(&auth.creds.api_passphrase)
                .context("Invalid POLY_PASSPHRASE header value")?,
        );
        Ok(headers)
    }

    fn build_l1_headers(
        address: Address,
        signature: &str,
        timestamp: i64,
        nonce: u64,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "POLY_ADDRESS",
            HeaderValue::from_str(&format!("{:#x}", address))
                .context("Invalid POLY_ADDRESS for L1 auth")?,
        );
        headers.insert(
            "POLY_SIGNATURE",
            HeaderValue::from_str(signature).context("Invalid POLY_SIGNATURE for L1 auth")?,
        );
        headers.insert(
            "POLY_TIMESTAMP",
            HeaderValue::from_str(&timestamp.to_string())
                .context("Invalid POLY_TIMESTAMP for L1 auth")?,
        );
        headers.insert(
            "POLY_NONCE",
            HeaderValue::from_str(&nonce.to_string()).context("Invalid POLY_NONCE for L1 auth")?,
        );
        Ok(headers)
    }

    fn extract_l2_credentials(raw: &Value) -> Result<ApiCreds> {
        fn pick(value: &Value, candidates: &[&str]) -> Option<String> {
            for key in candidates {
                if let Some(v) = value.get(*key).and_then(|v| v.as_str()) {
                    if !v.trim().is_empty() {
                        return Some(v.to_string());
                    }
                }
            }
            None
        }

        let data = raw.get("data").unwrap_or(raw);
        Ok(ApiCreds {
            api_key: pick(data, &["apiKey", "api_key", "key", "id"])
                .context("Missing api key in auth response")?,
            api_secret: pick(data, &["secret", "apiSecret", "api_secret"])
                .context("Missing api secret in auth response")?,
            api_passphrase: pick(data, &["passphrase", "apiPassphrase", "api_passphrase"])
                .context("Missing passphrase in auth response")?,
        })
    }

    /// Send a request and decode the JSON body, surfacing non-2xx replies
    /// as [`UpstreamError`]. An empty body decodes as JSON `null`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", endpoint))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read {} response", endpoint))?;

        if !status.is_success() {
            return Err(UpstreamError {
                endpoint: endpoint.to_string(),
                status,
                body: text,
            }
            .into());
        }

        let body = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(body).with_context(|| format!("Failed to parse {} response", endpoint))
    }

    /// Create or derive L2 API credentials using L1 signed auth endpoints.
    /// Flow:
    /// 1) POST /auth/api-key
    /// 2) fallback GET /auth/derive-api-key
    pub async fn create_or_derive_api_credentials(
        &self,
        wallet: &LocalWallet,
        chain_id: u64,
    ) -> Result<ApiCreds> {
        let timestamp = Utc::now().timestamp();
        let nonce = 0;
        let signature = create_l1_signature(wallet, chain_id, timestamp, nonce).await?;
        let headers = Self::build_l1_headers(wallet.address(), &signature, timestamp, nonce)?;

        let create_url = format!("{}/auth/api-key", self.base_url);
        let created: Result<Value> = self
            .send_json(
                self.client.post(&create_url).headers(headers.clone()).body("{}"),
                "POST /auth/api-key",
            )
            .await;

        let create_err = match created {
            Ok(raw) => return Self::extract_l2_credentials(&raw),
            Err(e) => e,
        };
        tracing::debug!(error = %create_err, "API key creation failed; deriving existing key");

        let derive_url = format!("{}/auth/derive-api-key", self.base_url);
        let raw: Value = self
            .send_json(
                self.client.get(&derive_url).headers(headers),
                "GET /auth/derive-api-key",
            )
            .await
            .with_context(|| format!("L1 auth endpoints failed. create: {}", create_err))?;
        Self::extract_l2_credentials(&raw)
    }

    /// Get order book for a token
    pub async fn get_order_book(&self, token_id: &str) -> Result<OrderBookSnapshot> {
        let url = format!("{}/book?token_id={}", self.base_url, token_id);
        self.send_json(self.client.get(&url), "GET /book").await
    }

    /// Minimum tick size for a token
    /// Endpoint: GET /tick-size?token_id={id}
    pub async fn get_tick_size(&self, token_id: &str) -> Result<Decimal> {
        let url = format!("{}/tick-size?token_id={}", self.base_url, token_id);

        #[derive(serde::Deserialize)]
        struct TickSizeResponse {
            minimum_tick_size: Decimal,
        }

        let resp: TickSizeResponse = self.send_json(self.client.get(&url), "GET /tick-size").await?;
        Ok(resp.minimum_tick_size)
    }

    /// Whether a token trades on a neg-risk market
    /// Endpoint: GET /neg-risk?token_id={id}
    pub async fn get_neg_risk(&self, token_id: &str) -> Result<bool> {
        let url = format!("{}/neg-risk?token_id={}", self.base_url, token_id);

        #[derive(serde::Deserialize)]
        struct NegRiskResponse {
            neg_risk: bool,
        }

        let resp: NegRiskResponse = self.send_json(self.client.get(&url), "GET /neg-risk").await?;
        Ok(resp.neg_risk)
    }

    /// Get market by condition ID
    pub async fn get_market(&self, condition_id: &str) -> Result<Value> {
        let url = format!("{}/markets/{}", self.base_url, condition_id);
        self.send_json(self.client.get(&url), "GET /markets").await
    }

    /// Get a page of simplified markets
    pub async fn get_simplified_markets(&self, cursor: Option<&str>) -> Result<MarketsPage> {
        let url = match cursor {
            Some(cursor) => format!(
                "{}/simplified-markets?next_cursor={}",
                self.base_url, cursor
            ),
            None => format!("{}/simplified-markets", self.base_url),
        };
        self.send_json(self.client.get(&url), "GET /simplified-markets")
            .await
    }

    /// Get a page of sampling (reward-eligible) simplified markets
    pub async fn get_sampling_simplified_markets(&self, cursor: Option<&str>) -> Result<MarketsPage> {
        let url = format!(
            "{}/sampling-simplified-markets?next_cursor={}",
            self.base_url,
            cursor.unwrap_or(INITIAL_CURSOR)
        );
        self.send_json(self.client.get(&url), "GET /sampling-simplified-markets")
            .await
    }

    /// Post a signed order
    pub async fn post_order(&self, order: &SignedOrder, order_type: OrderType) -> Result<Value> {
        let request_path = "/order";
        let url = format!("{}{}", self.base_url, request_path);
        let owner = self
            .api_key()
            .context("API credentials not configured for order posting")?;

        let payload = json!({
            "order": order,
            "owner": owner,
            "orderType": order_type,
        });
        let body =
            serde_json::to_string(&payload).context("Failed to serialize post order payload")?;
        let headers = self.build_l2_headers("POST", request_path, &body)?;

        self.send_json(
            self.client.post(&url).headers(headers).body(body),
            "POST /order",
        )
        .await
    }

    /// Cancel an order
    pub async fn cancel_order(&self, order_id: &str) -> Result<Value> {
        let request_path = "/order";
        let url = format!("{}{}", self.base_url, request_path);
        let body = serde_json::to_string(&json!({ "orderID": order_id }))
            .context("Failed to serialize cancel payload")?;
        let headers = self.build_l2_headers("DELETE", request_path, &body)?;

        self.send_json(
            self.client.delete(&url).headers(headers).body(body),
            "DELETE /order",
        )
        .await
    }

    /// Cancel every open order of the authenticated account
    pub async fn cancel_all(&self) -> Result<Value> {
        let request_path = "/cancel-all";
        let url = format!("{}{}", self.base_url, request_path);
        let headers = self.build_l2_headers("DELETE", request_path, "")?;

        self.send_json(self.client.delete(&url).headers(headers), "DELETE /cancel-all")
            .await
    }

    /// Get balance and allowances. Only the path is signed, not the query.
    pub async fn get_balance_allowance(
        &self,
        params: &BalanceAllowanceParams,
    ) -> Result<BalanceAllowance> {
        let request_path = "/balance-allowance";
        let url = format!("{}{}{}", self.base_url, request_path, params.query_string());
        let headers = self.build_l2_headers("GET", request_path, "")?;

        self.send_json(self.client.get(&url).headers(headers), "GET /balance-allowance")
            .await
    }

    /// Ask the exchange to re-read balance and allowances from chain
    pub async fn update_balance_allowance(&self, params: &BalanceAllowanceParams) -> Result<Value> {
        let request_path = "/balance-allowance/update";
        let url = format!("{}{}{}", self.base_url, request_path, params.query_string());
        let headers = self.build_l2_headers("GET", request_path, "")?;

        self.send_json(
            self.client.get(&url).headers(headers),
            "GET /balance-allowance/update",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_credentials_accepts_nested_and_alias_keys() {
        let raw = json!({
            "data": { "apiKey": "k", "secret": "s", "passphrase": "p" }
        });
        let creds = RestClient::extract_l2_credentials(&raw).unwrap();
        assert_eq!(creds.api_key, "k");
        assert_eq!(creds.api_secret, "s");
        assert_eq!(creds.api_passphrase, "p");

        let raw = json!({ "api_key": "k2", "api_secret": "s2", "api_passphrase": "p2" });
        let creds = RestClient::extract_l2_credentials(&raw).unwrap();
        assert_eq!(creds.api_key, "k2");
    }

    #[test]
    fn extract_credentials_rejects_incomplete_response() {
        let raw = json!({ "apiKey": "k", "secret": "" });
        assert!(RestClient::extract_l2_credentials(&raw).is_err());
    }

    #[test]
    fn new_trims_trailing_slash() {
        let rest = RestClient::new("https://clob.polymarket.com/").unwrap();
        assert_eq!(rest.base_url(), "https://clob.polymarket.com");
        assert!(rest.api_key().is_none());
    }

    #[test]
    fn l2_headers_require_credentials() {
        let rest = RestClient::new("https://clob.polymarket.com").unwrap();
        assert!(rest.build_l2_headers("GET", "/balance-allowance", "").is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds = ApiCreds {
            api_key: "key".to_string(),
            api_secret: "very-secret".to_string(),
            api_passphrase: "pass".to_string(),
        };
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("very-secret"));
        assert!(!shown.contains("pass\""));
    }
}
