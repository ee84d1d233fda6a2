//! On-chain ERC20 allowance lookup
//!
//! One raw `eth_call` per spender against the configured JSON-RPC endpoint.
//! No retries; the caller decides what a failure means.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use ethers::types::{Address, U256};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// `allowance(address,address)`
pub const ALLOWANCE_SELECTOR: &str = "0xdd62ed3e";
pub const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of ERC20 allowances
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AllowanceLookup: Send + Sync {
    /// Amount `spender` may draw from `owner`'s balance of `token`
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;
}

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, Value>,
}

/// Minimal JSON-RPC client
pub struct RpcClient {
    client: Client,
    url: String,
}

impl RpcClient {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(RPC_TIMEOUT)
            .build()
            .context("Failed to create RPC client")?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn eth_call(&self, to: Address, data: &str) -> Result<String> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "eth_call",
            params: json!([{ "to": format!("{:#x}", to), "data": data }, "latest"]),
        };

        debug!(to = %format!("{:#x}", to), "eth_call");

        let response: RpcResponse = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("RPC request to {} failed", self.url))?
            .json()
            .await
            .context("Failed to parse RPC response")?;

        response
            .result
            .ok_or_else(|| anyhow!("rpc error: {}", Value::Object(response.rest)))
    }
}

#[async_trait]
impl AllowanceLookup for RpcClient {
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let data = encode_allowance_call(owner, spender);
        let result = self.eth_call(token, &data).await?;
        parse_uint256(&result)
    }
}

/// Left-pad an address to one 32-byte ABI word
fn pad_address(address: Address) -> String {
    format!("{:0>64}", hex::encode(address.as_bytes()))
}

/// Selector followed by the owner and spender words
pub fn encode_allowance_call(owner: Address, spender: Address) -> String {
    format!(
        "{}{}{}",
        ALLOWANCE_SELECTOR,
        pad_address(owner),
        pad_address(spender)
    )
}

/// Parse a hex-encoded uint256 result.
///
/// An empty `0x` result means the token address has no code, which is an
/// error rather than a zero allowance.
pub fn parse_uint256(raw: &str) -> Result<U256> {
    let digits = raw.trim().trim_start_matches("0x");
    if digits.is_empty() {
        bail!("empty eth_call result (no contract at token address?)");
    }
    U256::from_str_radix(digits, 16).map_err(|e| anyhow!("invalid uint256 result {}: {:?}", raw, e))
}
