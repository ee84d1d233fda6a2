//! CLOB Types - Data structures for Polymarket CLOB API

use std::collections::BTreeMap;
use std::str::FromStr;

use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Order side (buy/sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Time-in-force of a posted order.
///
/// FOK and FAK are marketable and signed with market-order amounts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Good-til-cancelled
    #[default]
    Gtc,
    /// Fill-or-kill
    Fok,
    /// Fill-and-kill
    Fak,
}

/// Asset class for balance/allowance queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetType {
    Collateral,
    Conditional,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Collateral => "COLLATERAL",
            AssetType::Conditional => "CONDITIONAL",
        }
    }
}

/// Order book level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// Order book snapshot as returned by `GET /book`.
///
/// Levels are kept in the order the exchange sent them; consumers must not
/// assume they are sorted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub bids: Vec<BookLevel>,
    #[serde(default)]
    pub asks: Vec<BookLevel>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub min_order_size: Decimal,
    #[serde(default, deserialize_with = "string_or_number_opt")]
    pub tick_size: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal_opt")]
    pub last_trade_price: Option<Decimal>,
    #[serde(default)]
    pub neg_risk: Option<bool>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default, deserialize_with = "string_or_number_opt")]
    pub timestamp: Option<String>,
}

impl OrderBookSnapshot {
    /// Tick size as a decimal, if the exchange reported a parseable one
    pub fn tick_size_decimal(&self) -> Option<Decimal> {
        self.tick_size
            .as_deref()
            .and_then(|raw| parse_decimal(raw).ok())
    }
}

/// Collateral balance and per-spender allowances from the exchange's
/// off-chain ledger. Amounts are in 6-decimal token units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceAllowance {
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub balance: Decimal,
    #[serde(default, with = "u256_dec_map")]
    pub allowances: BTreeMap<String, U256>,
}

impl BalanceAllowance {
    /// Largest approved amount across all spenders, zero when none are listed
    pub fn max_allowance(&self) -> U256 {
        self.allowances
            .values()
            .copied()
            .max()
            .unwrap_or_else(U256::zero)
    }
}

/// Query parameters for `/balance-allowance` and `/balance-allowance/update`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceAllowanceParams {
    pub asset_type: Option<AssetType>,
    pub token_id: Option<String>,
    pub signature_type: Option<u8>,
}

impl BalanceAllowanceParams {
    pub fn collateral() -> Self {
        Self {
            asset_type: Some(AssetType::Collateral),
            ..Default::default()
        }
    }

    pub fn query_string(&self) -> String {
        let mut parts = Vec::new();
        if let Some(asset_type) = self.asset_type {
            parts.push(format!("asset_type={}", asset_type.as_str()));
        }
        if let Some(token_id) = &self.token_id {
            parts.push(format!("token_id={}", token_id));
        }
        if let Some(signature_type) = self.signature_type {
            parts.push(format!("signature_type={}", signature_type));
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!("?{}", parts.join("&"))
        }
    }
}

/// Unsigned order request
#[derive(Debug, Clone, PartialEq)]
pub struct OrderArgs {
    pub token_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side,
    pub order_type: OrderType,
}

/// Signed order in the shape `POST /order` expects
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedOrder {
    pub salt: u64,
    pub maker: String,
    pub signer: String,
    pub taker: String,
    pub token_id: String,
    pub maker_amount: String,
    pub taker_amount: String,
    pub expiration: String,
    pub nonce: String,
    pub fee_rate_bps: String,
    pub side: Side,
    pub signature_type: u8,
    pub signature: String,
}

/// One page of `/simplified-markets` or `/sampling-simplified-markets`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketsPage {
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Who this client trades as, and against which contracts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    #[serde(serialize_with = "checksum_opt")]
    pub address: Option<Address>,
    #[serde(serialize_with = "checksum_opt")]
    pub funder: Option<Address>,
    pub signature_type: Option<u8>,
    pub host: String,
    pub chain_id: u64,
    #[serde(serialize_with = "checksum")]
    pub collateral: Address,
    #[serde(serialize_with = "checksum")]
    pub exchange: Address,
}

impl Identity {
    /// Account whose collateral backs the orders: the funder when set, else the signer
    pub fn owner(&self) -> Option<Address> {
        self.funder.or(self.address)
    }
}

pub fn parse_decimal(raw: &str) -> Result<Decimal, rust_decimal::Error> {
    let raw = raw.trim();
    Decimal::from_str(raw).or_else(|_| Decimal::from_scientific(raw))
}

fn checksum<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_checksum(address, None))
}

fn checksum_opt<S: Serializer>(
    address: &Option<Address>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match address {
        Some(address) => checksum(address, serializer),
        None => serializer.serialize_none(),
    }
}

/// Decimal from a JSON string or number; null and "" map to None
fn lenient_decimal_opt<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_decimal(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
        Value::Number(n) => parse_decimal(&n.to_string())
            .map(Some)
            .map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!(
            "expected decimal, got {}",
            other
        ))),
    }
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_decimal_opt(deserializer)?.unwrap_or_default())
}

fn string_or_number_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Allowances are uint256 amounts; max approvals overflow any decimal type,
/// so they are carried as `U256` and written back as decimal strings.
mod u256_dec_map {
    use super::*;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<String, U256>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let as_strings: BTreeMap<&String, String> =
            map.iter().map(|(k, v)| (k, v.to_string())).collect();
        as_strings.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, U256>, D::Error> {
        let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
        raw.unwrap_or_default()
            .into_iter()
            .map(|(spender, value)| {
                let text = match &value {
                    Value::String(s) => s.trim().to_string(),
                    Value::Number(n) => n.to_string(),
                    other => {
                        return Err(serde::de::Error::custom(format!(
                            "invalid allowance for {}: {}",
                            spender, other
                        )))
                    }
                };
                let amount = if text.is_empty() {
                    U256::zero()
                } else {
                    U256::from_dec_str(&text).map_err(|e| {
                        serde::de::Error::custom(format!(
                            "invalid allowance for {}: {}",
                            spender, e
                        ))
                    })?
                };
                Ok((spender, amount))
            })
            .collect()
    }
}
