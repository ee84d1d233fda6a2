//! EIP-712 Signing for Polymarket CLOB
//!
//! Implements gasless order signing as per Polymarket specification,
//! plus the L1 (`/auth/*`) and L2 (HMAC) request signatures.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip712::{EIP712Domain, Eip712DomainType, TypedData, Types};
use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde_json::Value;
use sha2::Sha256;

use super::types::{OrderArgs, OrderType, Side, SignedOrder};
use crate::error::ConfigError;

const POLYMARKET_CTF_EXCHANGE_DOMAIN: &str = "Polymarket CTF Exchange";
const CLOB_AUTH_DOMAIN: &str = "ClobAuthDomain";
const DOMAIN_VERSION: &str = "1";
const CLOB_AUTH_MESSAGE: &str = "This message attests that I control the given wallet";

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Share sizes are quoted with two decimals on the CLOB.
const SIZE_DECIMALS: u32 = 2;
/// Collateral and conditional tokens both use 6 decimals on-chain.
const TOKEN_SCALE: Decimal = dec!(1000000);

/// Exchange and collateral contracts for a supported chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractConfig {
    pub exchange: Address,
    /// Exchange that settles neg-risk (multi-outcome) markets
    pub neg_risk_exchange: Address,
    pub collateral: Address,
}

impl ContractConfig {
    /// EIP-712 verifying contract for an order on a market of the given kind
    pub fn order_exchange(&self, neg_risk: bool) -> Address {
        if neg_risk {
            self.neg_risk_exchange
        } else {
            self.exchange
        }
    }
}

/// Contract addresses from the official Polymarket client config.
pub fn contract_config(chain_id: u64) -> Result<ContractConfig, ConfigError> {
    let (exchange, neg_risk_exchange, collateral) = match chain_id {
        // Polygon mainnet: CTF Exchange, Neg Risk CTF Exchange, USDC.e
        137 => (
            "0x4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E",
            "0xC5d563A36AE78145C45a50134d48A1215220f80a",
            "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174",
        ),
        // Amoy testnet
        80002 => (
            "0xdFE02Eb6733538f8Ea35D585af8DE5958AD99E40",
            "0xd91E80cF2E7be2e162c6513ceD06f1dD0dA35296",
            "0x9c4e1703476e875070ee25b56a58b008cfb8fa78",
        ),
        _ => return Err(ConfigError::UnsupportedChain(chain_id)),
    };
    let parse = |raw: &str| -> Result<Address, ConfigError> {
        raw.parse().map_err(|_| ConfigError::UnsupportedChain(chain_id))
    };
    Ok(ContractConfig {
        exchange: parse(exchange)?,
        neg_risk_exchange: parse(neg_risk_exchange)?,
        collateral: parse(collateral)?,
    })
}

fn decimals_of(value: Decimal) -> u32 {
    value.normalize().scale()
}

/// Round a notional to the venue's amount precision the way the official
/// client does: round up at `amount + 4` first, and only truncate if the
/// result still carries too many decimals.
fn fit_amount(raw: Decimal, amount_decimals: u32) -> Decimal {
    if decimals_of(raw) <= amount_decimals {
        return raw;
    }
    let widened = raw.round_dp_with_strategy(amount_decimals + 4, RoundingStrategy::AwayFromZero);
    if decimals_of(widened) <= amount_decimals {
        widened
    } else {
        widened.round_dp_with_strategy(amount_decimals, RoundingStrategy::ToZero)
    }
}

fn to_token_units(amount: Decimal) -> Result<U256> {
    let scaled = (amount * TOKEN_SCALE)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_u128()
        .with_context(|| format!("Amount {} cannot be expressed in token units", amount))?;
    Ok(U256::from(scaled))
}

/// Maker/taker amounts in token units for an order at `price` x `size`.
///
/// BUY -> makerAmount: USDC notional, takerAmount: shares.
/// SELL -> makerAmount: shares, takerAmount: USDC notional.
pub fn order_amounts(
    side: Side,
    price: Decimal,
    size: Decimal,
    tick_size: Decimal,
) -> Result<(U256, U256)> {
    let price_decimals = decimals_of(tick_size);
    let amount_decimals = price_decimals + SIZE_DECIMALS;

    let price = price.round_dp_with_strategy(price_decimals, RoundingStrategy::MidpointNearestEven);
    let shares = size.round_dp_with_strategy(SIZE_DECIMALS, RoundingStrategy::ToZero);
    let notional = fit_amount(shares * price, amount_decimals);

    let shares = to_token_units(shares)?;
    let notional = to_token_units(notional)?;
    Ok(match side {
        Side::Buy => (notional, shares),
        Side::Sell => (shares, notional),
    })
}

/// Maker/taker amounts for a marketable FOK/FAK order.
///
/// The venue only accepts two decimals on the maker side of these orders, so
/// a BUY pays a notional truncated to cents and receives `notional / price`
/// shares. SELL already has the shares on the maker side.
pub fn market_order_amounts(
    side: Side,
    price: Decimal,
    size: Decimal,
    tick_size: Decimal,
) -> Result<(U256, U256)> {
    let price_decimals = decimals_of(tick_size);
    let amount_decimals = price_decimals + SIZE_DECIMALS;

    let price = price.round_dp_with_strategy(price_decimals, RoundingStrategy::MidpointNearestEven);
    let shares = size.round_dp_with_strategy(SIZE_DECIMALS, RoundingStrategy::ToZero);

    match side {
        Side::Buy => {
            let notional = (shares * price).round_dp_with_strategy(SIZE_DECIMALS, RoundingStrategy::ToZero);
            let bought = notional
                .checked_div(price)
                .with_context(|| format!("Cannot size a market order at price {}", price))?;
            Ok((
                to_token_units(notional)?,
                to_token_units(fit_amount(bought, amount_decimals))?,
            ))
        }
        Side::Sell => Ok((
            to_token_units(shares)?,
            to_token_units(fit_amount(shares * price, amount_decimals))?,
        )),
    }
}

/// Reject prices outside `[tick, 1 - tick]`.
pub fn validate_price(price: Decimal, tick_size: Decimal) -> Result<()> {
    if price < tick_size || price > Decimal::ONE - tick_size {
        bail!(
            "price ({}), min: {} - max: {}",
            price,
            tick_size,
            Decimal::ONE - tick_size
        );
    }
    Ok(())
}

fn order_typed_data(order: &SignedOrder, chain_id: u64, exchange: Address) -> Result<TypedData> {
    let token_id = U256::from_dec_str(&order.token_id)
        .with_context(|| format!("Invalid token_id '{}' for order signing", order.token_id))?;

    let domain = EIP712Domain {
        name: Some(POLYMARKET_CTF_EXCHANGE_DOMAIN.to_string()),
        version: Some(DOMAIN_VERSION.to_string()),
        chain_id: Some(chain_id.into()),
        verifying_contract: Some(exchange),
        salt: None,
    };

    let field = |name: &str, ty: &str| Eip712DomainType {
        name: name.to_string(),
        r#type: ty.to_string(),
    };
    let mut types: Types = BTreeMap::new();
    types.insert(
        "Order".to_string(),
        vec![
            field("salt", "uint256"),
            field("maker", "address"),
            field("signer", "address"),
            field("taker", "address"),
            field("tokenId", "uint256"),
            field("makerAmount", "uint256"),
            field("takerAmount", "uint256"),
            field("expiration", "uint256"),
            field("nonce", "uint256"),
            field("feeRateBps", "uint256"),
            field("side", "uint8"),
            field("signatureType", "uint8"),
        ],
    );

    let mut message = BTreeMap::<String, Value>::new();
    message.insert("salt".to_string(), Value::String(order.salt.to_string()));
    message.insert("maker".to_string(), Value::String(order.maker.clone()));
    message.insert("signer".to_string(), Value::String(order.signer.clone()));
    message.insert("taker".to_string(), Value::String(order.taker.clone()));
    message.insert("tokenId".to_string(), Value::String(token_id.to_string()));
    message.insert(
        "makerAmount".to_string(),
        Value::String(order.maker_amount.clone()),
    );
    message.insert(
        "takerAmount".to_string(),
        Value::String(order.taker_amount.clone()),
    );
    message.insert(
        "expiration".to_string(),
        Value::String(order.expiration.clone()),
    );
    message.insert("nonce".to_string(), Value::String(order.nonce.clone()));
    message.insert(
        "feeRateBps".to_string(),
        Value::String(order.fee_rate_bps.clone()),
    );
    message.insert(
        "side".to_string(),
        Value::from(match order.side {
            Side::Buy => 0_u8,
            Side::Sell => 1_u8,
        }),
    );
    message.insert(
        "signatureType".to_string(),
        Value::from(order.signature_type),
    );

    Ok(TypedData {
        domain,
        types,
        primary_type: "Order".to_string(),
        message,
    })
}

fn hex_signature(sig: String) -> String {
    if sig.starts_with("0x") {
        sig
    } else {
        format!("0x{}", sig)
    }
}

/// Build and sign an order using EIP-712.
///
/// `maker` is the funding account (proxy wallet or the signer itself); the
/// wallet's own address always goes in `signer`. Neg-risk markets are signed
/// against the neg-risk exchange.
pub async fn sign_order(
    args: &OrderArgs,
    wallet: &LocalWallet,
    maker: Address,
    signature_type: u8,
    tick_size: Decimal,
    neg_risk: bool,
    chain_id: u64,
) -> Result<SignedOrder> {
    let contracts = contract_config(chain_id)?;
    let (maker_amount, taker_amount) = match args.order_type {
        OrderType::Gtc => order_amounts(args.side, args.price, args.size, tick_size)?,
        OrderType::Fok | OrderType::Fak => {
            market_order_amounts(args.side, args.price, args.size, tick_size)?
        }
    };

    let mut order = SignedOrder {
        salt: rand::random::<u32>() as u64,
        maker: to_checksum(&maker, None),
        signer: to_checksum(&wallet.address(), None),
        taker: ZERO_ADDRESS.to_string(),
        token_id: args.token_id.clone(),
        maker_amount: maker_amount.to_string(),
        taker_amount: taker_amount.to_string(),
        expiration: "0".to_string(),
        nonce: "0".to_string(),
        fee_rate_bps: "0".to_string(),
        side: args.side,
        signature_type,
        signature: String::new(),
    };

    let typed = order_typed_data(&order, chain_id, contracts.order_exchange(neg_risk))?;
    let signature = wallet
        .sign_typed_data(&typed)
        .await
        .context("Failed to sign order typed data")?;
    order.signature = hex_signature(signature.to_string());

    Ok(order)
}

/// Create L1 signature for `/auth/*` endpoints.
pub async fn create_l1_signature(
    wallet: &LocalWallet,
    chain_id: u64,
    timestamp: i64,
    nonce: u64,
) -> Result<String> {
    let domain = EIP712Domain {
        name: Some(CLOB_AUTH_DOMAIN.to_string()),
        version: Some(DOMAIN_VERSION.to_string()),
        chain_id: Some(chain_id.into()),
        verifying_contract: None,
        salt: None,
    };

    let mut types: Types = BTreeMap::new();
    types.insert(
        "ClobAuth".to_string(),
        vec![
            Eip712DomainType {
                name: "address".to_string(),
                r#type: "address".to_string(),
            },
            Eip712DomainType {
                name: "timestamp".to_string(),
                r#type: "string".to_string(),
            },
            Eip712DomainType {
                name: "nonce".to_string(),
                r#type: "uint256".to_string(),
            },
            Eip712DomainType {
                name: "message".to_string(),
                r#type: "string".to_string(),
            },
        ],
    );

    let mut message = BTreeMap::<String, Value>::new();
    message.insert(
        "address".to_string(),
        Value::String(format!("{:#x}", wallet.address())),
    );
    message.insert(
        "timestamp".to_string(),
        Value::String(timestamp.to_string()),
    );
    message.insert("nonce".to_string(), Value::String(nonce.to_string()));
    message.insert(
        "message".to_string(),
        Value::String(CLOB_AUTH_MESSAGE.to_string()),
    );

    let typed = TypedData {
        domain,
        types,
        primary_type: "ClobAuth".to_string(),
        message,
    };
    let sig = wallet
        .sign_typed_data(&typed)
        .await
        .context("Failed to sign L1 auth typed data")?;
    Ok(hex_signature(sig.to_string()))
}

/// Create L2 HMAC signature for authenticated CLOB REST requests.
pub fn create_l2_signature(
    api_secret: &str,
    timestamp: i64,
    method: &str,
    request_path: &str,
    body: Option<&str>,
) -> Result<String> {
    let secret_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(api_secret)
        .or_else(|_| general_purpose::URL_SAFE.decode(api_secret))
        .context("Failed decoding API secret as url-safe base64")?;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(&secret_bytes).context("Failed to initialize HMAC")?;
    let payload = format!(
        "{}{}{}{}",
        timestamp,
        method.to_uppercase(),
        request_path,
        body.unwrap_or("")
    );
    mac.update(payload.as_bytes());
    Ok(general_purpose::URL_SAFE.encode(mac.finalize().into_bytes()))
}
