//! Polymarket CLOB Client
//!
//! Thin facade over the Polymarket CLOB API:
//! - EIP-712 order signing and L1/L2 request authentication
//! - Order book and market listing
//! - Order posting and cancellation
//! - Balance/allowance queries
//!
//! Everything the command layer needs goes through the [`Exchange`] trait so
//! the sizing and diagnostics engines can be exercised without a network.

pub mod rest;
pub mod signing;
pub mod types;

pub use rest::*;
pub use signing::*;
pub use types::*;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::config::CliConfig;
use crate::error::ConfigError;

/// Capabilities the CLI consumes from the exchange. Every call is potentially
/// slow, fallible network I/O.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn get_order_book(&self, token_id: &str) -> Result<OrderBookSnapshot>;

    async fn get_market(&self, condition_id: &str) -> Result<Value>;

    async fn get_simplified_markets(&self, cursor: Option<String>) -> Result<MarketsPage>;

    async fn get_sampling_simplified_markets(&self, cursor: Option<String>)
        -> Result<MarketsPage>;

    async fn create_order(&self, args: &OrderArgs) -> Result<SignedOrder>;

    async fn post_order(&self, order: &SignedOrder, order_type: OrderType) -> Result<Value>;

    async fn cancel_order(&self, order_id: &str) -> Result<Value>;

    async fn cancel_all(&self) -> Result<Value>;

    async fn get_balance_allowance(
        &self,
        params: &BalanceAllowanceParams,
    ) -> Result<BalanceAllowance>;

    async fn update_balance_allowance(&self, params: &BalanceAllowanceParams) -> Result<Value>;

    /// Signer, funder and contract addresses this client trades with
    fn identity(&self) -> Identity;
}

/// Polymarket CLOB client configuration
#[derive(Clone)]
pub struct ClobConfig {
    /// CLOB REST API endpoint
    pub rest_url: String,
    /// Polygon chain ID (137)
    pub chain_id: u64,
    /// Private key for signing
    pub private_key: Option<String>,
    /// Expected signer address, checked against the key
    pub expected_signer: Option<String>,
    /// Proxy wallet funding the orders
    pub funder: Option<String>,
    /// Signature type (0=EOA, 1=Proxy, 2=Safe)
    pub signature_type: Option<u8>,
    /// Pre-issued L2 credentials
    pub api_creds: Option<ApiCreds>,
}

impl Default for ClobConfig {
    fn default() -> Self {
        Self {
            rest_url: "https://clob.polymarket.com".to_string(),
            chain_id: 137, // Polygon
            private_key: None,
            expected_signer: None,
            funder: None,
            signature_type: None,
            api_creds: None,
        }
    }
}

impl From<&CliConfig> for ClobConfig {
    fn from(cfg: &CliConfig) -> Self {
        let api_creds = match (&cfg.api_key, &cfg.api_secret, &cfg.api_passphrase) {
            (Some(api_key), Some(api_secret), Some(api_passphrase)) => Some(ApiCreds {
                api_key: api_key.clone(),
                api_secret: api_secret.clone(),
                api_passphrase: api_passphrase.clone(),
            }),
            _ => None,
        };

        Self {
            rest_url: cfg.host.clone(),
            chain_id: cfg.chain_id,
            private_key: cfg.key.clone(),
            expected_signer: cfg.signer.clone(),
            funder: cfg.funder.clone(),
            signature_type: cfg.sig_type,
            api_creds,
        }
    }
}

/// Signing half of an authenticated client
struct Signing {
    wallet: LocalWallet,
}

/// Main CLOB client
pub struct ClobClient {
    config: ClobConfig,
    contracts: ContractConfig,
    rest: RestClient,
    funder: Option<Address>,
    signing: Option<Signing>,
}

fn parse_address(name: &'static str, value: &str) -> Result<Address, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidAddress {
        name,
        value: value.to_string(),
    })
}

/// Parse the private key and make sure it matches the expected signer, if any.
pub fn load_wallet(
    private_key: Option<&str>,
    expected_signer: Option<&str>,
) -> Result<LocalWallet, ConfigError> {
    let key = private_key
        .filter(|k| !k.trim().is_empty())
        .ok_or(ConfigError::MissingKey)?;
    let wallet: LocalWallet = key.trim().parse().map_err(|_| ConfigError::InvalidKey)?;

    if let Some(expected) = expected_signer {
        let expected_addr = parse_address("POLYMARKET_SIGNER", expected)?;
        if expected_addr != wallet.address() {
            return Err(ConfigError::SignerMismatch {
                expected: expected.to_string(),
                derived: ethers::utils::to_checksum(&wallet.address(), None),
            });
        }
    }
    Ok(wallet)
}

impl ClobClient {
    /// Client for public market-data endpoints only
    pub fn public(config: impl Into<ClobConfig>) -> Result<Self> {
        let config = config.into();
        let contracts = contract_config(config.chain_id)?;
        let funder = config
            .funder
            .as_deref()
            .map(|f| parse_address("POLYMARKET_FUNDER", f))
            .transpose()?;
        let rest = RestClient::new(&config.rest_url)?;

        Ok(Self {
            config,
            contracts,
            rest,
            funder,
            signing: None,
        })
    }

    /// Authenticated client: loads the wallet, checks the expected signer and
    /// obtains L2 credentials (configured, or created/derived via `/auth`).
    pub async fn connect(config: impl Into<ClobConfig>) -> Result<Self> {
        let mut client = Self::public(config)?;
        let wallet = load_wallet(
            client.config.private_key.as_deref(),
            client.config.expected_signer.as_deref(),
        )?;

        let creds = match client.config.api_creds.clone() {
            Some(creds) => creds,
            None => client
                .rest
                .create_or_derive_api_credentials(&wallet, client.config.chain_id)
                .await
                .map_err(|e| ConfigError::ClientInit(format!("{:#}", e)))?,
        };

        let rest = RestClient::new(&client.config.rest_url)?;
        client.rest = rest.with_credentials(wallet.address(), creds);
        tracing::debug!(
            address = %format!("{:#x}", wallet.address()),
            chain_id = client.config.chain_id,
            "Authenticated CLOB client ready"
        );
        client.signing = Some(Signing { wallet });
        Ok(client)
    }

    /// Signer address, if authenticated
    pub fn get_address(&self) -> Option<Address> {
        self.signing.as_ref().map(|s| s.wallet.address())
    }

    pub fn get_collateral_address(&self) -> Address {
        self.contracts.collateral
    }

    pub fn get_exchange_address(&self) -> Address {
        self.contracts.exchange
    }

    fn signing(&self) -> Result<&Signing> {
        self.signing
            .as_ref()
            .context("This command requires an authenticated client (POLYMARKET_KEY)")
    }

    async fn tick_size(&self, token_id: &str) -> Result<Decimal> {
        self.rest
            .get_tick_size(token_id)
            .await
            .context("Failed to fetch tick size")
    }

    async fn neg_risk(&self, token_id: &str) -> Result<bool> {
        self.rest
            .get_neg_risk(token_id)
            .await
            .context("Failed to fetch neg-risk flag")
    }

    fn with_default_signature_type(&self, params: &BalanceAllowanceParams) -> BalanceAllowanceParams {
        let mut params = params.clone();
        if params.signature_type.is_none() {
            params.signature_type = Some(self.config.signature_type.unwrap_or(0));
        }
        params
    }
}

#[async_trait]
impl Exchange for ClobClient {
    async fn get_order_book(&self, token_id: &str) -> Result<OrderBookSnapshot> {
        self.rest.get_order_book(token_id).await
    }

    async fn get_market(&self, condition_id: &str) -> Result<Value> {
        self.rest.get_market(condition_id).await
    }

    async fn get_simplified_markets(&self, cursor: Option<String>) -> Result<MarketsPage> {
        self.rest.get_simplified_markets(cursor.as_deref()).await
    }

    async fn get_sampling_simplified_markets(
        &self,
        cursor: Option<String>,
    ) -> Result<MarketsPage> {
        self.rest
            .get_sampling_simplified_markets(cursor.as_deref())
            .await
    }

    async fn create_order(&self, args: &OrderArgs) -> Result<SignedOrder> {
        let signing = self.signing()?;
        let tick_size = self.tick_size(&args.token_id).await?;
        validate_price(args.price, tick_size)?;

        let neg_risk = self.neg_risk(&args.token_id).await?;

        let maker = self.funder.unwrap_or_else(|| signing.wallet.address());
        sign_order(
            args,
            &signing.wallet,
            maker,
            self.config.signature_type.unwrap_or(0),
            tick_size,
            neg_risk,
            self.config.chain_id,
        )
        .await
    }

    async fn post_order(&self, order: &SignedOrder, order_type: OrderType) -> Result<Value> {
        self.signing()?;
        self.rest.post_order(order, order_type).await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<Value> {
        self.signing()?;
        self.rest.cancel_order(order_id).await
    }

    async fn cancel_all(&self) -> Result<Value> {
        self.signing()?;
        self.rest.cancel_all().await
    }

    async fn get_balance_allowance(
        &self,
        params: &BalanceAllowanceParams,
    ) -> Result<BalanceAllowance> {
        self.signing()?;
        self.rest
            .get_balance_allowance(&self.with_default_signature_type(params))
            .await
    }

    async fn update_balance_allowance(&self, params: &BalanceAllowanceParams) -> Result<Value> {
        self.signing()?;
        self.rest
            .update_balance_allowance(&self.with_default_signature_type(params))
            .await
    }

    fn identity(&self) -> Identity {
        Identity {
            address: self.get_address(),
            funder: self.funder,
            signature_type: self.config.signature_type,
            host: self.rest.base_url().to_string(),
            chain_id: self.config.chain_id,
            collateral: self.get_collateral_address(),
            exchange: self.get_exchange_address(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0x59c6995e998f97a5a0044966f0945387dc9f5a59e86cdc84e64546a1d8f76d59";

    #[test]
    fn test_config_default() {
        let config = ClobConfig::default();
        assert_eq!(config.chain_id, 137);
        assert!(config.rest_url.contains("clob.polymarket.com"));
    }

    #[test]
    fn load_wallet_requires_key() {
        assert!(matches!(
            load_wallet(None, None),
            Err(ConfigError::MissingKey)
        ));
        assert!(matches!(
            load_wallet(Some("  "), None),
            Err(ConfigError::MissingKey)
        ));
        assert!(matches!(
            load_wallet(Some("not-a-key"), None),
            Err(ConfigError::InvalidKey)
        ));
    }

    #[test]
    fn load_wallet_checks_expected_signer_case_insensitively() {
        let wallet = load_wallet(Some(TEST_KEY), None).unwrap();
        let lower = format!("{:#x}", wallet.address());
        let upper = format!("0x{}", lower.trim_start_matches("0x").to_uppercase());

        assert!(load_wallet(Some(TEST_KEY), Some(&lower)).is_ok());
        assert!(load_wallet(Some(TEST_KEY), Some(&upper)).is_ok());

        let err = load_wallet(
            Some(TEST_KEY),
            Some("0x1111111111111111111111111111111111111111"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::SignerMismatch { .. }));
    }

    #[test]
    fn public_client_identity_has_no_signer() {
        let config = ClobConfig {
            funder: Some("0x1111111111111111111111111111111111111111".to_string()),
            signature_type: Some(1),
            ..Default::default()
        };
        let client = ClobClient::public(config).unwrap();
        let who = client.identity();

        assert!(who.address.is_none());
        assert_eq!(who.owner(), who.funder);
        assert_eq!(who.chain_id, 137);
        assert_eq!(who.exchange, contract_config(137).unwrap().exchange);
    }

    #[test]
    fn public_client_rejects_bad_funder() {
        let config = ClobConfig {
            funder: Some("nope".to_string()),
            ..Default::default()
        };
        assert!(ClobClient::public(config).is_err());
    }

    #[tokio::test]
    async fn authenticated_calls_fail_without_wallet() {
        let client = ClobClient::public(ClobConfig::default()).unwrap();
        assert!(client.cancel_all().await.is_err());
        assert!(client
            .get_balance_allowance(&BalanceAllowanceParams::collateral())
            .await
            .is_err());
    }

    #[tokio::test]
    #[ignore = "Live network smoke test against the CLOB API"]
    async fn smoke_fetch_sampling_markets_live() {
        let client = ClobClient::public(ClobConfig::default()).unwrap();
        let page = client
            .get_sampling_simplified_markets(None)
            .await
            .expect("sampling markets should load");
        assert!(!page.data.is_empty());
    }
}
