use clap::{ArgGroup, Args, Parser, Subcommand};
use rust_decimal::Decimal;

use crate::clob::{parse_decimal, AssetType, BalanceAllowanceParams, OrderType};

#[derive(Parser, Debug)]
#[command(name = "polyclob")]
#[command(author = "PolyBot Team")]
#[command(version)]
#[command(about = "Polymarket CLOB wrapper", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Exit with status 0 even when a command reports an error
    #[arg(long, global = true)]
    pub exit_zero: bool,

    /// Write logs to stderr as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List markets, or fetch one market by condition ID
    Markets(MarketsArgs),
    /// Show the order book for a token
    Orderbook {
        /// Token ID
        token_id: String,
    },
    /// Place a limit buy order
    Buy(OrderCmdArgs),
    /// Place a limit sell order
    Sell(OrderCmdArgs),
    /// Cancel one order or all open orders
    Cancel(CancelArgs),
    /// Best bid/ask and book parameters for a token
    Quote {
        /// Token ID
        token_id: String,
    },
    /// Buy as much as a USD budget allows
    BuyMax(BuyMaxArgs),
    /// Show balance and allowances
    Balance(BalanceArgs),
    /// Ask the exchange to refresh its cached balance and allowances
    RefreshBalance(BalanceArgs),
    /// Show signer, funder and contract addresses
    Whoami,
    /// Check balance and allowances and suggest fixes
    Diagnose(DiagnoseArgs),
}

#[derive(Args, Debug, Default)]
pub struct MarketsArgs {
    /// Market condition ID
    #[arg(long)]
    pub id: Option<String>,
    /// Pagination cursor
    #[arg(long)]
    pub cursor: Option<String>,
    /// Use the sampling markets endpoint
    #[arg(long)]
    pub sampling: bool,
    /// Only keep markets accepting orders
    #[arg(long)]
    pub accepting_only: bool,
    /// Keep at most this many markets
    #[arg(long)]
    pub limit: Option<usize>,
    /// Look up each market's title (defaults --limit to 20)
    #[arg(long)]
    pub with_title: bool,
}

#[derive(Args, Debug)]
pub struct OrderCmdArgs {
    /// Token ID
    pub token_id: String,
    /// Number of shares
    #[arg(value_parser = parse_decimal_arg)]
    pub size: Decimal,
    /// Limit price
    #[arg(value_parser = parse_decimal_arg)]
    pub price: Decimal,
    #[command(flatten)]
    pub submit: SubmitArgs,
}

#[derive(Args, Debug)]
pub struct BuyMaxArgs {
    /// Token ID
    pub token_id: String,
    /// Maximum USD to spend
    #[arg(value_parser = parse_decimal_arg)]
    pub max_usd: Decimal,
    /// Limit price (defaults to the best ask)
    #[arg(long, value_parser = parse_decimal_arg)]
    pub price: Option<Decimal>,
    #[command(flatten)]
    pub submit: SubmitArgs,
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct SubmitArgs {
    /// Time in force
    #[arg(long, value_enum, default_value_t = OrderType::Gtc)]
    pub order_type: OrderType,
    /// Sign the order and print it without posting
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["order_id", "all"])))]
pub struct CancelArgs {
    /// Order ID to cancel
    #[arg(long)]
    pub order_id: Option<String>,
    /// Cancel all open orders
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug, Default)]
pub struct BalanceArgs {
    /// Asset type
    #[arg(long, value_enum, ignore_case = true)]
    pub asset_type: Option<AssetType>,
    /// Conditional token ID
    #[arg(long)]
    pub token_id: Option<String>,
    /// Signature type override
    #[arg(long)]
    pub signature_type: Option<u8>,
}

impl BalanceArgs {
    pub fn to_params(&self) -> BalanceAllowanceParams {
        BalanceAllowanceParams {
            asset_type: self.asset_type,
            token_id: self.token_id.clone(),
            signature_type: self.signature_type,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct DiagnoseArgs {
    /// Also read the collateral allowance on-chain
    #[arg(long)]
    pub onchain: bool,
    /// Refresh the exchange's cached balance and add recommendations
    #[arg(long)]
    pub fix: bool,
}

fn parse_decimal_arg(raw: &str) -> Result<Decimal, String> {
    parse_decimal(raw).map_err(|_| format!("'{}' is not a number", raw))
}
