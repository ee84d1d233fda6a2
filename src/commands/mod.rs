//! Subcommand handlers
//!
//! Each handler works against [`Exchange`] and returns the JSON value to print.
//! Client construction happens here so configuration problems surface before
//! any trading call.

pub mod account;
pub mod markets;
pub mod orders;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::cli::Commands;
use crate::clob::{ClobClient, Side};
use crate::config::CliConfig;
use crate::onchain::{AllowanceLookup, RpcClient};

/// Run one subcommand to completion
pub async fn execute(command: Commands, config: &CliConfig) -> Result<Value> {
    match command {
        Commands::Markets(args) => {
            let client = ClobClient::public(config)?;
            markets::markets(&client, &args)
                .await
                .context("Error fetching markets")
        }
        Commands::Orderbook { token_id } => {
            let client = ClobClient::public(config)?;
            orders::orderbook(&client, &token_id)
                .await
                .context("Error fetching orderbook")
        }
        Commands::Quote { token_id } => {
            let client = ClobClient::public(config)?;
            orders::quote(&client, &token_id)
                .await
                .context("Error fetching quote")
        }
        Commands::Buy(args) => {
            let client = ClobClient::connect(config).await?;
            orders::place_order(&client, Side::Buy, &args)
                .await
                .context("Error placing buy order")
        }
        Commands::Sell(args) => {
            let client = ClobClient::connect(config).await?;
            orders::place_order(&client, Side::Sell, &args)
                .await
                .context("Error placing sell order")
        }
        Commands::BuyMax(args) => {
            let client = ClobClient::connect(config).await?;
            orders::buy_max(&client, &args)
                .await
                .context("Error placing buy-max order")
        }
        Commands::Cancel(args) => {
            let client = ClobClient::connect(config).await?;
            orders::cancel(&client, &args)
                .await
                .context("Error canceling order")
        }
        Commands::Balance(args) => {
            let client = ClobClient::connect(config).await?;
            account::balance(&client, &args)
                .await
                .context("Error fetching balance/allowance")
        }
        Commands::RefreshBalance(args) => {
            let client = ClobClient::connect(config).await?;
            account::refresh_balance(&client, &args)
                .await
                .context("Error refreshing balance/allowance")
        }
        Commands::Whoami => {
            let client = ClobClient::connect(config).await?;
            account::whoami(&client).context("Error fetching identity")
        }
        Commands::Diagnose(args) => {
            let client = ClobClient::connect(config).await?;
            let rpc = if args.onchain {
                Some(RpcClient::new(&config.rpc)?)
            } else {
                None
            };
            account::diagnose(
                &client,
                rpc.as_ref().map(|rpc| rpc as &dyn AllowanceLookup),
                &args,
            )
            .await
            .context("Error running diagnose")
        }
    }
}
