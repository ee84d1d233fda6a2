use anyhow::Result;
use serde_json::Value;
use tracing::warn;

use crate::cli::{BalanceArgs, DiagnoseArgs};
use crate::clob::{BalanceAllowanceParams, Exchange};
use crate::onchain::AllowanceLookup;
use crate::polymarket::{build_report, diagnose_and_recommend};

pub async fn balance(exchange: &dyn Exchange, args: &BalanceArgs) -> Result<Value> {
    let balance = exchange.get_balance_allowance(&args.to_params()).await?;
    Ok(serde_json::to_value(balance)?)
}

pub async fn refresh_balance(exchange: &dyn Exchange, args: &BalanceArgs) -> Result<Value> {
    exchange.update_balance_allowance(&args.to_params()).await
}

pub fn whoami(exchange: &dyn Exchange) -> Result<Value> {
    Ok(serde_json::to_value(exchange.identity())?)
}

/// With `--fix` the exchange cache is refreshed first, so the report and its
/// recommendations reflect the refreshed view. A failed refresh is only logged.
pub async fn diagnose(
    exchange: &dyn Exchange,
    lookup: Option<&dyn AllowanceLookup>,
    args: &DiagnoseArgs,
) -> Result<Value> {
    let identity = exchange.identity();
    let params = BalanceAllowanceParams::collateral();

    if args.fix {
        if let Err(e) = exchange.update_balance_allowance(&params).await {
            warn!(error = %e, "Balance/allowance refresh failed");
        }
    }

    let balance = exchange.get_balance_allowance(&params).await?;
    let lookup = lookup.filter(|_| args.onchain);
    let mut report = build_report(identity, balance, lookup).await;
    if args.fix {
        report = diagnose_and_recommend(report);
    }

    Ok(serde_json::to_value(report)?)
}
