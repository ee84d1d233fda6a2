use anyhow::Result;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cli::{BuyMaxArgs, CancelArgs, OrderCmdArgs};
use crate::clob::{BalanceAllowanceParams, Exchange, OrderArgs, Side};
use crate::error::ArgumentError;
use crate::polymarket::{best_bid_ask, preflight, size_by_budget, PreflightWarning};

pub async fn orderbook(exchange: &dyn Exchange, token_id: &str) -> Result<Value> {
    let book = exchange.get_order_book(token_id).await?;
    Ok(serde_json::to_value(book)?)
}

pub async fn quote(exchange: &dyn Exchange, token_id: &str) -> Result<Value> {
    let book = exchange.get_order_book(token_id).await?;
    let best = best_bid_ask(&book);

    Ok(json!({
        "token_id": token_id,
        "best_bid": best.best_bid,
        "best_ask": best.best_ask,
        "min_order_size": book.min_order_size,
        "tick_size": book.tick_size,
        "last_trade_price": book.last_trade_price,
    }))
}

pub async fn place_order(exchange: &dyn Exchange, side: Side, args: &OrderCmdArgs) -> Result<Value> {
    ensure_positive("size", args.size)?;
    ensure_positive("price", args.price)?;

    if side == Side::Buy {
        check_balance(exchange, &args.token_id).await;
    }

    let order = OrderArgs {
        token_id: args.token_id.clone(),
        price: args.price,
        size: args.size,
        side,
        order_type: args.submit.order_type,
    };
    submit(exchange, &order, args.submit.dry_run).await
}

pub async fn buy_max(exchange: &dyn Exchange, args: &BuyMaxArgs) -> Result<Value> {
    let book = exchange.get_order_book(&args.token_id).await?;
    let sized = size_by_budget(&book, args.max_usd, args.price)?;
    info!(
        token_id = %args.token_id,
        price = %sized.price,
        size = %sized.size,
        marketable = sized.is_marketable,
        "Sized order from budget"
    );

    check_balance(exchange, &args.token_id).await;

    let order = OrderArgs {
        token_id: args.token_id.clone(),
        price: sized.price,
        size: sized.size,
        side: Side::Buy,
        order_type: args.submit.order_type,
    };
    submit(exchange, &order, args.submit.dry_run).await
}

pub async fn cancel(exchange: &dyn Exchange, args: &CancelArgs) -> Result<Value> {
    match (&args.order_id, args.all) {
        (Some(_), true) => Err(ArgumentError::ConflictingCancelTarget.into()),
        (None, false) => Err(ArgumentError::MissingCancelTarget.into()),
        (Some(order_id), false) => exchange.cancel_order(order_id).await,
        (None, true) => exchange.cancel_all().await,
    }
}

async fn submit(exchange: &dyn Exchange, order: &OrderArgs, dry_run: bool) -> Result<Value> {
    let signed = exchange.create_order(order).await?;
    if dry_run {
        return Ok(json!({
            "dry_run": true,
            "order_type": order.order_type,
            "order": signed,
        }));
    }
    exchange.post_order(&signed, order.order_type).await
}

/// Best-effort collateral check. Failures are logged and the order proceeds,
/// since the exchange's allowance cache may lag the chain.
async fn check_balance(exchange: &dyn Exchange, token_id: &str) {
    let outcome = match exchange
        .get_balance_allowance(&BalanceAllowanceParams::collateral())
        .await
    {
        Ok(balance) => preflight(&balance),
        Err(e) => Err(PreflightWarning::Unavailable(format!("{:#}", e))),
    };

    if let Err(warning) = outcome {
        warn!(token_id = %token_id, "Could not preflight balance/allowance: {}", warning);
    }
}

fn ensure_positive(name: &'static str, value: Decimal) -> Result<(), ArgumentError> {
    if value <= Decimal::ZERO {
        return Err(ArgumentError::NotPositive {
            name,
            value: value.to_string(),
        });
    }
    Ok(())
}
