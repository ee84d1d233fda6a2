use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use serde::Serialize;
use thiserror::Error;

use crate::clob::{BookLevel, OrderBookSnapshot};

/// Marketable orders below this notional (USD) are rejected by the venue.
pub const MIN_MARKETABLE_NOTIONAL: Decimal = dec!(1);
/// Sized orders are truncated to this many decimals.
pub const SIZE_DECIMALS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BestQuote {
    pub best_bid: Option<BookLevel>,
    pub best_ask: Option<BookLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SizedOrder {
    pub price: Decimal,
    pub size: Decimal,
    pub is_marketable: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("{name} must be > 0.")]
    InvalidArgument { name: &'static str, value: Decimal },

    #[error("No asks available for this token.")]
    NoLiquidity,

    #[error("max_usd too low for min order size. min_cost=${min_cost:.4} at price {price}.")]
    BudgetTooLowForMinimumSize { min_cost: Decimal, price: Decimal },

    #[error("Marketable buy notional (${notional:.4}) below $1 minimum.")]
    NotionalBelowMinimum { notional: Decimal },
}

/// Highest bid and lowest ask. When several levels share the extreme price
/// the first one listed wins.
pub fn best_bid_ask(book: &OrderBookSnapshot) -> BestQuote {
    let best_bid = book
        .bids
        .iter()
        .copied()
        .reduce(|best, level| if level.price > best.price { level } else { best });
    let best_ask = book
        .asks
        .iter()
        .copied()
        .reduce(|best, level| if level.price < best.price { level } else { best });

    BestQuote { best_bid, best_ask }
}

/// Largest buy that fits `max_usd`, priced at `limit_price` or the best ask.
///
/// The book's minimum order size may push the size above the budget-derived
/// one when the budget still covers it. Marketable results must clear
/// [`MIN_MARKETABLE_NOTIONAL`].
pub fn size_by_budget(
    book: &OrderBookSnapshot,
    max_usd: Decimal,
    limit_price: Option<Decimal>,
) -> Result<SizedOrder, SizingError> {
    if max_usd <= Decimal::ZERO {
        return Err(SizingError::InvalidArgument {
            name: "max_usd",
            value: max_usd,
        });
    }
    if let Some(price) = limit_price.filter(|p| *p <= Decimal::ZERO) {
        return Err(SizingError::InvalidArgument {
            name: "price",
            value: price,
        });
    }

    let quote = best_bid_ask(book);
    let price = match (limit_price, quote.best_ask) {
        (Some(price), _) => price,
        (None, Some(ask)) if ask.price > Decimal::ZERO => ask.price,
        (None, _) => return Err(SizingError::NoLiquidity),
    };

    let mut size = max_usd
        .checked_div(price)
        .ok_or(SizingError::InvalidArgument {
            name: "max_usd",
            value: max_usd,
        })?;

    let min_size = book.min_order_size;
    if min_size > Decimal::ZERO && size < min_size {
        let min_cost = min_size.checked_mul(price).unwrap_or(Decimal::MAX);
        if min_cost <= max_usd {
            size = min_size;
        } else {
            return Err(SizingError::BudgetTooLowForMinimumSize { min_cost, price });
        }
    }

    let is_marketable = quote.best_ask.map_or(false, |ask| price >= ask.price);
    let notional = price.checked_mul(size).unwrap_or(Decimal::MAX);
    if is_marketable && notional < MIN_MARKETABLE_NOTIONAL {
        return Err(SizingError::NotionalBelowMinimum { notional });
    }

    Ok(SizedOrder {
        price,
        size: size.round_dp_with_strategy(SIZE_DECIMALS, RoundingStrategy::ToZero),
        is_marketable,
    })
}
