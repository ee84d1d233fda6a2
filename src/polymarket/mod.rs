//! Polymarket-native sizing and account diagnostics.

pub mod diagnostics;
pub mod sizing;

pub use diagnostics::{
    build_report, diagnose_and_recommend, preflight, DiagnosticReport, OnchainAllowance,
    PreflightWarning,
};
pub use sizing::{
    best_bid_ask, size_by_budget, BestQuote, SizedOrder, SizingError, MIN_MARKETABLE_NOTIONAL,
};
