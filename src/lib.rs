//! polyclob - command-line wrapper for the Polymarket CLOB
//!
//! Market data, order placement, balance/allowance queries and account
//! diagnostics, printed as JSON.

pub mod cli;
pub mod clob;
pub mod commands;
pub mod config;
pub mod error;
pub mod onchain;
pub mod polymarket;

pub use clob::{ClobClient, Exchange};
pub use config::CliConfig;
