//! Error taxonomy shared by the facade and the command layer
//!
//! Sizing and preflight failures live next to their engines in
//! [`crate::polymarket`]; everything here is raised before or around a
//! network call.

use reqwest::StatusCode;
use thiserror::Error;

/// Fatal configuration problems. These abort the process before any trading call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("POLYMARKET_KEY environment variable not set.")]
    MissingKey,

    #[error("POLYMARKET_KEY is not a valid private key")]
    InvalidKey,

    #[error("{name} is not a valid address: {value}")]
    InvalidAddress { name: &'static str, value: String },

    #[error(
        "POLYMARKET_SIGNER does not match POLYMARKET_KEY-derived address. Expected: {expected}  Got: {derived}"
    )]
    SignerMismatch { expected: String, derived: String },

    #[error("Error initializing client: {0}")]
    ClientInit(String),

    #[error("Unsupported chain_id {0}")]
    UnsupportedChain(u64),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Invalid command arguments that clap cannot reject on its own.
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("{name} must be > 0 (got {value})")]
    NotPositive { name: &'static str, value: String },

    #[error("use either --all or --order-id, not both.")]
    ConflictingCancelTarget,

    #[error("provide --order-id or use --all.")]
    MissingCancelTarget,
}

/// The exchange answered, but with a non-success status.
#[derive(Debug, Error)]
#[error("{endpoint} returned {status}: {body}")]
pub struct UpstreamError {
    pub endpoint: String,
    pub status: StatusCode,
    pub body: String,
}

/// True when any error in the chain is a [`ConfigError`].
pub fn is_config_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<ConfigError>())
}
