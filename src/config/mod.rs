//! Configuration management for polyclob
//!
//! Loads from `POLYMARKET_*` environment variables plus an optional dotenv
//! file. The file is parsed into the layered map directly; nothing is ever
//! written back into the process environment.

use config::{Config, Environment};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ConfigError;

pub const ENV_PREFIX: &str = "POLYMARKET";
pub const ENV_FILE_VAR: &str = "POLYMARKET_ENV_FILE";
pub const DEFAULT_ENV_FILE: &str = ".polymarket.env";
pub const DEFAULT_HOST: &str = "https://clob.polymarket.com";
pub const DEFAULT_CHAIN_ID: u64 = 137;
pub const DEFAULT_RPC: &str = "https://polygon-rpc.com";

/// Resolved CLI configuration
#[derive(Clone, Deserialize)]
pub struct CliConfig {
    /// CLOB REST base URL
    pub host: String,
    /// Chain ID (137 = Polygon)
    pub chain_id: u64,
    /// Signature scheme selector (0=EOA, 1=Proxy, 2=Safe)
    #[serde(default)]
    pub sig_type: Option<u8>,
    /// Proxy wallet funding the orders
    #[serde(default)]
    pub funder: Option<String>,
    /// Expected signer address
    #[serde(default)]
    pub signer: Option<String>,
    /// Private key
    #[serde(default)]
    pub key: Option<String>,
    /// JSON-RPC endpoint for on-chain allowance checks
    pub rpc: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub api_passphrase: Option<String>,
}

impl CliConfig {
    /// Load configuration from the process environment and env file
    pub fn load() -> Result<Self, ConfigError> {
        let process: HashMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        let env_file = env_file_path(&process);
        Self::from_layers(process, env_file.as_deref())
    }

    /// Build from an explicit variable map, with `env_file` (if readable)
    /// overriding it.
    pub fn from_layers(
        process: HashMap<String, String>,
        env_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut vars: HashMap<String, String> = process
            .into_iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        if let Some(path) = env_file {
            vars.extend(read_env_file(path));
        }
        Self::from_vars(vars)
    }

    fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("host", DEFAULT_HOST)?
            .set_default("chain_id", DEFAULT_CHAIN_ID)?
            .set_default("rpc", DEFAULT_RPC)?
            .add_source(Environment::with_prefix(ENV_PREFIX).source(Some(vars.into_iter().collect())))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "host={} chain_id={} sig_type={:?} funder={:?} signer={:?} key_set={} rpc={} api_creds_set={}",
            self.host,
            self.chain_id,
            self.sig_type,
            self.funder,
            self.signer,
            self.key.is_some(),
            self.rpc,
            self.api_key.is_some() && self.api_secret.is_some() && self.api_passphrase.is_some(),
        )
    }
}

impl std::fmt::Debug for CliConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CliConfig {{ {} }}", self.digest())
    }
}

/// `POLYMARKET_ENV_FILE`, falling back to `$HOME/.polymarket.env`
pub fn env_file_path(process: &HashMap<String, String>) -> Option<PathBuf> {
    match process.get(ENV_FILE_VAR).map(|p| p.trim()) {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => process
            .get("HOME")
            .filter(|home| !home.is_empty())
            .map(|home| Path::new(home).join(DEFAULT_ENV_FILE)),
    }
}

/// Read `KEY=VALUE` pairs from a dotenv file.
///
/// Missing files yield nothing. Malformed lines and empty values are skipped.
/// Line contents are never logged since the file holds key material.
pub fn read_env_file(path: &Path) -> Vec<(String, String)> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => {
            debug!(path = %path.display(), "No env file found");
            return Vec::new();
        }
        Err(_) => {
            warn!(path = %path.display(), "Could not read env file; ignoring it");
            return Vec::new();
        }
    };

    iter.filter_map(|item| match item {
        Ok((key, value)) => {
            let key = key.trim().to_string();
            let value = value.trim().to_string();
            (!key.is_empty() && !value.is_empty()).then_some((key, value))
        }
        Err(_) => {
            debug!(path = %path.display(), "Skipping malformed env file line");
            None
        }
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_env_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "polyclob-{}-{}-{}.env",
            name,
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_without_any_variables() {
        let cfg = CliConfig::from_layers(HashMap::new(), None).unwrap();
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.chain_id, 137);
        assert_eq!(cfg.rpc, DEFAULT_RPC);
        assert!(cfg.key.is_none());
        assert!(cfg.sig_type.is_none());
    }

    #[test]
    fn process_variables_are_read_with_prefix() {
        let cfg = CliConfig::from_layers(
            vars(&[
                ("POLYMARKET_HOST", "https://example.test"),
                ("POLYMARKET_CHAIN_ID", "80002"),
                ("POLYMARKET_SIG_TYPE", "2"),
                ("POLYMARKET_FUNDER", "0xabc"),
                ("OTHER_KEY", "ignored"),
            ]),
            None,
        )
        .unwrap();
        assert_eq!(cfg.host, "https://example.test");
        assert_eq!(cfg.chain_id, 80002);
        assert_eq!(cfg.sig_type, Some(2));
        assert_eq!(cfg.funder.as_deref(), Some("0xabc"));
    }

    #[test]
    fn empty_values_count_as_unset() {
        let cfg = CliConfig::from_layers(vars(&[("POLYMARKET_SIG_TYPE", "")]), None).unwrap();
        assert!(cfg.sig_type.is_none());
    }

    #[test]
    fn non_integer_chain_id_is_config_error() {
        let err = CliConfig::from_layers(vars(&[("POLYMARKET_CHAIN_ID", "polygon")]), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn env_file_overrides_process_and_skips_bad_lines() {
        let path = temp_env_file(
            "override",
            "# comment\n\
             export POLYMARKET_HOST=\"https://from-file.test\"\n\
             this line is not an assignment\n\
             POLYMARKET_KEY='0xfeed'\n\
             POLYMARKET_FUNDER=\n",
        );

        let cfg = CliConfig::from_layers(
            vars(&[
                ("POLYMARKET_HOST", "https://from-process.test"),
                ("POLYMARKET_FUNDER", "0xprocess"),
            ]),
            Some(&path),
        )
        .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(cfg.host, "https://from-file.test");
        assert_eq!(cfg.key.as_deref(), Some("0xfeed"));
        assert_eq!(cfg.funder.as_deref(), Some("0xprocess"));
    }

    #[test]
    fn missing_env_file_is_ignored() {
        let path = std::env::temp_dir().join("polyclob-definitely-missing.env");
        assert!(read_env_file(&path).is_empty());
        assert!(CliConfig::from_layers(HashMap::new(), Some(&path)).is_ok());
    }

    #[test]
    fn env_file_path_prefers_explicit_variable() {
        let explicit = env_file_path(&vars(&[
            (ENV_FILE_VAR, "/tmp/custom.env"),
            ("HOME", "/home/u"),
        ]));
        assert_eq!(explicit, Some(PathBuf::from("/tmp/custom.env")));

        let fallback = env_file_path(&vars(&[("HOME", "/home/u")]));
        assert_eq!(fallback, Some(PathBuf::from("/home/u/.polymarket.env")));

        assert_eq!(env_file_path(&HashMap::new()), None);
    }

    #[test]
    fn debug_output_hides_key() {
        let cfg = CliConfig::from_layers(
            vars(&[("POLYMARKET_KEY", "0xsecretsecret"), ("POLYMARKET_API_SECRET", "s3cr3t")]),
            None,
        )
        .unwrap();
        let shown = format!("{:?}", cfg);
        assert!(!shown.contains("secretsecret"));
        assert!(!shown.contains("s3cr3t"));
        assert!(shown.contains("key_set=true"));
    }
}
