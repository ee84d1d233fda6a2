//! Account diagnostics
//!
//! Combines identity, the off-chain balance/allowance view and optional
//! on-chain allowance reads into one report, then derives remediation hints.

use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::clob::{BalanceAllowance, Identity};
use crate::onchain::AllowanceLookup;

/// Result of one on-chain allowance read
#[derive(Debug, Clone, PartialEq)]
pub enum OnchainAllowance {
    Amount(U256),
    Error(String),
}

impl OnchainAllowance {
    pub fn amount(&self) -> Option<U256> {
        match self {
            Self::Amount(amount) => Some(*amount),
            Self::Error(_) => None,
        }
    }
}

impl Serialize for OnchainAllowance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Amount(amount) => serializer.serialize_str(&amount.to_string()),
            Self::Error(msg) => serializer.serialize_str(&format!("error: {}", msg)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub whoami: Identity,
    pub balance_allowance: BalanceAllowance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onchain_allowances: Option<BTreeMap<String, OnchainAllowance>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<Vec<String>>,
}

/// Why an order's balance/allowance preflight did not pass
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreflightWarning {
    #[error("insufficient balance/allowance (balance or allowance is 0)")]
    Insufficient { balance: Decimal, max_allowance: U256 },

    #[error("{0}")]
    Unavailable(String),
}

/// Balance and allowance must both be positive for a buy to settle
pub fn preflight(balance_allowance: &BalanceAllowance) -> Result<(), PreflightWarning> {
    let max_allowance = balance_allowance.max_allowance();
    if balance_allowance.balance <= Decimal::ZERO || max_allowance.is_zero() {
        return Err(PreflightWarning::Insufficient {
            balance: balance_allowance.balance,
            max_allowance,
        });
    }
    Ok(())
}

/// Assemble a report. With a `lookup`, every known spender is read on-chain;
/// one spender failing never prevents reading the others.
pub async fn build_report(
    identity: Identity,
    balance_allowance: BalanceAllowance,
    lookup: Option<&dyn AllowanceLookup>,
) -> DiagnosticReport {
    let onchain_allowances = match lookup {
        Some(lookup) => Some(read_onchain(&identity, &balance_allowance, lookup).await),
        None => None,
    };

    DiagnosticReport {
        whoami: identity,
        balance_allowance,
        onchain_allowances,
        recommendations: None,
        next_steps: None,
    }
}

async fn read_onchain(
    identity: &Identity,
    balance_allowance: &BalanceAllowance,
    lookup: &dyn AllowanceLookup,
) -> BTreeMap<String, OnchainAllowance> {
    let mut spenders: Vec<String> = balance_allowance.allowances.keys().cloned().collect();
    if spenders.is_empty() {
        spenders.push(to_checksum(&identity.exchange, None));
    }

    let mut results = BTreeMap::new();
    for spender in spenders {
        let outcome = match (identity.owner(), spender.parse::<Address>()) {
            (None, _) => OnchainAllowance::Error("no owner address configured".to_string()),
            (_, Err(e)) => OnchainAllowance::Error(format!("invalid spender address: {}", e)),
            (Some(owner), Ok(spender_addr)) => {
                match lookup.allowance(identity.collateral, owner, spender_addr).await {
                    Ok(amount) => {
                        debug!(spender = %spender, %amount, "On-chain allowance");
                        OnchainAllowance::Amount(amount)
                    }
                    Err(e) => {
                        warn!(spender = %spender, error = %e, "On-chain allowance lookup failed");
                        OnchainAllowance::Error(e.to_string())
                    }
                }
            }
        };
        results.insert(spender, outcome);
    }
    results
}

/// Attach recommendations and next steps. Each rule that fires adds exactly
/// one of each.
pub fn diagnose_and_recommend(mut report: DiagnosticReport) -> DiagnosticReport {
    let mut recommendations = Vec::new();
    let mut next_steps = Vec::new();

    let exchange = to_checksum(&report.whoami.exchange, None);
    let offchain_max = report.balance_allowance.max_allowance();

    if report.balance_allowance.balance <= Decimal::ZERO {
        recommendations.push("Fund the proxy wallet (funder) with USDC on Polygon.".to_string());
        next_steps.push("Fund USDC to the proxy wallet address shown in whoami.funder.".to_string());
    }

    if offchain_max.is_zero() {
        recommendations.push(format!(
            "Approve USDC to CLOB Exchange in UI (spender {}).",
            exchange
        ));
        next_steps.push(format!(
            "Open Polymarket, click Buy, approve USDC (spender {}).",
            exchange
        ));
    }

    let onchain_max = report
        .onchain_allowances
        .as_ref()
        .and_then(|map| map.values().filter_map(OnchainAllowance::amount).max());
    if offchain_max.is_zero() && onchain_max.map_or(false, |max| !max.is_zero()) {
        recommendations.push("Onchain allowance exists but API shows 0: run refresh-balance.".to_string());
        next_steps.push("Run: polyclob refresh-balance --asset-type collateral".to_string());
    }

    report.recommendations = Some(recommendations);
    report.next_steps = Some(next_steps);
    report
}
