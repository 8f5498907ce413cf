//! Guardrail evaluation over the quantitative snapshot
//!
//! Threshold checks that gate the run status: missing tickers, stale trade
//! timestamps, outsized daily moves, and active earnings windows. Any
//! trigger flips the run to manual review.

use crate::cadence::EarningsDue;
use crate::config::GuardrailConfig;
use crate::sources::QuoteSnapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    AutoClear,
    ManualReview,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::AutoClear => "auto_clear",
            RunStatus::ManualReview => "manual_review",
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuardrailOutcome {
    pub status: RunStatus,
    pub triggered: Vec<String>,
}

/// Evaluate guardrails for one run.
///
/// `snapshots` is `None` when the quantitative source failed entirely;
/// that alone is a trigger.
pub fn evaluate(
    snapshots: Option<&[QuoteSnapshot]>,
    earnings_due: &[EarningsDue],
    config: &GuardrailConfig,
    run_date: NaiveDate,
) -> GuardrailOutcome {
    let mut triggered = Vec::new();

    match snapshots {
        None => {
            triggered.push("Quantitative snapshot unavailable for this run".to_string());
        }
        Some(snapshots) => {
            let mut missing: Vec<&str> = snapshots
                .iter()
                .filter(|s| s.error.is_some() || s.price.is_none())
                .map(|s| s.symbol.as_str())
                .collect();
            if missing.len() > config.max_missing_tickers {
                missing.sort_unstable();
                triggered.push(format!(
                    "Missing critical data for {} ticker(s): {}",
                    missing.len(),
                    missing.join(", ")
                ));
            }

            let stale: Vec<String> = snapshots
                .iter()
                .filter(|s| s.price.is_some())
                .filter_map(|s| {
                    let last_trade = s.last_trade_date?;
                    let age_days = (run_date - last_trade).num_days();
                    (age_days > config.stale_data_max_days)
                        .then(|| format!("{} ({})", s.symbol, last_trade))
                })
                .collect();
            if !stale.is_empty() {
                triggered.push(format!(
                    "Stale market timestamps beyond allowed window: {}",
                    stale.join(", ")
                ));
            }

            let large_moves: Vec<String> = snapshots
                .iter()
                .filter_map(|s| {
                    let change = s.change_pct?;
                    (change.abs() >= config.price_move_pct_threshold)
                        .then(|| format!("{} ({:+.2}%)", s.symbol, change))
                })
                .collect();
            if !large_moves.is_empty() {
                triggered.push(format!(
                    "Large daily move >= {:.1}%: {}",
                    config.price_move_pct_threshold,
                    large_moves.join(", ")
                ));
            }
        }
    }

    if !earnings_due.is_empty() {
        let windows: Vec<String> = earnings_due
            .iter()
            .map(|e| {
                format!(
                    "{} ({}) earnings {} [{}]",
                    e.symbol,
                    e.company,
                    e.earnings_date,
                    e.relation()
                )
            })
            .collect();
        triggered.push(format!("Earnings window active: {}", windows.join("; ")));
    }

    let status = if triggered.is_empty() {
        RunStatus::AutoClear
    } else {
        RunStatus::ManualReview
    };

    GuardrailOutcome { status, triggered }
}
