//! Cadence layers and report depth
//!
//! Pure date arithmetic: which recurrence tiers are active today and how
//! deep the briefing should start out. Escalation beyond the initial guess
//! belongs to the orchestrator.

use crate::config::WatchlistSnapshot;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CadenceLayer {
    Daily,
    Weekly,
    BiMonthly,
    Monthly,
    Earnings,
}

impl CadenceLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            CadenceLayer::Daily => "daily",
            CadenceLayer::Weekly => "weekly",
            CadenceLayer::BiMonthly => "bi_monthly",
            CadenceLayer::Monthly => "monthly",
            CadenceLayer::Earnings => "earnings",
        }
    }

    pub fn all() -> [CadenceLayer; 5] {
        [
            CadenceLayer::Daily,
            CadenceLayer::Weekly,
            CadenceLayer::BiMonthly,
            CadenceLayer::Monthly,
            CadenceLayer::Earnings,
        ]
    }
}

/// Report verbosity tier. Ordering matters: escalation only ever moves up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
    Concise,
    Detailed,
    Comprehensive,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Depth::Concise => "concise",
            Depth::Detailed => "detailed",
            Depth::Comprehensive => "comprehensive",
        }
    }
}

/// A watchlist ticker whose earnings date falls inside the active window.
#[derive(Debug, Clone, PartialEq)]
pub struct EarningsDue {
    pub symbol: String,
    pub company: String,
    pub earnings_date: NaiveDate,
    /// Signed distance in days: negative = already reported.
    pub delta_days: i64,
}

impl EarningsDue {
    pub fn relation(&self) -> String {
        if self.delta_days == 0 {
            "today".to_string()
        } else if self.delta_days < 0 {
            format!("{} day(s) ago", -self.delta_days)
        } else {
            format!("in {} day(s)", self.delta_days)
        }
    }
}

/// Output of the cadence policy for one run date.
#[derive(Debug, Clone)]
pub struct CadenceDecision {
    pub layers: Vec<CadenceLayer>,
    pub initial_depth: Depth,
    pub earnings_due: Vec<EarningsDue>,
}

impl CadenceDecision {
    pub fn has_layer(&self, layer: CadenceLayer) -> bool {
        self.layers.contains(&layer)
    }

    pub fn layer_names(&self) -> String {
        self.layers
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Tickers whose earnings date falls within `window_days` of `date`
/// (inclusive, both directions). Shared by cadence and guardrails.
pub fn earnings_within_window(
    watchlist: &WatchlistSnapshot,
    date: NaiveDate,
    window_days: i64,
) -> Vec<EarningsDue> {
    let mut due = Vec::new();
    for item in &watchlist.watchlist {
        let Some(earnings_date) = item.earnings_date else {
            continue;
        };
        let delta = (earnings_date - date).num_days();
        if delta.abs() <= window_days {
            due.push(EarningsDue {
                symbol: item.symbol.clone(),
                company: item.company.clone(),
                earnings_date,
                delta_days: delta,
            });
        }
    }
    due
}

/// True when `date` is the first weekday-open day of its month. The exact
/// holiday calendar lives with the provider; earlier days of the month are
/// judged by weekday only, which matches the day-of-month <= 3 bound.
fn is_first_trading_day_of_month(date: NaiveDate) -> bool {
    if date.day() > 3 {
        return false;
    }
    if !is_weekday(date) {
        return false;
    }
    let mut cursor = date.with_day(1).unwrap_or(date);
    while cursor < date {
        if is_weekday(cursor) {
            return false;
        }
        cursor += Duration::days(1);
    }
    true
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Compute the active layer set and the initial depth guess for a run.
///
/// `prior_manual_review` is the carried-over status of the most recent
/// prior run; it lifts the starting depth to Detailed.
pub fn evaluate(
    date: NaiveDate,
    watchlist: &WatchlistSnapshot,
    earnings_window_days: i64,
    prior_manual_review: bool,
) -> CadenceDecision {
    let mut layers = vec![CadenceLayer::Daily];

    if date.weekday() == Weekday::Mon {
        layers.push(CadenceLayer::Weekly);
    }
    if date.day() == 1 || date.day() == 15 {
        layers.push(CadenceLayer::BiMonthly);
    }
    if is_first_trading_day_of_month(date) {
        layers.push(CadenceLayer::Monthly);
    }

    let earnings_due = earnings_within_window(watchlist, date, earnings_window_days);
    if !earnings_due.is_empty() {
        layers.push(CadenceLayer::Earnings);
    }

    let mut initial_depth = Depth::Concise;
    if !earnings_due.is_empty() || prior_manual_review {
        initial_depth = Depth::Detailed;
    }
    if date.weekday() == Weekday::Mon {
        initial_depth = Depth::Comprehensive;
    }

    CadenceDecision {
        layers,
        initial_depth,
        earnings_due,
    }
}
