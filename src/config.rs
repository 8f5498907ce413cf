//! Runtime configuration from environment variables plus the watchlist snapshot file

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "Missing environment variable: {}", var),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Watchlist parse error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// One watchlist entry as stored in the watchlist file.
///
/// `earnings_date` is read-only during a run; refresh sources emit proposed
/// updates that are applied to the file between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub symbol: String,
    pub company: String,
    #[serde(default)]
    pub earnings_date: Option<NaiveDate>,
}

/// Immutable watchlist view for a single run.
///
/// Loaded once at run start; never mutated mid-run. `save_with_updates`
/// writes a fresh file via temp-file + rename so a crashed run can never
/// leave a half-written watchlist behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistSnapshot {
    pub watchlist: Vec<WatchlistItem>,
}

/// Proposed earnings-date change emitted by a refresh source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposedUpdate {
    pub symbol: String,
    pub old_date: Option<NaiveDate>,
    pub new_date: NaiveDate,
}

impl WatchlistSnapshot {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: WatchlistSnapshot = serde_json::from_str(&raw)?;
        if snapshot.watchlist.is_empty() {
            return Err(ConfigError::InvalidValue(
                "watchlist file contains no entries".to_string(),
            ));
        }
        Ok(snapshot)
    }

    pub fn symbols(&self) -> Vec<String> {
        self.watchlist.iter().map(|i| i.symbol.clone()).collect()
    }

    pub fn get(&self, symbol: &str) -> Option<&WatchlistItem> {
        self.watchlist.iter().find(|i| i.symbol == symbol)
    }

    /// Apply proposed earnings updates and atomically replace the file.
    ///
    /// Returns the number of entries changed. A rename failure leaves the
    /// original file untouched.
    pub fn save_with_updates(
        &self,
        path: impl AsRef<Path>,
        updates: &[ProposedUpdate],
    ) -> Result<usize, ConfigError> {
        let path = path.as_ref();
        let mut next = self.clone();
        let mut applied = 0;

        for update in updates {
            if let Some(item) = next
                .watchlist
                .iter_mut()
                .find(|i| i.symbol == update.symbol)
            {
                if item.earnings_date != Some(update.new_date) {
                    item.earnings_date = Some(update.new_date);
                    applied += 1;
                }
            }
        }

        if applied == 0 {
            return Ok(0);
        }

        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&next)?;
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;

        Ok(applied)
    }
}

/// Guardrail thresholds gating the run status.
#[derive(Debug, Clone)]
pub struct GuardrailConfig {
    pub max_missing_tickers: usize,
    pub stale_data_max_days: i64,
    pub price_move_pct_threshold: f64,
    pub earnings_window_days: i64,
}

/// Runtime configuration loaded from environment variables.
///
/// Environment variables (all optional):
/// - `WATCHLIST_PATH` (default: config/watchlist.json)
/// - `REPORT_DIR` (default: reports)
/// - `QUOTE_API_BASE` (default: Yahoo quote endpoint)
/// - `EDGAR_SEARCH_BASE` (default: SEC EDGAR full-text search)
/// - `CALENDAR_API_BASE`, `NEWS_API_BASE`, `INSIDER_API_BASE`,
///   `PULSE_API_BASE`, `PREDICTION_API_BASE`, `CONSENSUS_API_BASE`
///   (no defaults; the matching source reports itself unavailable when unset)
/// - `NOTIFY_ENDPOINT`, `NOTIFY_RECIPIENT` (no defaults; notification skipped when unset)
/// - `SOURCE_TIMEOUT_SECS` (default: 60)
/// - `REQUEST_DELAY_MS` (default: 300)
/// - `NEWS_HEADLINE_LIMIT` (default: 5)
/// - `INSIDER_LOOKBACK_DAYS` (default: 7)
/// - `MAX_MISSING_TICKERS` (default: 0)
/// - `STALE_DATA_MAX_DAYS` (default: 1)
/// - `PRICE_MOVE_PCT_THRESHOLD` (default: 7.0)
/// - `EARNINGS_WINDOW_DAYS` (default: 1)
/// - `ENVIRONMENT_TAG` (default: sandbox)
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub watchlist_path: PathBuf,
    pub report_dir: PathBuf,
    pub environment_tag: String,
    pub quote_api_base: String,
    pub edgar_search_base: String,
    pub edgar_user_agent: String,
    pub calendar_api_base: Option<String>,
    pub news_api_base: Option<String>,
    pub insider_api_base: Option<String>,
    pub pulse_api_base: Option<String>,
    pub prediction_api_base: Option<String>,
    pub consensus_api_base: Option<String>,
    pub notify_endpoint: Option<String>,
    pub notify_recipient: Option<String>,
    pub source_timeout_secs: u64,
    pub request_delay_ms: u64,
    pub news_headline_limit: usize,
    pub insider_lookback_days: i64,
    pub guardrails: GuardrailConfig,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self {
            watchlist_path: env::var("WATCHLIST_PATH")
                .unwrap_or_else(|_| "config/watchlist.json".to_string())
                .into(),

            report_dir: env::var("REPORT_DIR")
                .unwrap_or_else(|_| "reports".to_string())
                .into(),

            environment_tag: env::var("ENVIRONMENT_TAG").unwrap_or_else(|_| "sandbox".to_string()),

            quote_api_base: env::var("QUOTE_API_BASE").unwrap_or_else(|_| {
                "https://query1.finance.yahoo.com/v7/finance/quote".to_string()
            }),

            edgar_search_base: env::var("EDGAR_SEARCH_BASE")
                .unwrap_or_else(|_| "https://efts.sec.gov/LATEST/search-index".to_string()),

            edgar_user_agent: env::var("EDGAR_USER_AGENT")
                .unwrap_or_else(|_| "stockbrief research@example.com".to_string()),

            calendar_api_base: env::var("CALENDAR_API_BASE").ok(),
            news_api_base: env::var("NEWS_API_BASE").ok(),
            insider_api_base: env::var("INSIDER_API_BASE").ok(),
            pulse_api_base: env::var("PULSE_API_BASE").ok(),
            prediction_api_base: env::var("PREDICTION_API_BASE").ok(),
            consensus_api_base: env::var("CONSENSUS_API_BASE").ok(),
            notify_endpoint: env::var("NOTIFY_ENDPOINT").ok(),
            notify_recipient: env::var("NOTIFY_RECIPIENT").ok(),

            source_timeout_secs: env::var("SOURCE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),

            request_delay_ms: env::var("REQUEST_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),

            news_headline_limit: env::var("NEWS_HEADLINE_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),

            insider_lookback_days: env::var("INSIDER_LOOKBACK_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(7),

            guardrails: GuardrailConfig {
                max_missing_tickers: env::var("MAX_MISSING_TICKERS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0),

                stale_data_max_days: env::var("STALE_DATA_MAX_DAYS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),

                price_move_pct_threshold: env::var("PRICE_MOVE_PCT_THRESHOLD")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(7.0),

                earnings_window_days: env::var("EARNINGS_WINDOW_DAYS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),
            },
        }
    }
}

/// Parse a `--flag value` pair from raw process args.
pub fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|idx| args.get(idx + 1))
        .cloned()
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
