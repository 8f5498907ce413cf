//! Data source boundary
//!
//! Every external provider sits behind the [`DataSource`] trait: an id, an
//! activation predicate over the run's cadence state, and a bounded fetch.
//! The orchestrator treats payloads as opaque beyond the fields the
//! red-flag and guardrail detectors read.

pub mod consensus;
pub mod filings;
pub mod insider;
pub mod macro_search;
pub mod market_pulse;
pub mod news;
pub mod prediction_markets;
pub mod quotes;

pub use consensus::{AnalystConsensusSource, ConsensusEntry};
pub use filings::{Filing, SecFilingsSource};
pub use insider::{InsiderActivity, InsiderActivitySource, InsiderTransaction};
pub use macro_search::MacroSearchSource;
pub use market_pulse::{EcosystemEntry, MarketPulse, MarketPulseSource, ShortInterest};
pub use news::{Headline, NewsSource};
pub use prediction_markets::{MarketQuote, PredictionMarketsSource};
pub use quotes::{QuoteSnapshot, QuotesSource};

use crate::cadence::{CadenceLayer, Depth};
use crate::config::RuntimeConfig;
use crate::config::WatchlistSnapshot;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Quotes,
    Filings,
    News,
    Insider,
    MarketPulse,
    PredictionMarkets,
    AnalystConsensus,
    MacroSearch,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Quotes => "quotes",
            SourceId::Filings => "filings",
            SourceId::News => "news",
            SourceId::Insider => "insider",
            SourceId::MarketPulse => "market_pulse",
            SourceId::PredictionMarkets => "prediction_markets",
            SourceId::AnalystConsensus => "analyst_consensus",
            SourceId::MacroSearch => "macro_search",
        }
    }

    /// Registry order. Results are always merged in this order so report
    /// sections are deterministic regardless of completion order.
    pub fn all() -> [SourceId; 8] {
        [
            SourceId::Quotes,
            SourceId::Filings,
            SourceId::News,
            SourceId::Insider,
            SourceId::MarketPulse,
            SourceId::PredictionMarkets,
            SourceId::AnalystConsensus,
            SourceId::MacroSearch,
        ]
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Failed,
    Skipped,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Ok => "ok",
            SourceStatus::Failed => "failed",
            SourceStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug)]
pub enum SourceError {
    NotConfigured(&'static str),
    Http(String),
    Decode(String),
    Timeout(u64),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Http(err.to_string())
        }
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::NotConfigured(var) => {
                write!(f, "Source unavailable: {} not configured", var)
            }
            SourceError::Http(e) => write!(f, "HTTP error: {}", e),
            SourceError::Decode(e) => write!(f, "Response decode error: {}", e),
            SourceError::Timeout(secs) => write!(f, "Timed out after {}s", secs),
        }
    }
}

impl std::error::Error for SourceError {}

/// Typed payloads, one variant per provider family. Maps are keyed by
/// ticker symbol; `BTreeMap` keeps render order stable.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Quotes(Vec<QuoteSnapshot>),
    Filings(BTreeMap<String, Vec<Filing>>),
    News(BTreeMap<String, Vec<Headline>>),
    Insider(BTreeMap<String, InsiderActivity>),
    MarketPulse(MarketPulse),
    PredictionMarkets(Vec<MarketQuote>),
    Consensus(Vec<ConsensusEntry>),
    MacroSearch(Vec<Headline>),
}

/// One source's outcome for a run. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct DataSourceResult {
    pub source: SourceId,
    pub status: SourceStatus,
    pub payload: Option<Payload>,
    pub error: Option<String>,
}

impl DataSourceResult {
    pub fn ok(source: SourceId, payload: Payload) -> Self {
        Self {
            source,
            status: SourceStatus::Ok,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failed(source: SourceId, detail: String) -> Self {
        Self {
            source,
            status: SourceStatus::Failed,
            payload: None,
            error: Some(detail),
        }
    }

    pub fn skipped(source: SourceId) -> Self {
        Self {
            source,
            status: SourceStatus::Skipped,
            payload: None,
            error: None,
        }
    }
}

/// Cadence state an activation predicate may consult. Pure data, so
/// predicates stay pure functions.
#[derive(Debug, Clone)]
pub struct ActivationContext {
    pub layers: Vec<CadenceLayer>,
    pub depth: Depth,
    /// True on the sequenced second pass after first-stage results raised
    /// at least one red flag.
    pub red_flags_pending: bool,
}

impl ActivationContext {
    pub fn has_layer(&self, layer: CadenceLayer) -> bool {
        self.layers.contains(&layer)
    }
}

/// Everything a fetch may read: run date, the immutable watchlist
/// snapshot, and endpoint/threshold configuration.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub date: NaiveDate,
    pub watchlist: WatchlistSnapshot,
    pub config: RuntimeConfig,
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn id(&self) -> SourceId;

    /// Pure predicate over layers + depth + prior red-flag state.
    fn is_active(&self, ctx: &ActivationContext) -> bool;

    async fn fetch(&self, ctx: &FetchContext) -> Result<Payload, SourceError>;
}

/// All production sources in stable merge order.
pub fn default_registry(config: &RuntimeConfig) -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(QuotesSource::new(config.quote_api_base.clone())),
        Arc::new(SecFilingsSource::new(
            config.edgar_search_base.clone(),
            config.edgar_user_agent.clone(),
        )),
        Arc::new(NewsSource::new(config.news_api_base.clone())),
        Arc::new(InsiderActivitySource::new(config.insider_api_base.clone())),
        Arc::new(MarketPulseSource::new(config.pulse_api_base.clone())),
        Arc::new(PredictionMarketsSource::new(
            config.prediction_api_base.clone(),
        )),
        Arc::new(AnalystConsensusSource::new(
            config.consensus_api_base.clone(),
        )),
        Arc::new(MacroSearchSource::new(config.news_api_base.clone())),
    ]
}

/// Shared client builder; every provider call gets the same bounded timeout.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| SourceError::Http(e.to_string()))
}

/// Fixed pacing between per-ticker requests inside one source.
pub(crate) async fn request_pause(ctx: &FetchContext, index: usize) {
    if index > 0 && ctx.config.request_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(ctx.config.request_delay_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_matches_source_order() {
        let config = RuntimeConfig::from_env();
        let registry = default_registry(&config);

        let ids: Vec<SourceId> = registry.iter().map(|s| s.id()).collect();
        assert_eq!(ids, SourceId::all().to_vec());
    }

    #[test]
    fn test_result_constructors() {
        let ok = DataSourceResult::ok(SourceId::Quotes, Payload::Quotes(vec![]));
        assert_eq!(ok.status, SourceStatus::Ok);
        assert!(ok.error.is_none());

        let failed = DataSourceResult::failed(SourceId::News, "boom".to_string());
        assert_eq!(failed.status, SourceStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(failed.payload.is_none());

        let skipped = DataSourceResult::skipped(SourceId::MacroSearch);
        assert_eq!(skipped.status, SourceStatus::Skipped);
    }
}
