//! Short interest, ecosystem signals, and earnings-date refresh
//!
//! One info call per unique ticker covers all three sections: short
//! interest for the watchlist, earnings proximity and growth for the
//! ecosystem set (hyperscalers, peers, supply chain), and refresh
//! proposals for stale watchlist earnings dates.

use super::{
    http_client, request_pause, ActivationContext, DataSource, FetchContext, Payload, SourceError,
    SourceId,
};
use crate::cadence::CadenceLayer;
use crate::config::ProposedUpdate;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const HYPERSCALERS: [&str; 4] = ["MSFT", "GOOG", "META", "AMZN"];
const SUPPLY_CHAIN: [&str; 1] = ["TSM"];

/// Peer map for the tracked ecosystem. Symbols without an entry simply
/// contribute no peers.
fn peers_of(symbol: &str) -> &'static [&'static str] {
    match symbol {
        "NVDA" => &["AVGO", "AMD", "INTC"],
        "MRVL" => &["AVGO", "ANET"],
        "OKLO" => &["SMR", "NNE"],
        "MOD" => &["VRT", "ETN"],
        "LUMN" => &["EQIX"],
        _ => &[],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortInterest {
    pub shares_short: Option<i64>,
    pub shares_short_prior_month: Option<i64>,
    pub short_ratio: Option<f64>,
    pub short_pct_of_float: Option<f64>,
    pub change_pct: Option<f64>,
    pub report_date: Option<NaiveDate>,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcosystemEntry {
    pub ticker: String,
    pub name: String,
    pub next_earnings: Option<NaiveDate>,
    pub days_until_earnings: Option<i64>,
    pub revenue_growth_yoy: Option<f64>,
    pub earnings_growth_yoy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPulse {
    pub short_interest: BTreeMap<String, ShortInterest>,
    pub upcoming_earnings: Vec<EcosystemEntry>,
    pub recent_results: Vec<EcosystemEntry>,
    pub signals: Vec<String>,
    pub earnings_updates: Vec<ProposedUpdate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInfo {
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    shares_short: Option<i64>,
    #[serde(default)]
    shares_short_prior_month: Option<i64>,
    #[serde(default)]
    short_ratio: Option<f64>,
    #[serde(default)]
    short_percent_of_float: Option<f64>,
    #[serde(default)]
    date_short_interest: Option<i64>,
    #[serde(default)]
    earnings_timestamp_start: Option<i64>,
    #[serde(default)]
    revenue_growth: Option<f64>,
    #[serde(default)]
    earnings_growth: Option<f64>,
}

fn epoch_to_date(epoch: Option<i64>) -> Option<NaiveDate> {
    epoch
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.date_naive())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn short_interest_from(info: &RawInfo) -> ShortInterest {
    let change_pct = match (info.shares_short, info.shares_short_prior_month) {
        (Some(current), Some(prior)) if prior > 0 => {
            Some(round2((current - prior) as f64 / prior as f64 * 100.0))
        }
        _ => None,
    };

    ShortInterest {
        shares_short: info.shares_short,
        shares_short_prior_month: info.shares_short_prior_month,
        short_ratio: info.short_ratio.map(round2),
        short_pct_of_float: info.short_percent_of_float.map(|v| round2(v * 100.0)),
        change_pct,
        report_date: epoch_to_date(info.date_short_interest),
        available: info.shares_short.is_some(),
    }
}

fn ecosystem_entry(ticker: &str, info: &RawInfo, today: NaiveDate) -> EcosystemEntry {
    let next_earnings = epoch_to_date(info.earnings_timestamp_start);
    EcosystemEntry {
        ticker: ticker.to_string(),
        name: info.short_name.clone().unwrap_or_else(|| ticker.to_string()),
        next_earnings,
        days_until_earnings: next_earnings.map(|d| (d - today).num_days()),
        revenue_growth_yoy: info.revenue_growth.map(|v| round2(v * 100.0)),
        earnings_growth_yoy: info.earnings_growth.map(|v| round2(v * 100.0)),
    }
}

fn build_signals(entries: &[EcosystemEntry]) -> Vec<String> {
    let mut signals = Vec::new();
    for entry in entries {
        if HYPERSCALERS.contains(&entry.ticker.as_str()) {
            if let Some(growth) = entry.revenue_growth_yoy {
                if growth > 15.0 {
                    signals.push(format!(
                        "{} revenue growing {}% YoY - positive AI capex signal",
                        entry.ticker, growth
                    ));
                }
            }
        }
        if entry.ticker == "TSM" {
            if let Some(growth) = entry.revenue_growth_yoy {
                let direction = if growth > 10.0 {
                    "expanding"
                } else if growth > 0.0 {
                    "moderating"
                } else {
                    "contracting"
                };
                signals.push(format!(
                    "TSMC revenue {} ({}% YoY) - semiconductor demand proxy",
                    direction, growth
                ));
            }
        }
    }
    signals
}

pub struct MarketPulseSource {
    api_base: Option<String>,
}

impl MarketPulseSource {
    pub fn new(api_base: Option<String>) -> Self {
        Self { api_base }
    }

    fn ecosystem_universe(ctx: &FetchContext) -> BTreeSet<String> {
        let mut universe: BTreeSet<String> = HYPERSCALERS.iter().map(|s| s.to_string()).collect();
        universe.extend(SUPPLY_CHAIN.iter().map(|s| s.to_string()));
        for item in &ctx.watchlist.watchlist {
            universe.extend(peers_of(&item.symbol).iter().map(|s| s.to_string()));
        }
        universe
    }

    /// Propose new dates for watchlist entries whose stored date is
    /// missing or already past. The snapshot itself is never touched.
    fn refresh_proposals(
        ctx: &FetchContext,
        info_cache: &BTreeMap<String, RawInfo>,
    ) -> Vec<ProposedUpdate> {
        let mut updates = Vec::new();
        for item in &ctx.watchlist.watchlist {
            let stale = match item.earnings_date {
                None => true,
                Some(date) => date < ctx.date,
            };
            if !stale {
                continue;
            }
            let Some(info) = info_cache.get(&item.symbol) else {
                continue;
            };
            if let Some(new_date) = epoch_to_date(info.earnings_timestamp_start) {
                if new_date >= ctx.date {
                    updates.push(ProposedUpdate {
                        symbol: item.symbol.clone(),
                        old_date: item.earnings_date,
                        new_date,
                    });
                }
            }
        }
        updates
    }
}

#[async_trait]
impl DataSource for MarketPulseSource {
    fn id(&self) -> SourceId {
        SourceId::MarketPulse
    }

    fn is_active(&self, ctx: &ActivationContext) -> bool {
        ctx.has_layer(CadenceLayer::Weekly) || ctx.has_layer(CadenceLayer::BiMonthly)
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<Payload, SourceError> {
        let api_base = self
            .api_base
            .as_deref()
            .ok_or(SourceError::NotConfigured("PULSE_API_BASE"))?;

        let client = http_client(ctx.config.source_timeout_secs)?;

        // One info call per unique ticker: watchlist plus ecosystem set.
        let mut tickers: BTreeSet<String> = ctx.watchlist.symbols().into_iter().collect();
        tickers.extend(Self::ecosystem_universe(ctx));

        let mut info_cache: BTreeMap<String, RawInfo> = BTreeMap::new();
        for (i, ticker) in tickers.iter().enumerate() {
            request_pause(ctx, i).await;

            let url = format!("{}?symbol={}", api_base, ticker);
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    match resp.json::<RawInfo>().await {
                        Ok(info) => {
                            info_cache.insert(ticker.clone(), info);
                        }
                        Err(e) => log::warn!("⚠️  market_pulse: {}: {}", ticker, e),
                    }
                }
                Ok(resp) => log::warn!(
                    "⚠️  market_pulse: {}: endpoint returned {}",
                    ticker,
                    resp.status()
                ),
                Err(e) => log::warn!("⚠️  market_pulse: {}: {}", ticker, e),
            }
        }

        if info_cache.is_empty() {
            return Err(SourceError::Http(
                "no ticker info returned from pulse endpoint".to_string(),
            ));
        }

        let short_interest: BTreeMap<String, ShortInterest> = ctx
            .watchlist
            .watchlist
            .iter()
            .map(|item| {
                let info = info_cache.get(&item.symbol);
                (
                    item.symbol.clone(),
                    info.map(short_interest_from).unwrap_or(ShortInterest {
                        shares_short: None,
                        shares_short_prior_month: None,
                        short_ratio: None,
                        short_pct_of_float: None,
                        change_pct: None,
                        report_date: None,
                        available: false,
                    }),
                )
            })
            .collect();

        let ecosystem: Vec<EcosystemEntry> = Self::ecosystem_universe(ctx)
            .iter()
            .filter_map(|ticker| {
                info_cache
                    .get(ticker)
                    .map(|info| ecosystem_entry(ticker, info, ctx.date))
            })
            .collect();

        let mut upcoming: Vec<EcosystemEntry> = ecosystem
            .iter()
            .filter(|e| matches!(e.days_until_earnings, Some(d) if (0..=30).contains(&d)))
            .cloned()
            .collect();
        upcoming.sort_by_key(|e| e.days_until_earnings.unwrap_or(999));

        let mut recent: Vec<EcosystemEntry> = ecosystem
            .iter()
            .filter(|e| matches!(e.days_until_earnings, Some(d) if (-14..0).contains(&d)))
            .cloned()
            .collect();
        recent.sort_by_key(|e| -e.days_until_earnings.unwrap_or(-999));

        let signals = build_signals(&ecosystem);
        let earnings_updates = Self::refresh_proposals(ctx, &info_cache);

        Ok(Payload::MarketPulse(MarketPulse {
            short_interest,
            upcoming_earnings: upcoming,
            recent_results: recent,
            signals,
            earnings_updates,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuntimeConfig, WatchlistItem, WatchlistSnapshot};

    fn ctx(date: NaiveDate, earnings: Option<NaiveDate>) -> FetchContext {
        FetchContext {
            date,
            watchlist: WatchlistSnapshot {
                watchlist: vec![WatchlistItem {
                    symbol: "NVDA".to_string(),
                    company: "NVIDIA".to_string(),
                    earnings_date: earnings,
                }],
            },
            config: RuntimeConfig::from_env(),
        }
    }

    #[test]
    fn test_short_interest_change_pct() {
        let info = RawInfo {
            shares_short: Some(110),
            shares_short_prior_month: Some(100),
            short_percent_of_float: Some(0.0234),
            ..Default::default()
        };

        let si = short_interest_from(&info);
        assert_eq!(si.change_pct, Some(10.0));
        assert_eq!(si.short_pct_of_float, Some(2.34));
        assert!(si.available);
    }

    #[test]
    fn test_hyperscaler_growth_signal() {
        let entries = vec![EcosystemEntry {
            ticker: "MSFT".to_string(),
            name: "Microsoft".to_string(),
            next_earnings: None,
            days_until_earnings: None,
            revenue_growth_yoy: Some(18.5),
            earnings_growth_yoy: None,
        }];

        let signals = build_signals(&entries);
        assert_eq!(signals.len(), 1);
        assert!(signals[0].contains("MSFT"));
        assert!(signals[0].contains("AI capex"));
    }

    #[test]
    fn test_tsm_direction_signal() {
        let entry = |growth: f64| EcosystemEntry {
            ticker: "TSM".to_string(),
            name: "TSMC".to_string(),
            next_earnings: None,
            days_until_earnings: None,
            revenue_growth_yoy: Some(growth),
            earnings_growth_yoy: None,
        };

        assert!(build_signals(&[entry(12.0)])[0].contains("expanding"));
        assert!(build_signals(&[entry(4.0)])[0].contains("moderating"));
        assert!(build_signals(&[entry(-2.0)])[0].contains("contracting"));
    }

    #[test]
    fn test_refresh_proposed_only_for_stale_dates() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        // Epoch for 2026-08-27 00:00:00 UTC
        let future_epoch = NaiveDate::from_ymd_opt(2026, 8, 27)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp();

        let mut cache = BTreeMap::new();
        cache.insert(
            "NVDA".to_string(),
            RawInfo {
                earnings_timestamp_start: Some(future_epoch),
                ..Default::default()
            },
        );

        // Past date: refresh proposed
        let stale = ctx(today, NaiveDate::from_ymd_opt(2026, 5, 20));
        let updates = MarketPulseSource::refresh_proposals(&stale, &cache);
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].new_date,
            NaiveDate::from_ymd_opt(2026, 8, 27).unwrap()
        );

        // Future date already on file: nothing to do
        let fresh = ctx(today, NaiveDate::from_ymd_opt(2026, 8, 27));
        assert!(MarketPulseSource::refresh_proposals(&fresh, &cache).is_empty());
    }
}
