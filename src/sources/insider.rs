//! Insider transaction feed with sell-cluster detection
//!
//! Weekly by cadence, and re-activated for the sequenced second pass when
//! first-stage results raise any red flag. Cluster rule: two or more
//! distinct insiders selling inside one sliding lookback window.

use super::{
    http_client, request_pause, ActivationContext, DataSource, FetchContext, Payload, SourceError,
    SourceId,
};
use crate::cadence::CadenceLayer;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

const CLUSTER_MIN_SELLERS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsiderTransaction {
    pub filing_date: String,
    pub trade_date: String,
    pub insider_name: String,
    pub title: String,
    pub trade_type: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub shares: Option<i64>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub filing_url: Option<String>,
}

impl InsiderTransaction {
    fn is_sale(&self) -> bool {
        self.trade_type.contains("Sale") || self.trade_type.contains("S -")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsiderActivity {
    pub transactions: Vec<InsiderTransaction>,
    pub transaction_count: usize,
    pub cluster_alert: bool,
}

/// Two or more distinct sellers within any `window_days` span.
pub fn detect_cluster_selling(transactions: &[InsiderTransaction], window_days: i64) -> bool {
    let mut sells: Vec<(NaiveDate, &str)> = transactions
        .iter()
        .filter(|t| t.is_sale())
        .filter_map(|t| {
            NaiveDate::parse_from_str(&t.trade_date, "%Y-%m-%d")
                .ok()
                .map(|d| (d, t.insider_name.as_str()))
        })
        .collect();

    if sells.len() < CLUSTER_MIN_SELLERS {
        return false;
    }

    sells.sort_by_key(|(date, _)| *date);

    for i in 0..sells.len() {
        let window_end = sells[i].0 + Duration::days(window_days);
        let mut unique_sellers = HashSet::new();
        for (date, name) in &sells[i..] {
            if *date > window_end {
                break;
            }
            unique_sellers.insert(*name);
        }
        if unique_sellers.len() >= CLUSTER_MIN_SELLERS {
            return true;
        }
    }

    false
}

pub struct InsiderActivitySource {
    api_base: Option<String>,
}

impl InsiderActivitySource {
    pub fn new(api_base: Option<String>) -> Self {
        Self { api_base }
    }
}

#[async_trait]
impl DataSource for InsiderActivitySource {
    fn id(&self) -> SourceId {
        SourceId::Insider
    }

    fn is_active(&self, ctx: &ActivationContext) -> bool {
        ctx.has_layer(CadenceLayer::Weekly) || ctx.red_flags_pending
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<Payload, SourceError> {
        let api_base = self
            .api_base
            .as_deref()
            .ok_or(SourceError::NotConfigured("INSIDER_API_BASE"))?;

        let client = http_client(ctx.config.source_timeout_secs)?;
        let lookback = ctx.config.insider_lookback_days;
        let mut results = BTreeMap::new();

        for (i, item) in ctx.watchlist.watchlist.iter().enumerate() {
            request_pause(ctx, i).await;

            let url = format!("{}?symbol={}&days={}", api_base, item.symbol, lookback);
            let transactions: Vec<InsiderTransaction> = match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => resp
                    .json()
                    .await
                    .map_err(|e| SourceError::Decode(e.to_string()))?,
                Ok(resp) => {
                    return Err(SourceError::Http(format!(
                        "insider endpoint returned {}",
                        resp.status()
                    )))
                }
                Err(e) => return Err(e.into()),
            };

            let cluster_alert = detect_cluster_selling(&transactions, lookback);
            results.insert(
                item.symbol.clone(),
                InsiderActivity {
                    transaction_count: transactions.len(),
                    cluster_alert,
                    transactions,
                },
            );
        }

        Ok(Payload::Insider(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(trade_date: &str, name: &str) -> InsiderTransaction {
        InsiderTransaction {
            filing_date: trade_date.to_string(),
            trade_date: trade_date.to_string(),
            insider_name: name.to_string(),
            title: "EVP".to_string(),
            trade_type: "S - Sale".to_string(),
            price: Some(100.0),
            shares: Some(-5000),
            value: Some(-500_000.0),
            filing_url: None,
        }
    }

    fn buy(trade_date: &str, name: &str) -> InsiderTransaction {
        InsiderTransaction {
            trade_type: "P - Purchase".to_string(),
            ..sale(trade_date, name)
        }
    }

    #[test]
    fn test_two_distinct_sellers_in_window_trip_cluster() {
        let txs = vec![sale("2026-08-03", "Alice Smith"), sale("2026-08-06", "Bob Jones")];
        assert!(detect_cluster_selling(&txs, 7));
    }

    #[test]
    fn test_same_seller_twice_is_not_a_cluster() {
        let txs = vec![sale("2026-08-03", "Alice Smith"), sale("2026-08-06", "Alice Smith")];
        assert!(!detect_cluster_selling(&txs, 7));
    }

    #[test]
    fn test_sellers_outside_window_do_not_cluster() {
        let txs = vec![sale("2026-07-01", "Alice Smith"), sale("2026-08-06", "Bob Jones")];
        assert!(!detect_cluster_selling(&txs, 7));
    }

    #[test]
    fn test_purchases_do_not_count() {
        let txs = vec![
            buy("2026-08-03", "Alice Smith"),
            buy("2026-08-04", "Bob Jones"),
            sale("2026-08-05", "Carol White"),
        ];
        assert!(!detect_cluster_selling(&txs, 7));
    }

    #[test]
    fn test_unparseable_trade_dates_are_ignored() {
        let txs = vec![sale("yesterday", "Alice Smith"), sale("2026-08-06", "Bob Jones")];
        assert!(!detect_cluster_selling(&txs, 7));
    }
}
