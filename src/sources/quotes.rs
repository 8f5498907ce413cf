//! Watchlist quote snapshot (primary quantitative source)
//!
//! Batch quote endpoint, one request for the whole watchlist. Field set
//! follows the guardrail needs: price, 1-day move, valuation ratios, last
//! trade date. Per-ticker fetch problems land in the snapshot's `error`
//! field instead of failing the source.

use super::{
    http_client, ActivationContext, DataSource, FetchContext, Payload, SourceError, SourceId,
};
use crate::cadence::CadenceLayer;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub symbol: String,
    pub company: String,
    pub price: Option<f64>,
    pub change_pct: Option<f64>,
    pub market_cap: Option<i64>,
    pub pe_trailing: Option<f64>,
    pub pe_forward: Option<f64>,
    pub ev_ebitda: Option<f64>,
    pub ps_ratio: Option<f64>,
    pub last_trade_date: Option<NaiveDate>,
    pub error: Option<String>,
}

impl QuoteSnapshot {
    pub fn missing(symbol: &str, company: &str, detail: String) -> Self {
        Self {
            symbol: symbol.to_string(),
            company: company.to_string(),
            price: None,
            change_pct: None,
            market_cap: None,
            pe_trailing: None,
            pe_forward: None,
            ev_ebitda: None,
            ps_ratio: None,
            last_trade_date: None,
            error: Some(detail),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(rename = "quoteResponse")]
    quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<RawQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuote {
    symbol: String,
    regular_market_price: Option<f64>,
    regular_market_previous_close: Option<f64>,
    regular_market_time: Option<i64>,
    market_cap: Option<i64>,
    trailing_pe: Option<f64>,
    forward_pe: Option<f64>,
    enterprise_to_ebitda: Option<f64>,
    price_to_sales_trailing12_months: Option<f64>,
}

/// One-day move with the same sanity bounds the guardrails assume: a
/// previous close off by orders of magnitude is treated as unusable.
pub fn compute_change_pct(price: Option<f64>, previous_close: Option<f64>) -> Option<f64> {
    let (price, prev) = (price?, previous_close?);
    if prev == 0.0 || price == prev {
        return None;
    }
    if prev < price * 0.01 || prev > price * 100.0 {
        return None;
    }
    Some(((price - prev) / prev * 100.0 * 100.0).round() / 100.0)
}

fn epoch_to_date(epoch: Option<i64>) -> Option<NaiveDate> {
    epoch
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.date_naive())
}

pub struct QuotesSource {
    api_base: String,
}

impl QuotesSource {
    pub fn new(api_base: String) -> Self {
        Self { api_base }
    }

    fn snapshot_from_raw(raw: &RawQuote, company: &str) -> QuoteSnapshot {
        let price = raw
            .regular_market_price
            .or(raw.regular_market_previous_close);
        QuoteSnapshot {
            symbol: raw.symbol.clone(),
            company: company.to_string(),
            price,
            change_pct: compute_change_pct(
                raw.regular_market_price,
                raw.regular_market_previous_close,
            ),
            market_cap: raw.market_cap,
            pe_trailing: raw.trailing_pe,
            pe_forward: raw.forward_pe,
            ev_ebitda: raw.enterprise_to_ebitda,
            ps_ratio: raw.price_to_sales_trailing12_months,
            last_trade_date: epoch_to_date(raw.regular_market_time),
            error: None,
        }
    }
}

#[async_trait]
impl DataSource for QuotesSource {
    fn id(&self) -> SourceId {
        SourceId::Quotes
    }

    fn is_active(&self, ctx: &ActivationContext) -> bool {
        ctx.has_layer(CadenceLayer::Daily)
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<Payload, SourceError> {
        let symbols = ctx.watchlist.symbols();
        let url = format!("{}?symbols={}", self.api_base, symbols.join(","));

        let client = http_client(ctx.config.source_timeout_secs)?;
        let response = client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Http(format!(
                "quote endpoint returned {}",
                response.status()
            )));
        }

        let envelope: QuoteEnvelope = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        // Watchlist order, not response order; absent symbols become
        // per-ticker errors so guardrails can count them.
        let mut snapshots = Vec::with_capacity(ctx.watchlist.watchlist.len());
        for item in &ctx.watchlist.watchlist {
            let raw = envelope
                .quote_response
                .result
                .iter()
                .find(|q| q.symbol == item.symbol);
            match raw {
                Some(raw) => snapshots.push(Self::snapshot_from_raw(raw, &item.company)),
                None => snapshots.push(QuoteSnapshot::missing(
                    &item.symbol,
                    &item.company,
                    "No data returned from quote endpoint".to_string(),
                )),
            }
        }

        Ok(Payload::Quotes(snapshots))
    }
}
