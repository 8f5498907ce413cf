//! Trading-day check with provider fallback
//!
//! Primary: a configured market-calendar endpoint. Fallback: weekday
//! heuristic. Either way one unified answer is surfaced, so callers never
//! branch on which provider responded.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Deserialize;
use std::time::Duration;

/// Unified trading-day answer.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingDay {
    pub open: bool,
    /// Which provider produced the answer, for the run log.
    pub source: &'static str,
    /// Present when the market is closed (holiday name, "weekend", ...).
    pub reason: Option<String>,
}

#[async_trait]
pub trait TradingCalendar: Send + Sync {
    async fn check(&self, date: NaiveDate) -> TradingDay;
}

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    open: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Calendar provider with weekday fallback.
pub struct MarketCalendar {
    api_base: Option<String>,
    timeout_secs: u64,
}

impl MarketCalendar {
    pub fn new(api_base: Option<String>, timeout_secs: u64) -> Self {
        Self {
            api_base,
            timeout_secs,
        }
    }

    async fn query_provider(&self, base: &str, date: NaiveDate) -> Result<TradingDay, String> {
        let url = format!("{}/{}", base.trim_end_matches('/'), date);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| e.to_string())?;

        let response = client.get(&url).send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("calendar provider returned {}", response.status()));
        }

        let parsed: CalendarResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(TradingDay {
            open: parsed.open,
            source: "provider",
            reason: parsed.reason,
        })
    }

    fn weekday_fallback(date: NaiveDate) -> TradingDay {
        let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
        TradingDay {
            open: !weekend,
            source: "weekday_fallback",
            reason: weekend.then(|| "weekend".to_string()),
        }
    }
}

#[async_trait]
impl TradingCalendar for MarketCalendar {
    async fn check(&self, date: NaiveDate) -> TradingDay {
        if let Some(base) = &self.api_base {
            match self.query_provider(base, date).await {
                Ok(answer) => return answer,
                Err(e) => {
                    log::warn!("⚠️  Calendar provider unavailable ({}), using weekday fallback", e);
                }
            }
        }
        Self::weekday_fallback(date)
    }
}
