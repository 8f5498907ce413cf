//! SEC EDGAR full-text search over the trailing week
//!
//! The EDGAR envelope varies between `hits.hits` and a bare list, and
//! individual hits bury fields at different depths, so parsing goes through
//! `serde_json::Value` rather than a rigid struct. Filings are deduplicated
//! by accession number per ticker.

use super::{
    http_client, request_pause, ActivationContext, DataSource, FetchContext, Payload, SourceError,
    SourceId,
};
use crate::cadence::CadenceLayer;
use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

const FORM_TYPES: &str = "8-K,10-Q,10-K,4,SC 13D,SC 13G,S-3,424B5";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filing {
    pub filing_type: String,
    pub filed_date: String,
    pub title: String,
    pub url: String,
    /// 8-K item numbers when present ("5.02", "4.01", ...).
    pub items: Vec<String>,
}

pub struct SecFilingsSource {
    search_base: String,
    user_agent: String,
}

impl SecFilingsSource {
    pub fn new(search_base: String, user_agent: String) -> Self {
        Self {
            search_base,
            user_agent,
        }
    }

    fn hits_from_envelope(body: &Value) -> Vec<Value> {
        let wrapper = body.get("hits").unwrap_or(body);
        match wrapper {
            Value::Array(list) => list.clone(),
            Value::Object(_) => wrapper
                .get("hits")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn filing_from_hit(hit: &Value, seen_adsh: &mut HashSet<String>) -> Option<Filing> {
        let src = hit.get("_source").unwrap_or(hit);

        let adsh = src
            .get("adsh")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if !seen_adsh.insert(adsh.clone()) {
            return None;
        }

        let mut filing_type = src
            .get("form")
            .or_else(|| src.get("file_type"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if filing_type.is_empty() {
            filing_type = src
                .get("root_forms")
                .and_then(Value::as_array)
                .and_then(|forms| forms.first())
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
        }

        let filed_date = src
            .get("file_date")
            .or_else(|| src.get("date_filed"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let title = match src.get("display_names").or_else(|| src.get("entity_name")) {
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("; "),
            Some(Value::String(name)) => name.clone(),
            _ => String::new(),
        };

        let cik = src
            .get("ciks")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
            .and_then(Value::as_str)
            .unwrap_or_default();
        let url = if !adsh.is_empty() && !cik.is_empty() {
            format!("https://www.sec.gov/Archives/edgar/data/{}/{}/", cik, adsh)
        } else {
            String::new()
        };

        let items = src
            .get("items")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(Filing {
            filing_type: filing_type.trim().to_string(),
            filed_date: filed_date.trim().to_string(),
            title: title.trim().to_string(),
            url,
            items,
        })
    }
}

#[async_trait]
impl DataSource for SecFilingsSource {
    fn id(&self) -> SourceId {
        SourceId::Filings
    }

    fn is_active(&self, ctx: &ActivationContext) -> bool {
        ctx.has_layer(CadenceLayer::Daily)
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<Payload, SourceError> {
        let client = http_client(ctx.config.source_timeout_secs)?;
        let start = ctx.date - Duration::days(7);

        let mut results: BTreeMap<String, Vec<Filing>> = BTreeMap::new();
        let mut errors = Vec::new();

        for (i, item) in ctx.watchlist.watchlist.iter().enumerate() {
            request_pause(ctx, i).await;

            let url = format!(
                "{}?q=%22{}%22&forms={}&dateRange=custom&startdt={}&enddt={}",
                self.search_base,
                item.symbol,
                FORM_TYPES.replace(' ', "%20"),
                start,
                ctx.date
            );

            let response = client
                .get(&url)
                .header("User-Agent", &self.user_agent)
                .header("Accept", "application/json")
                .send()
                .await;

            let body: Value = match response {
                Ok(resp) if resp.status().is_success() => match resp.json().await {
                    Ok(body) => body,
                    Err(e) => {
                        errors.push(format!("{}: invalid JSON response ({})", item.symbol, e));
                        results.insert(item.symbol.clone(), Vec::new());
                        continue;
                    }
                },
                Ok(resp) => {
                    errors.push(format!("{}: EDGAR returned {}", item.symbol, resp.status()));
                    results.insert(item.symbol.clone(), Vec::new());
                    continue;
                }
                Err(e) => {
                    errors.push(format!("{}: {}", item.symbol, e));
                    results.insert(item.symbol.clone(), Vec::new());
                    continue;
                }
            };

            let mut seen_adsh = HashSet::new();
            let filings: Vec<Filing> = Self::hits_from_envelope(&body)
                .iter()
                .filter_map(|hit| Self::filing_from_hit(hit, &mut seen_adsh))
                .collect();
            results.insert(item.symbol.clone(), filings);
        }

        // All tickers failing is a source failure; partial trouble is not.
        if results.values().all(|f| f.is_empty()) && errors.len() == results.len() {
            return Err(SourceError::Http(errors.join("; ")));
        }
        for e in &errors {
            log::warn!("⚠️  filings: {}", e);
        }

        Ok(Payload::Filings(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_nested_hits_and_dedups_accessions() {
        let body = json!({
            "hits": {
                "hits": [
                    {"_source": {
                        "adsh": "0001-23-000045",
                        "form": "8-K",
                        "file_date": "2026-08-05",
                        "display_names": ["NVIDIA CORP (NVDA)"],
                        "ciks": ["1045810"],
                        "items": ["5.02", "9.01"]
                    }},
                    {"_source": {
                        "adsh": "0001-23-000045",
                        "form": "8-K",
                        "file_date": "2026-08-05"
                    }}
                ]
            }
        });

        let mut seen = HashSet::new();
        let filings: Vec<Filing> = SecFilingsSource::hits_from_envelope(&body)
            .iter()
            .filter_map(|hit| SecFilingsSource::filing_from_hit(hit, &mut seen))
            .collect();

        assert_eq!(filings.len(), 1);
        assert_eq!(filings[0].filing_type, "8-K");
        assert_eq!(filings[0].items, vec!["5.02", "9.01"]);
        assert!(filings[0].url.contains("1045810"));
    }

    #[test]
    fn test_falls_back_to_root_forms_and_string_title() {
        let body = json!({
            "hits": [
                {"root_forms": ["10-Q"],
                 "adsh": "0002-24-000099",
                 "date_filed": "2026-08-03",
                 "entity_name": "Modine Manufacturing"}
            ]
        });

        let mut seen = HashSet::new();
        let filings: Vec<Filing> = SecFilingsSource::hits_from_envelope(&body)
            .iter()
            .filter_map(|hit| SecFilingsSource::filing_from_hit(hit, &mut seen))
            .collect();

        assert_eq!(filings.len(), 1);
        assert_eq!(filings[0].filing_type, "10-Q");
        assert_eq!(filings[0].filed_date, "2026-08-03");
        assert_eq!(filings[0].title, "Modine Manufacturing");
        // No CIK means no URL, not a bogus one
        assert_eq!(filings[0].url, "");
    }
}
