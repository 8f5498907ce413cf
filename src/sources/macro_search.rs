//! Monthly macro and policy environment sweep
//!
//! Shares the headline search endpoint with the news source; the query set
//! is fixed (rate path, yields, export controls, tariffs).

use super::news::{search_headlines, Headline};
use super::{http_client, ActivationContext, DataSource, FetchContext, Payload, SourceError, SourceId};
use crate::cadence::CadenceLayer;
use async_trait::async_trait;

const MACRO_QUERIES: [&str; 4] = [
    "fed rate path",
    "10 year treasury yield",
    "semiconductor export controls",
    "tariff policy update",
];

const HEADLINES_PER_QUERY: usize = 3;

pub struct MacroSearchSource {
    api_base: Option<String>,
}

impl MacroSearchSource {
    pub fn new(api_base: Option<String>) -> Self {
        Self { api_base }
    }
}

#[async_trait]
impl DataSource for MacroSearchSource {
    fn id(&self) -> SourceId {
        SourceId::MacroSearch
    }

    fn is_active(&self, ctx: &ActivationContext) -> bool {
        ctx.has_layer(CadenceLayer::Monthly)
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<Payload, SourceError> {
        let api_base = self
            .api_base
            .as_deref()
            .ok_or(SourceError::NotConfigured("NEWS_API_BASE"))?;

        let client = http_client(ctx.config.source_timeout_secs)?;
        let mut headlines: Vec<Headline> = Vec::new();

        for query in MACRO_QUERIES {
            match search_headlines(&client, api_base, query, HEADLINES_PER_QUERY).await {
                Ok(found) => headlines.extend(found),
                Err(e) => log::warn!("⚠️  macro_search: '{}': {}", query, e),
            }
        }

        if headlines.is_empty() {
            return Err(SourceError::Http(
                "no macro headlines returned for any query".to_string(),
            ));
        }

        Ok(Payload::MacroSearch(headlines))
    }
}
