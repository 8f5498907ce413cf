//! Per-ticker headline search

use super::{
    http_client, request_pause, ActivationContext, DataSource, FetchContext, Payload, SourceError,
    SourceId,
};
use crate::cadence::CadenceLayer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

pub struct NewsSource {
    api_base: Option<String>,
}

impl NewsSource {
    pub fn new(api_base: Option<String>) -> Self {
        Self { api_base }
    }
}

/// Shared by news and macro search: query a search endpoint for headlines.
pub(crate) async fn search_headlines(
    client: &reqwest::Client,
    api_base: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<Headline>, SourceError> {
    let url = format!("{}?q={}&limit={}", api_base, query, limit);

    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        return Err(SourceError::Http(format!(
            "search endpoint returned {}",
            response.status()
        )));
    }

    let headlines: Vec<Headline> = response
        .json()
        .await
        .map_err(|e| SourceError::Decode(e.to_string()))?;
    Ok(headlines)
}

#[async_trait]
impl DataSource for NewsSource {
    fn id(&self) -> SourceId {
        SourceId::News
    }

    fn is_active(&self, ctx: &ActivationContext) -> bool {
        ctx.has_layer(CadenceLayer::Daily)
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<Payload, SourceError> {
        let api_base = self
            .api_base
            .as_deref()
            .ok_or(SourceError::NotConfigured("NEWS_API_BASE"))?;

        let client = http_client(ctx.config.source_timeout_secs)?;
        let mut results = BTreeMap::new();

        for (i, item) in ctx.watchlist.watchlist.iter().enumerate() {
            request_pause(ctx, i).await;
            match search_headlines(
                &client,
                api_base,
                &item.symbol,
                ctx.config.news_headline_limit,
            )
            .await
            {
                Ok(headlines) => {
                    results.insert(item.symbol.clone(), headlines);
                }
                Err(e) => {
                    log::warn!("⚠️  news: {}: {}", item.symbol, e);
                    results.insert(item.symbol.clone(), Vec::new());
                }
            }
        }

        Ok(Payload::News(results))
    }
}
