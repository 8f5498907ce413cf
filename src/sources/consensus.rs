//! Sell-side consensus targets and estimate revisions

use super::{
    http_client, request_pause, ActivationContext, DataSource, FetchContext, Payload, SourceError,
    SourceId,
};
use crate::cadence::CadenceLayer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusEntry {
    pub symbol: String,
    #[serde(default)]
    pub mean_target: Option<f64>,
    #[serde(default)]
    pub high_target: Option<f64>,
    #[serde(default)]
    pub low_target: Option<f64>,
    #[serde(default)]
    pub rating: Option<String>,
    #[serde(default)]
    pub revisions_up_30d: Option<u32>,
    #[serde(default)]
    pub revisions_down_30d: Option<u32>,
}

pub struct AnalystConsensusSource {
    api_base: Option<String>,
}

impl AnalystConsensusSource {
    pub fn new(api_base: Option<String>) -> Self {
        Self { api_base }
    }
}

#[async_trait]
impl DataSource for AnalystConsensusSource {
    fn id(&self) -> SourceId {
        SourceId::AnalystConsensus
    }

    fn is_active(&self, ctx: &ActivationContext) -> bool {
        ctx.has_layer(CadenceLayer::Weekly)
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<Payload, SourceError> {
        let api_base = self
            .api_base
            .as_deref()
            .ok_or(SourceError::NotConfigured("CONSENSUS_API_BASE"))?;

        let client = http_client(ctx.config.source_timeout_secs)?;
        let mut entries = Vec::with_capacity(ctx.watchlist.watchlist.len());

        for (i, item) in ctx.watchlist.watchlist.iter().enumerate() {
            request_pause(ctx, i).await;

            let url = format!("{}?symbol={}", api_base, item.symbol);
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let entry: ConsensusEntry = resp
                        .json()
                        .await
                        .map_err(|e| SourceError::Decode(e.to_string()))?;
                    entries.push(entry);
                }
                Ok(resp) => {
                    log::warn!(
                        "⚠️  consensus: {}: endpoint returned {}",
                        item.symbol,
                        resp.status()
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Payload::Consensus(entries))
    }
}
