//! Prediction-market prices for tracked macro questions

use super::{http_client, ActivationContext, DataSource, FetchContext, Payload, SourceError, SourceId};
use crate::cadence::CadenceLayer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub question: String,
    /// Implied probability in [0, 1].
    pub probability: f64,
    #[serde(default)]
    pub move_24h: Option<f64>,
}

pub struct PredictionMarketsSource {
    api_base: Option<String>,
}

impl PredictionMarketsSource {
    pub fn new(api_base: Option<String>) -> Self {
        Self { api_base }
    }
}

#[async_trait]
impl DataSource for PredictionMarketsSource {
    fn id(&self) -> SourceId {
        SourceId::PredictionMarkets
    }

    fn is_active(&self, ctx: &ActivationContext) -> bool {
        ctx.has_layer(CadenceLayer::BiMonthly)
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<Payload, SourceError> {
        let api_base = self
            .api_base
            .as_deref()
            .ok_or(SourceError::NotConfigured("PREDICTION_API_BASE"))?;

        let client = http_client(ctx.config.source_timeout_secs)?;
        let url = format!("{}?tag=macro", api_base);

        let response = client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Http(format!(
                "prediction endpoint returned {}",
                response.status()
            )));
        }

        let quotes: Vec<MarketQuote> = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        Ok(Payload::PredictionMarkets(quotes))
    }
}
