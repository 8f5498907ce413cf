//! Environment descriptor resolved once at run start
//!
//! Downstream components consume this value object instead of re-probing
//! paths and capabilities themselves.

use crate::config::RuntimeConfig;
use std::path::PathBuf;

/// Capability flags discovered by probing the configuration at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub calendar_provider: bool,
    pub notification: bool,
    pub news_search: bool,
    pub insider_feed: bool,
    pub market_pulse: bool,
    pub prediction_markets: bool,
    pub analyst_consensus: bool,
}

/// Resolved environment for one run: tag, paths, and capability flags.
#[derive(Debug, Clone)]
pub struct EnvironmentDescriptor {
    pub tag: String,
    pub report_dir: PathBuf,
    pub watchlist_path: PathBuf,
    pub capabilities: Capabilities,
}

impl EnvironmentDescriptor {
    /// Probe the configuration once and freeze the result.
    pub fn resolve(config: &RuntimeConfig) -> Self {
        let capabilities = Capabilities {
            calendar_provider: config.calendar_api_base.is_some(),
            notification: config.notify_endpoint.is_some() && config.notify_recipient.is_some(),
            news_search: config.news_api_base.is_some(),
            insider_feed: config.insider_api_base.is_some(),
            market_pulse: config.pulse_api_base.is_some(),
            prediction_markets: config.prediction_api_base.is_some(),
            analyst_consensus: config.consensus_api_base.is_some(),
        };

        log::info!(
            "🌐 Environment '{}': reports -> {}, watchlist -> {}",
            config.environment_tag,
            config.report_dir.display(),
            config.watchlist_path.display()
        );
        if !capabilities.notification {
            log::info!("   Notification endpoint not configured; delivery will be file-only");
        }
        if !capabilities.calendar_provider {
            log::info!("   Calendar provider not configured; weekday fallback in effect");
        }

        Self {
            tag: config.environment_tag.clone(),
            report_dir: config.report_dir.clone(),
            watchlist_path: config.watchlist_path.clone(),
            capabilities,
        }
    }
}
