//! Source Probe - Single-Source Diagnostic Tool
//!
//! Runs one named data source against the configured watchlist and dumps
//! its JSON envelope to stdout, bypassing cadence activation. Useful for
//! verifying endpoint configuration before wiring a source into the daily
//! run.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin source_probe -- --source quotes
//! cargo run --release --bin source_probe -- --source filings --date 2026-08-07
//! ```

use chrono::{Local, NaiveDate};
use stockbrief::config::{arg_value, RuntimeConfig, WatchlistSnapshot};
use stockbrief::sources::{default_registry, FetchContext, SourceId};

fn parse_source(name: &str) -> Option<SourceId> {
    SourceId::all().into_iter().find(|id| id.as_str() == name)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();

    let source_name = arg_value(&args, "--source").ok_or_else(|| {
        let known: Vec<&str> = SourceId::all().iter().map(|id| id.as_str()).collect();
        format!("--source is required (one of: {})", known.join(", "))
    })?;
    let source_id = parse_source(&source_name)
        .ok_or_else(|| format!("unknown source '{}'", source_name))?;

    let date: NaiveDate = match arg_value(&args, "--date") {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|_| format!("--date must be YYYY-MM-DD, got '{}'", raw))?,
        None => Local::now().date_naive(),
    };

    let mut config = RuntimeConfig::from_env();
    if let Some(path) = arg_value(&args, "--watchlist") {
        config.watchlist_path = path.into();
    }

    let watchlist = WatchlistSnapshot::load(&config.watchlist_path)?;

    let registry = default_registry(&config);
    let source = registry
        .iter()
        .find(|s| s.id() == source_id)
        .expect("registry covers every SourceId");

    let ctx = FetchContext {
        date,
        watchlist,
        config,
    };

    let (data, errors) = match source.fetch(&ctx).await {
        Ok(payload) => (serde_json::to_value(&payload)?, Vec::new()),
        Err(e) => (serde_json::Value::Null, vec![e.to_string()]),
    };

    let envelope = serde_json::json!({
        "source": source_id.as_str(),
        "date": date.to_string(),
        "data": data,
        "errors": errors,
    });

    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}
