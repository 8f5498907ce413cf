//! Daily Check-In Binary - One-Shot Briefing Run
//!
//! Runs the full cadence-aware briefing for one date: calendar check,
//! source fan-out, red-flag scan, report assembly, and delivery.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin daily_checkin
//! cargo run --release --bin daily_checkin -- --date 2026-08-07
//! cargo run --release --bin daily_checkin -- --stdout-only
//! cargo run --release --bin daily_checkin -- --watchlist config/watchlist.json
//! ```
//!
//! ## Environment Variables
//!
//! - WATCHLIST_PATH - Watchlist JSON file (default: config/watchlist.json)
//! - REPORT_DIR - Report output directory (default: reports)
//! - QUOTE_API_BASE, EDGAR_SEARCH_BASE - quantitative endpoints (real defaults)
//! - CALENDAR_API_BASE, NEWS_API_BASE, INSIDER_API_BASE, PULSE_API_BASE,
//!   PREDICTION_API_BASE, CONSENSUS_API_BASE - optional provider endpoints
//! - NOTIFY_ENDPOINT, NOTIFY_RECIPIENT - optional email-draft delivery
//! - RUST_LOG - Logging level (optional, default: info)

use chrono::{Local, NaiveDate};
use std::sync::Arc;
use stockbrief::calendar::MarketCalendar;
use stockbrief::config::{arg_value, has_flag, RuntimeConfig, WatchlistSnapshot};
use stockbrief::delivery::{DeliverySink, EmailDraftNotifier, Notifier, ReportFileSink, StdoutSink};
use stockbrief::environment::EnvironmentDescriptor;
use stockbrief::orchestrator::Briefing;
use stockbrief::sources::default_registry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let stdout_only = has_flag(&args, "--stdout-only");

    let mut config = RuntimeConfig::from_env();
    if let Some(path) = arg_value(&args, "--watchlist") {
        config.watchlist_path = path.into();
    }

    // Run-date resolution is the only hard-fatal step.
    let run_date: NaiveDate = match arg_value(&args, "--date") {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|_| format!("--date must be YYYY-MM-DD, got '{}'", raw))?,
        None => Local::now().date_naive(),
    };

    let environment = EnvironmentDescriptor::resolve(&config);

    let watchlist = WatchlistSnapshot::load(&environment.watchlist_path).map_err(|e| {
        format!(
            "cannot load watchlist {}: {}",
            environment.watchlist_path.display(),
            e
        )
    })?;

    log::info!("🚀 Starting daily check-in for {}", run_date);
    log::info!("   Watchlist: {}", watchlist.symbols().join(", "));

    let sources = default_registry(&config);
    let calendar = Arc::new(MarketCalendar::new(
        config.calendar_api_base.clone(),
        config.source_timeout_secs,
    ));

    let sink: Box<dyn DeliverySink> = if stdout_only {
        Box::new(StdoutSink)
    } else {
        Box::new(ReportFileSink::new(&environment.report_dir))
    };

    let notifier: Option<Arc<dyn Notifier>> = match (
        stdout_only,
        environment.capabilities.notification,
        &config.notify_endpoint,
        &config.notify_recipient,
    ) {
        (false, true, Some(endpoint), Some(recipient)) => Some(Arc::new(
            EmailDraftNotifier::new(endpoint.clone(), recipient.clone()),
        )),
        _ => None,
    };

    let mut briefing = Briefing::new(
        config,
        environment.clone(),
        sources,
        calendar,
        sink,
        notifier,
    );

    let outcome = briefing.run(run_date, watchlist.clone()).await;

    // Earnings refresh is applied between runs, never mid-run. A failed
    // apply only costs next run a re-proposal.
    if !stdout_only && !outcome.earnings_updates().is_empty() {
        match watchlist.save_with_updates(&environment.watchlist_path, outcome.earnings_updates()) {
            Ok(applied) if applied > 0 => {
                log::info!("📅 Applied {} earnings date update(s) to watchlist", applied);
            }
            Ok(_) => {}
            Err(e) => log::warn!("⚠️  Could not apply earnings updates: {}", e),
        }
    }

    if stdout_only {
        // Report already went to stdout through the sink.
        return Ok(());
    }

    println!(
        "Wrote daily check-in: {}",
        outcome
            .artifact_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout (persistence fallback)".to_string())
    );
    println!("Status: {}", outcome.report.status.as_str());
    if !outcome.report.guardrail_triggers.is_empty() {
        println!("Guardrails:");
        for trigger in &outcome.report.guardrail_triggers {
            println!(" - {}", trigger);
        }
    }

    Ok(())
}
