//! Briefing orchestration
//!
//! One run per date: cadence decision, concurrent source fan-out with
//! per-source timeouts and failure isolation, a sequenced second pass for
//! red-flag-triggered sources, guardrail evaluation, depth escalation,
//! assembly, and best-effort delivery. Nothing in here aborts the run;
//! every failure degrades content instead.

use crate::cadence::{self, Depth};
use crate::calendar::TradingCalendar;
use crate::config::{ProposedUpdate, RuntimeConfig, WatchlistSnapshot};
use crate::delivery::{DeliverySink, Notifier};
use crate::environment::EnvironmentDescriptor;
use crate::guardrails::{self, RunStatus};
use crate::red_flags;
use crate::report::{self, RunReport};
use crate::sources::{
    ActivationContext, DataSource, DataSourceResult, FetchContext, Payload, SourceError, SourceId,
    SourceStatus,
};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// What a completed run hands back to the binary.
pub struct RunOutcome {
    pub report: RunReport,
    pub rendered: String,
    pub artifact_path: Option<PathBuf>,
    pub notified: bool,
}

impl RunOutcome {
    pub fn earnings_updates(&self) -> &[ProposedUpdate] {
        &self.report.earnings_updates
    }
}

/// Final depth from the union of all trigger conditions, computed once.
/// Monotonic: escalation only, never a downgrade.
fn final_depth(
    initial: Depth,
    quotes_failed: bool,
    manual_review: bool,
    any_red_flags: bool,
) -> Depth {
    let mut depth = initial;
    if quotes_failed || manual_review || any_red_flags {
        depth = depth.max(Depth::Detailed);
    }
    depth
}

async fn fetch_source(
    source: Arc<dyn DataSource>,
    ctx: Arc<FetchContext>,
    timeout_secs: u64,
) -> DataSourceResult {
    let id = source.id();
    log::info!("📡 {}: fetching...", id);

    match tokio::time::timeout(Duration::from_secs(timeout_secs), source.fetch(&ctx)).await {
        Ok(Ok(payload)) => {
            log::info!("✅ {}: ok", id);
            DataSourceResult::ok(id, payload)
        }
        Ok(Err(e)) => {
            log::warn!("❌ {}: {}", id, e);
            DataSourceResult::failed(id, e.to_string())
        }
        Err(_) => {
            let e = SourceError::Timeout(timeout_secs);
            log::warn!("❌ {}: {}", id, e);
            DataSourceResult::failed(id, e.to_string())
        }
    }
}

pub struct Briefing {
    config: RuntimeConfig,
    environment: EnvironmentDescriptor,
    sources: Vec<Arc<dyn DataSource>>,
    calendar: Arc<dyn TradingCalendar>,
    sink: Box<dyn DeliverySink>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl Briefing {
    pub fn new(
        config: RuntimeConfig,
        environment: EnvironmentDescriptor,
        sources: Vec<Arc<dyn DataSource>>,
        calendar: Arc<dyn TradingCalendar>,
        sink: Box<dyn DeliverySink>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            config,
            environment,
            sources,
            calendar,
            sink,
            notifier,
        }
    }

    /// Execute one dated run to completion. Never aborts: failures degrade
    /// depth or content and land in the ledger.
    pub async fn run(&mut self, date: NaiveDate, watchlist: WatchlistSnapshot) -> RunOutcome {
        let trading_day = self.calendar.check(date).await;
        if !trading_day.open {
            log::info!(
                "🛑 {} is not a trading day ({}); short-circuiting",
                date,
                trading_day.reason.as_deref().unwrap_or("closed")
            );
            let report = RunReport::markets_closed(
                date,
                self.environment.tag.clone(),
                watchlist.symbols(),
                trading_day.reason.clone(),
            );
            // Closed days still go through delivery so same-date overwrite
            // semantics hold, but never through notification.
            return self.finish(report, false).await;
        }

        let prior_manual_review = report::prior_run_status(&self.environment.report_dir, date)
            == Some(RunStatus::ManualReview);
        if prior_manual_review {
            log::info!("📋 Prior run ended in manual review; starting at detailed depth");
        }

        let decision = cadence::evaluate(
            date,
            &watchlist,
            self.config.guardrails.earnings_window_days,
            prior_manual_review,
        );
        log::info!(
            "🗓  Active layers: [{}], initial depth: {}",
            decision.layer_names(),
            decision.initial_depth.as_str()
        );

        let ctx = Arc::new(FetchContext {
            date,
            watchlist: watchlist.clone(),
            config: self.config.clone(),
        });

        // Stage 1: every activated source fans out concurrently. One
        // source's failure or timeout never touches the others.
        let activation = ActivationContext {
            layers: decision.layers.clone(),
            depth: decision.initial_depth,
            red_flags_pending: false,
        };

        let mut results: Vec<DataSourceResult> = self
            .sources
            .iter()
            .map(|s| DataSourceResult::skipped(s.id()))
            .collect();

        let mut handles = Vec::new();
        for (i, source) in self.sources.iter().enumerate() {
            if !source.is_active(&activation) {
                continue;
            }
            let source = Arc::clone(source);
            let ctx = Arc::clone(&ctx);
            let timeout_secs = self.config.source_timeout_secs;
            handles.push((
                i,
                source.id(),
                tokio::spawn(async move { fetch_source(source, ctx, timeout_secs).await }),
            ));
        }
        for (i, id, handle) in handles {
            results[i] = match handle.await {
                Ok(result) => result,
                Err(e) => DataSourceResult::failed(id, format!("task failed: {}", e)),
            };
        }

        // Stage 2: a red flag in first-stage results re-opens activation
        // for sources that only run once something looks wrong. These are
        // sequenced, not raced, against the scan that triggered them.
        let first_pass_flags = red_flags::scan(
            &results,
            self.config.guardrails.price_move_pct_threshold,
        );
        if !first_pass_flags.is_empty() {
            let escalated = ActivationContext {
                layers: decision.layers.clone(),
                depth: decision.initial_depth,
                red_flags_pending: true,
            };
            for (i, source) in self.sources.iter().enumerate() {
                if results[i].status != SourceStatus::Skipped || !source.is_active(&escalated) {
                    continue;
                }
                log::info!("🚩 Red flags present; running {} follow-up", source.id());
                results[i] = fetch_source(
                    Arc::clone(source),
                    Arc::clone(&ctx),
                    self.config.source_timeout_secs,
                )
                .await;
            }
        }

        let flags = red_flags::scan(&results, self.config.guardrails.price_move_pct_threshold);

        let quotes_result = results.iter().find(|r| r.source == SourceId::Quotes);
        let quotes_failed = quotes_result.map_or(true, |r| r.status == SourceStatus::Failed);
        let snapshots = quotes_result.and_then(|r| match &r.payload {
            Some(Payload::Quotes(snapshots)) => Some(snapshots.as_slice()),
            _ => None,
        });
        if quotes_failed {
            log::warn!("⚠️  Quantitative source failed; proceeding with partial data");
        }

        let guardrail_outcome = guardrails::evaluate(
            snapshots,
            &decision.earnings_due,
            &self.config.guardrails,
            date,
        );

        let depth = final_depth(
            decision.initial_depth,
            quotes_failed,
            guardrail_outcome.status == RunStatus::ManualReview,
            !flags.is_empty(),
        );

        let earnings_updates = results
            .iter()
            .find_map(|r| match &r.payload {
                Some(Payload::MarketPulse(pulse)) => Some(pulse.earnings_updates.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let action_items = report::synthesize_action_items(
            &flags,
            &guardrail_outcome.triggered,
            &decision.earnings_due,
        );

        let report = RunReport {
            date,
            environment: self.environment.tag.clone(),
            tickers: watchlist.symbols(),
            layers: decision.layers,
            depth,
            status: guardrail_outcome.status,
            market_open: true,
            closed_reason: None,
            results,
            red_flags: flags,
            guardrail_triggers: guardrail_outcome.triggered,
            earnings_due: decision.earnings_due,
            action_items,
            earnings_updates,
        };

        self.finish(report, true).await
    }

    /// Render, deliver, optionally notify, and log the completion summary.
    async fn finish(&mut self, report: RunReport, allow_notify: bool) -> RunOutcome {
        let rendered = report::render(&report);

        let artifact_path = match self.sink.deliver(report.date, &rendered).await {
            Ok(path) => path,
            Err(e) => {
                // Persistence failure falls back to the primary output
                // stream; the run still completes.
                log::error!("❌ Persistence via {} failed: {}", self.sink.sink_type(), e);
                println!("{}", rendered);
                None
            }
        };

        let mut notified = false;
        if allow_notify {
            if let Some(notifier) = &self.notifier {
                let subject = format!(
                    "Daily Stock Check-In {} - {}",
                    report.date,
                    report.status.as_str()
                );
                match notifier.notify(&subject, &rendered).await {
                    Ok(()) => notified = true,
                    Err(e) => log::warn!("⚠️  Notification failed (ignored): {}", e),
                }
            }
        }

        log_completion(&report, artifact_path.as_deref(), notified);

        RunOutcome {
            report,
            rendered,
            artifact_path,
            notified,
        }
    }
}

fn log_completion(report: &RunReport, artifact: Option<&std::path::Path>, notified: bool) {
    log::info!("🏁 Run complete for {}", report.date);
    log::info!("   Environment: {}", report.environment);
    log::info!("   Status: {}", report.status.as_str());
    log::info!("   Depth: {}", report.depth.as_str());
    log::info!("   Layers: [{}]", report.layer_names());
    match artifact {
        Some(path) => log::info!("   Output: {}", path.display()),
        None => log::info!("   Output: stdout"),
    }
    log::info!("   Notified: {}", notified);
    for result in &report.results {
        match &result.error {
            Some(e) => log::info!("   {} -> {} ({})", result.source, result.status.as_str(), e),
            None => log::info!("   {} -> {}", result.source, result.status.as_str()),
        }
    }
    for item in report.action_items.iter().take(3) {
        log::info!("   • {}", item);
    }
}
