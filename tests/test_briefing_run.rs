//! Integration tests for the orchestrated briefing run
//!
//! Mock sources, calendar, and notifier exercise the end-to-end control
//! flow: closed-market short-circuit, per-source failure isolation, depth
//! escalation, red-flag-triggered follow-ups, and idempotent persistence.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use stockbrief::cadence::Depth;
use stockbrief::calendar::{TradingCalendar, TradingDay};
use stockbrief::config::{ProposedUpdate, RuntimeConfig, WatchlistItem, WatchlistSnapshot};
use stockbrief::delivery::{DeliveryError, Notifier, ReportFileSink};
use stockbrief::environment::{Capabilities, EnvironmentDescriptor};
use stockbrief::guardrails::RunStatus;
use stockbrief::orchestrator::Briefing;
use stockbrief::red_flags::RedFlagCategory;
use stockbrief::sources::{
    ActivationContext, DataSource, FetchContext, MarketPulse, Payload, QuoteSnapshot, SourceError,
    SourceId, SourceStatus,
};

struct StaticCalendar {
    open: bool,
    reason: Option<&'static str>,
}

#[async_trait]
impl TradingCalendar for StaticCalendar {
    async fn check(&self, _date: NaiveDate) -> TradingDay {
        TradingDay {
            open: self.open,
            source: "static",
            reason: self.reason.map(String::from),
        }
    }
}

enum Behavior {
    Ok(Payload),
    Fail(&'static str),
}

struct MockSource {
    id: SourceId,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
    /// When set, activates only on the red-flag follow-up pass.
    needs_red_flags: bool,
}

impl MockSource {
    fn ok(id: SourceId, payload: Payload) -> (Arc<AtomicUsize>, Arc<dyn DataSource>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source: Arc<dyn DataSource> = Arc::new(Self {
            id,
            behavior: Behavior::Ok(payload),
            calls: Arc::clone(&calls),
            needs_red_flags: false,
        });
        (calls, source)
    }

    fn failing(id: SourceId, detail: &'static str) -> (Arc<AtomicUsize>, Arc<dyn DataSource>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source: Arc<dyn DataSource> = Arc::new(Self {
            id,
            behavior: Behavior::Fail(detail),
            calls: Arc::clone(&calls),
            needs_red_flags: false,
        });
        (calls, source)
    }

    fn follow_up(id: SourceId, payload: Payload) -> (Arc<AtomicUsize>, Arc<dyn DataSource>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source: Arc<dyn DataSource> = Arc::new(Self {
            id,
            behavior: Behavior::Ok(payload),
            calls: Arc::clone(&calls),
            needs_red_flags: true,
        });
        (calls, source)
    }
}

#[async_trait]
impl DataSource for MockSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn is_active(&self, ctx: &ActivationContext) -> bool {
        if self.needs_red_flags {
            ctx.red_flags_pending
        } else {
            true
        }
    }

    async fn fetch(&self, _ctx: &FetchContext) -> Result<Payload, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Ok(payload) => Ok(payload.clone()),
            Behavior::Fail(detail) => Err(SourceError::Http(detail.to_string())),
        }
    }
}

struct CountingNotifier {
    count: Arc<AtomicUsize>,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify(&self, _subject: &str, _body: &str) -> Result<(), DeliveryError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn watchlist() -> WatchlistSnapshot {
    WatchlistSnapshot {
        watchlist: vec![
            WatchlistItem {
                symbol: "NVDA".to_string(),
                company: "NVIDIA".to_string(),
                earnings_date: NaiveDate::from_ymd_opt(2026, 11, 18),
            },
            WatchlistItem {
                symbol: "MOD".to_string(),
                company: "Modine".to_string(),
                earnings_date: None,
            },
        ],
    }
}

fn environment(report_dir: &Path) -> EnvironmentDescriptor {
    EnvironmentDescriptor {
        tag: "test".to_string(),
        report_dir: report_dir.to_path_buf(),
        watchlist_path: report_dir.join("watchlist.json"),
        capabilities: Capabilities {
            calendar_provider: false,
            notification: false,
            news_search: false,
            insider_feed: false,
            market_pulse: false,
            prediction_markets: false,
            analyst_consensus: false,
        },
    }
}

fn quotes_payload(change_pct: f64, date: NaiveDate) -> Payload {
    Payload::Quotes(vec![
        QuoteSnapshot {
            symbol: "NVDA".to_string(),
            company: "NVIDIA".to_string(),
            price: Some(180.0),
            change_pct: Some(change_pct),
            market_cap: Some(4_400_000_000_000),
            pe_trailing: Some(55.0),
            pe_forward: None,
            ev_ebitda: None,
            ps_ratio: None,
            last_trade_date: Some(date),
            error: None,
        },
        QuoteSnapshot {
            symbol: "MOD".to_string(),
            company: "Modine".to_string(),
            price: Some(101.0),
            change_pct: Some(0.3),
            market_cap: Some(5_300_000_000),
            pe_trailing: None,
            pe_forward: None,
            ev_ebitda: None,
            ps_ratio: None,
            last_trade_date: Some(date),
            error: None,
        },
    ])
}

fn empty_news() -> Payload {
    Payload::News(Default::default())
}

fn empty_filings() -> Payload {
    Payload::Filings(Default::default())
}

fn briefing(
    report_dir: &Path,
    sources: Vec<Arc<dyn DataSource>>,
    open: bool,
    notifier: Option<Arc<dyn Notifier>>,
) -> Briefing {
    let mut config = RuntimeConfig::from_env();
    config.report_dir = report_dir.to_path_buf();

    Briefing::new(
        config,
        environment(report_dir),
        sources,
        Arc::new(StaticCalendar {
            open,
            reason: (!open).then_some("weekend"),
        }),
        Box::new(ReportFileSink::new(report_dir)),
        notifier,
    )
}

// 2026-08-11 is a Tuesday with no earnings proximity: quiet baseline.
fn quiet_tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 11).unwrap()
}

#[tokio::test]
async fn test_closed_market_short_circuits_everything() {
    let dir = tempfile::tempdir().unwrap();
    let date = quiet_tuesday();

    let (quote_calls, quotes) = MockSource::ok(SourceId::Quotes, quotes_payload(0.5, date));
    let (news_calls, news) = MockSource::ok(SourceId::News, empty_news());
    let notify_count = Arc::new(AtomicUsize::new(0));

    let mut run = briefing(
        dir.path(),
        vec![quotes, news],
        false,
        Some(Arc::new(CountingNotifier {
            count: Arc::clone(&notify_count),
        })),
    );

    let outcome = run.run(date, watchlist()).await;

    // Zero data-source calls, zero notifications
    assert_eq!(quote_calls.load(Ordering::SeqCst), 0);
    assert_eq!(news_calls.load(Ordering::SeqCst), 0);
    assert_eq!(notify_count.load(Ordering::SeqCst), 0);
    assert!(!outcome.notified);

    // Exactly the markets-closed artifact
    assert!(!outcome.report.market_open);
    assert!(outcome.rendered.contains("Markets closed (weekend)"));
    assert!(outcome.report.results.is_empty());
    let path = outcome.artifact_path.expect("artifact written");
    assert!(path.exists());
}

#[tokio::test]
async fn test_single_failure_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let date = quiet_tuesday();

    let (_, quotes) = MockSource::ok(SourceId::Quotes, quotes_payload(0.5, date));
    let (_, filings) = MockSource::failing(SourceId::Filings, "edgar down");
    let (_, news) = MockSource::ok(SourceId::News, empty_news());

    let mut run = briefing(dir.path(), vec![quotes, filings, news], true, None);
    let outcome = run.run(date, watchlist()).await;

    let statuses: Vec<(SourceId, SourceStatus)> = outcome
        .report
        .results
        .iter()
        .map(|r| (r.source, r.status))
        .collect();

    // N independent sources, one engineered failure: exactly N-1 ok
    assert_eq!(
        statuses,
        vec![
            (SourceId::Quotes, SourceStatus::Ok),
            (SourceId::Filings, SourceStatus::Failed),
            (SourceId::News, SourceStatus::Ok),
        ]
    );
    let failed = outcome
        .report
        .results
        .iter()
        .find(|r| r.source == SourceId::Filings)
        .unwrap();
    assert!(failed.error.as_deref().unwrap().contains("edgar down"));
}

#[tokio::test]
async fn test_quotes_failure_forces_detailed_depth() {
    let dir = tempfile::tempdir().unwrap();
    let date = quiet_tuesday();

    let (_, quotes) = MockSource::failing(SourceId::Quotes, "quote endpoint 503");
    let (_, news) = MockSource::ok(SourceId::News, empty_news());

    let mut run = briefing(dir.path(), vec![quotes, news], true, None);
    let outcome = run.run(date, watchlist()).await;

    assert!(outcome.report.depth >= Depth::Detailed);
    assert_eq!(outcome.report.status, RunStatus::ManualReview);
    assert!(outcome
        .report
        .guardrail_triggers
        .iter()
        .any(|t| t.contains("unavailable")));
    // The run still produced a full artifact from qualitative sources
    assert!(outcome.artifact_path.is_some());
}

#[tokio::test]
async fn test_large_move_raises_flag_and_detailed_depth() {
    let dir = tempfile::tempdir().unwrap();
    let date = quiet_tuesday();

    let (_, quotes) = MockSource::ok(SourceId::Quotes, quotes_payload(9.0, date));

    let mut run = briefing(dir.path(), vec![quotes], true, None);
    let outcome = run.run(date, watchlist()).await;

    let flags = &outcome.report.red_flags;
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].category, RedFlagCategory::LargePriceMove);
    assert_eq!(flags[0].ticker, "NVDA");
    assert_eq!(outcome.report.depth, Depth::Detailed);
    assert_ne!(outcome.report.depth, Depth::Concise);
}

#[tokio::test]
async fn test_quiet_run_stays_concise_and_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let date = quiet_tuesday();

    let (_, quotes) = MockSource::ok(SourceId::Quotes, quotes_payload(0.5, date));
    let (_, news) = MockSource::ok(SourceId::News, empty_news());
    let (_, filings) = MockSource::ok(SourceId::Filings, empty_filings());
    let notify_count = Arc::new(AtomicUsize::new(0));

    let mut run = briefing(
        dir.path(),
        vec![quotes, news, filings],
        true,
        Some(Arc::new(CountingNotifier {
            count: Arc::clone(&notify_count),
        })),
    );
    let outcome = run.run(date, watchlist()).await;

    assert_eq!(outcome.report.status, RunStatus::AutoClear);
    assert_eq!(outcome.report.depth, Depth::Concise);
    assert!(outcome.report.red_flags.is_empty());
    assert!(outcome.notified);
    assert_eq!(notify_count.load(Ordering::SeqCst), 1);
    // Concise runs always carry the minimum action-item set
    assert_eq!(outcome.report.action_items.len(), 3);
}

#[tokio::test]
async fn test_red_flags_trigger_sequenced_follow_up() {
    let dir = tempfile::tempdir().unwrap();
    let date = quiet_tuesday();

    let (_, quotes) = MockSource::ok(SourceId::Quotes, quotes_payload(9.0, date));
    let (insider_calls, insider) =
        MockSource::follow_up(SourceId::Insider, Payload::Insider(Default::default()));

    let mut run = briefing(dir.path(), vec![quotes, insider], true, None);
    let outcome = run.run(date, watchlist()).await;

    // Follow-up ran exactly once, after the flag-raising first stage
    assert_eq!(insider_calls.load(Ordering::SeqCst), 1);
    let insider_result = outcome
        .report
        .results
        .iter()
        .find(|r| r.source == SourceId::Insider)
        .unwrap();
    assert_eq!(insider_result.status, SourceStatus::Ok);
}

#[tokio::test]
async fn test_no_flags_means_no_follow_up() {
    let dir = tempfile::tempdir().unwrap();
    let date = quiet_tuesday();

    let (_, quotes) = MockSource::ok(SourceId::Quotes, quotes_payload(0.5, date));
    let (insider_calls, insider) =
        MockSource::follow_up(SourceId::Insider, Payload::Insider(Default::default()));

    let mut run = briefing(dir.path(), vec![quotes, insider], true, None);
    let outcome = run.run(date, watchlist()).await;

    assert_eq!(insider_calls.load(Ordering::SeqCst), 0);
    let insider_result = outcome
        .report
        .results
        .iter()
        .find(|r| r.source == SourceId::Insider)
        .unwrap();
    assert_eq!(insider_result.status, SourceStatus::Skipped);
}

#[tokio::test]
async fn test_same_date_rerun_overwrites_deterministically() {
    let dir = tempfile::tempdir().unwrap();
    let date = quiet_tuesday();

    let first = {
        let (_, quotes) = MockSource::ok(SourceId::Quotes, quotes_payload(0.5, date));
        let mut run = briefing(dir.path(), vec![quotes], true, None);
        run.run(date, watchlist()).await
    };
    let second = {
        let (_, quotes) = MockSource::ok(SourceId::Quotes, quotes_payload(0.5, date));
        let mut run = briefing(dir.path(), vec![quotes], true, None);
        run.run(date, watchlist()).await
    };

    assert_eq!(first.artifact_path, second.artifact_path);
    assert_eq!(first.rendered, second.rendered);

    let artifacts: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().ends_with(".md"))
        .collect();
    assert_eq!(artifacts.len(), 1);
    assert_eq!(
        std::fs::read_to_string(artifacts[0].path()).unwrap(),
        second.rendered
    );
}

#[tokio::test]
async fn test_prior_manual_review_carries_into_next_run() {
    let dir = tempfile::tempdir().unwrap();

    // Monday-less week slice: Tuesday run flags a big move -> manual review
    let tuesday = quiet_tuesday();
    {
        let (_, quotes) = MockSource::ok(SourceId::Quotes, quotes_payload(9.0, tuesday));
        let mut run = briefing(dir.path(), vec![quotes], true, None);
        let outcome = run.run(tuesday, watchlist()).await;
        assert_eq!(outcome.report.status, RunStatus::ManualReview);
    }

    // Quiet Wednesday still starts detailed because of the carried status
    let wednesday = NaiveDate::from_ymd_opt(2026, 8, 12).unwrap();
    let (_, quotes) = MockSource::ok(SourceId::Quotes, quotes_payload(0.2, wednesday));
    let mut run = briefing(dir.path(), vec![quotes], true, None);
    let outcome = run.run(wednesday, watchlist()).await;

    assert_eq!(outcome.report.status, RunStatus::AutoClear);
    assert_eq!(outcome.report.depth, Depth::Detailed);
}

#[tokio::test]
async fn test_earnings_updates_surface_in_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let date = quiet_tuesday();

    let update = ProposedUpdate {
        symbol: "MOD".to_string(),
        old_date: None,
        new_date: NaiveDate::from_ymd_opt(2026, 9, 3).unwrap(),
    };
    let pulse = MarketPulse {
        short_interest: Default::default(),
        upcoming_earnings: Vec::new(),
        recent_results: Vec::new(),
        signals: Vec::new(),
        earnings_updates: vec![update.clone()],
    };

    let (_, quotes) = MockSource::ok(SourceId::Quotes, quotes_payload(0.5, date));
    let (_, pulse_source) = MockSource::ok(SourceId::MarketPulse, Payload::MarketPulse(pulse));

    let mut run = briefing(dir.path(), vec![quotes, pulse_source], true, None);
    let outcome = run.run(date, watchlist()).await;

    assert_eq!(outcome.earnings_updates(), &[update]);
}
