//! Run report assembly
//!
//! Deterministic projection from one run's merged state to the dated
//! markdown artifact: fixed front matter, depth-gated sections, and a
//! bounded action-item list. Rendering never consults the clock or any
//! state outside the `RunReport`.

use crate::cadence::{CadenceLayer, Depth, EarningsDue};
use crate::config::ProposedUpdate;
use crate::guardrails::RunStatus;
use crate::red_flags::{benign_headlines, RedFlag};
use crate::sources::{
    ConsensusEntry, DataSourceResult, Filing, Headline, InsiderActivity, MarketPulse, MarketQuote,
    Payload, QuoteSnapshot, SourceId,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const ACTION_ITEMS_MIN: usize = 3;
const ACTION_ITEMS_MAX: usize = 7;

/// Everything one orchestrator run produced. Assembled once, never mutated.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub date: NaiveDate,
    pub environment: String,
    pub tickers: Vec<String>,
    pub layers: Vec<CadenceLayer>,
    pub depth: Depth,
    pub status: RunStatus,
    pub market_open: bool,
    pub closed_reason: Option<String>,
    pub results: Vec<DataSourceResult>,
    pub red_flags: Vec<RedFlag>,
    pub guardrail_triggers: Vec<String>,
    pub earnings_due: Vec<EarningsDue>,
    pub action_items: Vec<String>,
    pub earnings_updates: Vec<ProposedUpdate>,
}

impl RunReport {
    /// Minimal artifact for a non-trading day. No sources ran.
    pub fn markets_closed(
        date: NaiveDate,
        environment: String,
        tickers: Vec<String>,
        reason: Option<String>,
    ) -> Self {
        Self {
            date,
            environment,
            tickers,
            layers: Vec::new(),
            depth: Depth::Concise,
            status: RunStatus::AutoClear,
            market_open: false,
            closed_reason: reason,
            results: Vec::new(),
            red_flags: Vec::new(),
            guardrail_triggers: Vec::new(),
            earnings_due: Vec::new(),
            action_items: Vec::new(),
            earnings_updates: Vec::new(),
        }
    }

    fn payload(&self, source: SourceId) -> Option<&Payload> {
        self.results
            .iter()
            .find(|r| r.source == source)
            .and_then(|r| r.payload.as_ref())
    }

    pub fn quotes(&self) -> Option<&[QuoteSnapshot]> {
        match self.payload(SourceId::Quotes)? {
            Payload::Quotes(snapshots) => Some(snapshots),
            _ => None,
        }
    }

    pub fn filings(&self) -> Option<&BTreeMap<String, Vec<Filing>>> {
        match self.payload(SourceId::Filings)? {
            Payload::Filings(by_ticker) => Some(by_ticker),
            _ => None,
        }
    }

    pub fn news(&self) -> Option<&BTreeMap<String, Vec<Headline>>> {
        match self.payload(SourceId::News)? {
            Payload::News(by_ticker) => Some(by_ticker),
            _ => None,
        }
    }

    pub fn insider(&self) -> Option<&BTreeMap<String, InsiderActivity>> {
        match self.payload(SourceId::Insider)? {
            Payload::Insider(by_ticker) => Some(by_ticker),
            _ => None,
        }
    }

    pub fn pulse(&self) -> Option<&MarketPulse> {
        match self.payload(SourceId::MarketPulse)? {
            Payload::MarketPulse(pulse) => Some(pulse),
            _ => None,
        }
    }

    pub fn prediction_markets(&self) -> Option<&[MarketQuote]> {
        match self.payload(SourceId::PredictionMarkets)? {
            Payload::PredictionMarkets(quotes) => Some(quotes),
            _ => None,
        }
    }

    pub fn consensus(&self) -> Option<&[ConsensusEntry]> {
        match self.payload(SourceId::AnalystConsensus)? {
            Payload::Consensus(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn macro_headlines(&self) -> Option<&[Headline]> {
        match self.payload(SourceId::MacroSearch)? {
            Payload::MacroSearch(headlines) => Some(headlines),
            _ => None,
        }
    }

    pub fn has_layer(&self, layer: CadenceLayer) -> bool {
        self.layers.contains(&layer)
    }

    pub fn layer_names(&self) -> String {
        if self.layers.is_empty() {
            return "none".to_string();
        }
        self.layers
            .iter()
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Dated artifact name; re-running the same date overwrites it.
pub fn report_filename(date: NaiveDate) -> String {
    format!("{}.md", date)
}

/// 3-7 bullets: one per red flag in priority order, padded with guardrail
/// and earnings watch items, then a cadence default.
pub fn synthesize_action_items(
    red_flags: &[RedFlag],
    guardrail_triggers: &[String],
    earnings_due: &[EarningsDue],
) -> Vec<String> {
    let mut items: Vec<String> = red_flags
        .iter()
        .map(|f| format!("Review {} on {}: {}", f.category.label(), f.ticker, f.evidence))
        .collect();

    for trigger in guardrail_triggers {
        if items.len() >= ACTION_ITEMS_MIN {
            break;
        }
        items.push(format!("Investigate guardrail: {}", trigger));
    }

    for due in earnings_due {
        if items.len() >= ACTION_ITEMS_MIN {
            break;
        }
        items.push(format!(
            "Prepare earnings review for {} ({})",
            due.symbol, due.earnings_date
        ));
    }

    while items.len() < ACTION_ITEMS_MIN {
        items.push("Proceed with normal cadence and schedule the next daily check-in.".to_string());
    }

    items.truncate(ACTION_ITEMS_MAX);
    items
}

// -- formatting helpers --

fn format_money(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("${:.2}", v),
        None => "-".to_string(),
    }
}

fn format_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:+.2}%", v),
        None => "-".to_string(),
    }
}

fn format_ratio(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v),
        None => "-".to_string(),
    }
}

fn format_market_cap(value: Option<i64>) -> String {
    let Some(v) = value else {
        return "-".to_string();
    };
    let abs = v.abs() as f64;
    if abs >= 1e12 {
        format!("${:.2}T", v as f64 / 1e12)
    } else if abs >= 1e9 {
        format!("${:.2}B", v as f64 / 1e9)
    } else if abs >= 1e6 {
        format!("${:.2}M", v as f64 / 1e6)
    } else {
        format!("${}", v)
    }
}

fn front_matter(report: &RunReport) -> String {
    format!(
        "---\ndate: {}\nenvironment: {}\ntickers: {}\nstatus: {}\nlayers: {}\ndepth: {}\n---\n",
        report.date,
        report.environment,
        report.tickers.join(", "),
        report.status.as_str(),
        report.layer_names(),
        report.depth.as_str(),
    )
}

/// Pull the `status:` line back out of a rendered artifact.
pub fn parse_front_matter_status(content: &str) -> Option<RunStatus> {
    for line in content.lines().take(10) {
        if let Some(value) = line.strip_prefix("status: ") {
            return match value.trim() {
                "auto_clear" => Some(RunStatus::AutoClear),
                "manual_review" => Some(RunStatus::ManualReview),
                _ => None,
            };
        }
    }
    None
}

/// Status of the most recent artifact dated before `before`, if any.
/// Unreadable or malformed artifacts are treated as absent.
pub fn prior_run_status(report_dir: &Path, before: NaiveDate) -> Option<RunStatus> {
    let entries = std::fs::read_dir(report_dir).ok()?;

    let mut latest: Option<NaiveDate> = None;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".md")) else {
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") else {
            continue;
        };
        if date < before && latest.map_or(true, |l| date > l) {
            latest = Some(date);
        }
    }

    let latest = latest?;
    let content = std::fs::read_to_string(report_dir.join(report_filename(latest))).ok()?;
    parse_front_matter_status(&content)
}

struct SectionGate {
    depth: Depth,
}

impl SectionGate {
    /// Concise renders only the core set; detailed renders layer-applicable
    /// sections; comprehensive renders everything.
    fn include(&self, layer_applicable: bool) -> bool {
        match self.depth {
            Depth::Concise => false,
            Depth::Detailed => layer_applicable,
            Depth::Comprehensive => true,
        }
    }
}

/// Render the full markdown artifact for a run.
pub fn render(report: &RunReport) -> String {
    let mut out = String::new();
    out.push_str(&front_matter(report));
    out.push('\n');
    out.push_str(&format!("# Daily Stock Check-In - {}\n\n", report.date));

    if !report.market_open {
        let reason = report.closed_reason.as_deref().unwrap_or("non-trading day");
        out.push_str(&format!("Markets closed ({}). No data collected.\n", reason));
        return out;
    }

    out.push_str(&format!(
        "Status: **{}**\n\n",
        match report.status {
            RunStatus::AutoClear => "AUTO CLEAR",
            RunStatus::ManualReview => "MANUAL REVIEW REQUIRED",
        }
    ));

    let gate = SectionGate {
        depth: report.depth,
    };

    if gate.include(true) {
        render_guardrails(&mut out, report);
    }
    if !report.red_flags.is_empty() {
        render_red_flags(&mut out, report);
    }
    render_snapshot(&mut out, report);
    render_headlines(&mut out, report);
    if gate.include(report.has_layer(CadenceLayer::Daily)) {
        render_filings(&mut out, report);
    }
    if gate.include(report.has_layer(CadenceLayer::Weekly) || report.insider().is_some()) {
        render_insider(&mut out, report);
    }
    if gate.include(report.has_layer(CadenceLayer::BiMonthly)) {
        render_short_interest(&mut out, report);
    }
    if gate.include(report.has_layer(CadenceLayer::Weekly)) {
        render_ecosystem(&mut out, report);
        render_consensus(&mut out, report);
    }
    if gate.include(report.has_layer(CadenceLayer::BiMonthly)) {
        render_prediction_markets(&mut out, report);
    }
    if gate.include(report.has_layer(CadenceLayer::Monthly)) {
        render_macro(&mut out, report);
    }
    render_tasks(&mut out, report);
    render_action_items(&mut out, report);
    if gate.include(true) {
        render_next_action(&mut out, report);
    }

    out
}

fn render_guardrails(out: &mut String, report: &RunReport) {
    out.push_str("## Guardrail Triggers\n");
    if report.guardrail_triggers.is_empty() {
        out.push_str("- No guardrails triggered.\n");
    } else {
        for trigger in &report.guardrail_triggers {
            out.push_str(&format!("- {}\n", trigger));
        }
    }
    out.push('\n');
}

fn render_red_flags(out: &mut String, report: &RunReport) {
    out.push_str("## Red Flags\n");
    for flag in &report.red_flags {
        out.push_str(&format!(
            "- **{}** [{}]: {}\n",
            flag.category.label(),
            flag.ticker,
            flag.evidence
        ));
    }
    out.push('\n');
}

fn render_snapshot(out: &mut String, report: &RunReport) {
    out.push_str("## Market Snapshot\n");
    let Some(snapshots) = report.quotes() else {
        out.push_str("- Quantitative snapshot unavailable for this run.\n\n");
        return;
    };

    out.push_str("| Ticker | Company | Price | 1D % | Market Cap | P/E TTM | P/E Fwd | EV/EBITDA | P/S | Last Trade | Data Status |\n");
    out.push_str("|---|---|---:|---:|---:|---:|---:|---:|---:|---|---|\n");
    for snap in snapshots {
        let data_status = match &snap.error {
            Some(e) => format!("error: {}", e),
            None => "ok".to_string(),
        };
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
            snap.symbol,
            snap.company,
            format_money(snap.price),
            format_pct(snap.change_pct),
            format_market_cap(snap.market_cap),
            format_ratio(snap.pe_trailing),
            format_ratio(snap.pe_forward),
            format_ratio(snap.ev_ebitda),
            format_ratio(snap.ps_ratio),
            snap.last_trade_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            data_status,
        ));
    }
    out.push('\n');
}

fn render_headlines(out: &mut String, report: &RunReport) {
    out.push_str("## Headlines\n");
    let Some(news) = report.news() else {
        out.push_str("- No headlines collected this run.\n\n");
        return;
    };

    if report.depth == Depth::Concise {
        // Top three across the watchlist, detector-benign first.
        let mut top: Vec<&Headline> = Vec::new();
        for headlines in news.values() {
            top.extend(benign_headlines(headlines));
        }
        for headline in top.iter().take(3) {
            out.push_str(&format!("- {}\n", headline.title));
        }
        if top.is_empty() {
            out.push_str("- No headlines collected this run.\n");
        }
        out.push('\n');
        return;
    }

    let flagged: BTreeSet<&str> = report
        .red_flags
        .iter()
        .map(|f| f.ticker.as_str())
        .collect();

    for (ticker, headlines) in news {
        // Red-flagged tickers get their full headline set.
        let limit = if report.depth == Depth::Comprehensive || flagged.contains(ticker.as_str()) {
            headlines.len()
        } else {
            3
        };
        out.push_str(&format!("### {}\n", ticker));
        if headlines.is_empty() {
            out.push_str("- (none)\n");
        }
        for headline in headlines.iter().take(limit) {
            match &headline.source {
                Some(source) => out.push_str(&format!("- {} ({})\n", headline.title, source)),
                None => out.push_str(&format!("- {}\n", headline.title)),
            }
        }
    }
    out.push('\n');
}

fn render_filings(out: &mut String, report: &RunReport) {
    out.push_str("## SEC Filings (last 7 days)\n");
    let Some(filings) = report.filings() else {
        out.push_str("- Not collected this run.\n\n");
        return;
    };

    let mut any = false;
    for (ticker, list) in filings {
        if list.is_empty() {
            continue;
        }
        any = true;
        out.push_str(&format!("### {}\n", ticker));
        for filing in list {
            let items = if filing.items.is_empty() {
                String::new()
            } else {
                format!(" [items: {}]", filing.items.join(", "))
            };
            out.push_str(&format!(
                "- {} filed {}: {}{}\n",
                filing.filing_type, filing.filed_date, filing.title, items
            ));
        }
    }
    if !any {
        out.push_str("- No filings in the window.\n");
    }
    out.push('\n');
}

fn render_insider(out: &mut String, report: &RunReport) {
    out.push_str("## Insider Activity\n");
    let Some(insider) = report.insider() else {
        out.push_str("- Not collected this run.\n\n");
        return;
    };

    for (ticker, activity) in insider {
        let alert = if activity.cluster_alert {
            " ⚠ cluster selling"
        } else {
            ""
        };
        out.push_str(&format!(
            "### {} - {} transaction(s){}\n",
            ticker, activity.transaction_count, alert
        ));
        for tx in &activity.transactions {
            out.push_str(&format!(
                "- {} {} ({}) {}: {} shares\n",
                tx.trade_date,
                tx.insider_name,
                tx.title,
                tx.trade_type,
                tx.shares
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ));
        }
    }
    out.push('\n');
}

fn render_short_interest(out: &mut String, report: &RunReport) {
    out.push_str("## Short Interest\n");
    let Some(pulse) = report.pulse() else {
        out.push_str("- Not collected this run.\n\n");
        return;
    };

    out.push_str("| Ticker | Short % Float | Days to Cover | MoM Change | Report Date |\n");
    out.push_str("|---|---:|---:|---:|---|\n");
    for (ticker, si) in &pulse.short_interest {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            ticker,
            si.short_pct_of_float
                .map(|v| format!("{:.2}%", v))
                .unwrap_or_else(|| "-".to_string()),
            format_ratio(si.short_ratio),
            format_pct(si.change_pct),
            si.report_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ));
    }
    out.push('\n');
}

fn render_ecosystem(out: &mut String, report: &RunReport) {
    out.push_str("## Ecosystem Signals\n");
    let Some(pulse) = report.pulse() else {
        out.push_str("- Not collected this run.\n\n");
        return;
    };

    if pulse.signals.is_empty() {
        out.push_str("- No notable ecosystem signals.\n");
    }
    for signal in &pulse.signals {
        out.push_str(&format!("- {}\n", signal));
    }

    if !pulse.upcoming_earnings.is_empty() {
        out.push_str("\n### Upcoming Earnings (next 30 days)\n");
        for entry in &pulse.upcoming_earnings {
            out.push_str(&format!(
                "- {} ({}): {} ({} day(s))\n",
                entry.ticker,
                entry.name,
                entry
                    .next_earnings
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                entry.days_until_earnings.unwrap_or(0),
            ));
        }
    }
    if !pulse.recent_results.is_empty() {
        out.push_str("\n### Recent Results (last 14 days)\n");
        for entry in &pulse.recent_results {
            out.push_str(&format!(
                "- {} ({}): reported {}\n",
                entry.ticker,
                entry.name,
                entry
                    .next_earnings
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ));
        }
    }
    out.push('\n');
}

fn render_consensus(out: &mut String, report: &RunReport) {
    out.push_str("## Analyst Consensus\n");
    let Some(entries) = report.consensus() else {
        out.push_str("- Not collected this run.\n\n");
        return;
    };

    out.push_str("| Ticker | Mean Target | Range | Rating | Revisions (30d) |\n");
    out.push_str("|---|---:|---|---|---|\n");
    for entry in entries {
        let revisions = match (entry.revisions_up_30d, entry.revisions_down_30d) {
            (Some(up), Some(down)) => format!("+{} / -{}", up, down),
            _ => "-".to_string(),
        };
        out.push_str(&format!(
            "| {} | {} | {} - {} | {} | {} |\n",
            entry.symbol,
            format_money(entry.mean_target),
            format_money(entry.low_target),
            format_money(entry.high_target),
            entry.rating.as_deref().unwrap_or("-"),
            revisions,
        ));
    }
    out.push('\n');
}

fn render_prediction_markets(out: &mut String, report: &RunReport) {
    out.push_str("## Prediction Markets\n");
    let Some(quotes) = report.prediction_markets() else {
        out.push_str("- Not collected this run.\n\n");
        return;
    };

    for quote in quotes {
        let delta = quote
            .move_24h
            .map(|m| format!(" ({:+.0}pp 24h)", m * 100.0))
            .unwrap_or_default();
        out.push_str(&format!(
            "- {} - {:.0}%{}\n",
            quote.question,
            quote.probability * 100.0,
            delta
        ));
    }
    out.push('\n');
}

fn render_macro(out: &mut String, report: &RunReport) {
    out.push_str("## Macro Environment\n");
    let Some(headlines) = report.macro_headlines() else {
        out.push_str("- Not collected this run.\n\n");
        return;
    };

    for headline in headlines {
        out.push_str(&format!("- {}\n", headline.title));
    }
    out.push('\n');
}

fn render_tasks(out: &mut String, report: &RunReport) {
    out.push_str("## Checklist Tasks Due Today\n");

    let show_all = report.depth == Depth::Comprehensive;
    let tiers: [(CadenceLayer, &str, &[&str]); 5] = [
        (
            CadenceLayer::Daily,
            "Daily",
            &[
                "Review red flags checklist for all watchlist names.",
                "Scan 8-K filings and material company announcements.",
                "Check sell-side estimate revisions and target changes.",
                "Check hyperscaler AI capex commentary deltas (MSFT, GOOG, META, AMZN).",
            ],
        ),
        (
            CadenceLayer::Weekly,
            "Weekly",
            &[
                "Review Form 4 insider buy/sell activity.",
                "Review sector flow and relative performance signals.",
                "Review valuation drift versus your baseline thesis assumptions.",
            ],
        ),
        (
            CadenceLayer::BiMonthly,
            "Bi-Monthly",
            &[
                "Check short-interest updates and changes in crowding risk.",
                "Review options implied volatility into the next earnings windows.",
            ],
        ),
        (
            CadenceLayer::Monthly,
            "Monthly",
            &[
                "Review macro layer: fed path, 10Y yield, and cost-of-capital pressure.",
                "Review policy/regulation changes: export controls, tariff updates.",
            ],
        ),
        (
            CadenceLayer::Earnings,
            "Earnings Window",
            &[
                "Run earnings workflow: pre-read release, call notes, guidance delta, and post-call thesis check.",
            ],
        ),
    ];

    for (layer, title, tasks) in tiers {
        if !show_all && !report.has_layer(layer) {
            continue;
        }
        out.push_str(&format!("### {}\n", title));
        for task in tasks {
            out.push_str(&format!("- [ ] {}\n", task));
        }
        out.push('\n');
    }
}

fn render_action_items(out: &mut String, report: &RunReport) {
    out.push_str("## Action Items\n");
    for item in &report.action_items {
        out.push_str(&format!("- {}\n", item));
    }
    out.push('\n');
}

fn render_next_action(out: &mut String, report: &RunReport) {
    out.push_str("## Next Action\n");
    match report.status {
        RunStatus::ManualReview => {
            out.push_str("- Run a qualitative review before making position changes.\n");
        }
        RunStatus::AutoClear => {
            out.push_str("- Proceed with normal cadence and schedule the next daily check-in.\n");
        }
    }
}
