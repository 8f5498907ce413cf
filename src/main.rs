//! stockbrief - cadence-aware daily watchlist briefing
//!
//! One run per date: decide which cadence layers are active, fan out to the
//! activated data sources with per-source failure isolation, scan the
//! merged results for red flags, assemble a depth-gated markdown report,
//! and deliver it (file plus optional email draft). See the binaries in
//! `src/bin/` for the entry points.

pub mod cadence;
pub mod calendar;
pub mod config;
pub mod delivery;
pub mod environment;
pub mod guardrails;
pub mod orchestrator;
pub mod red_flags;
pub mod report;
pub mod sources;

pub use cadence::{CadenceLayer, Depth};
pub use config::{RuntimeConfig, WatchlistSnapshot};
pub use environment::EnvironmentDescriptor;
pub use guardrails::RunStatus;
pub use orchestrator::{Briefing, RunOutcome};
pub use report::RunReport;
