//! Delivery gateway for rendered reports
//!
//! Persistence and notification are independent, best-effort backends.
//! A sink failure degrades to stdout; a notifier failure is logged only.

pub mod file_sink;
pub mod notify;

pub use file_sink::ReportFileSink;
pub use notify::EmailDraftNotifier;

use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;

#[derive(Debug)]
pub enum DeliveryError {
    Io(std::io::Error),
    Http(String),
    NotConfigured(&'static str),
}

impl From<std::io::Error> for DeliveryError {
    fn from(err: std::io::Error) -> Self {
        DeliveryError::Io(err)
    }
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Io(e) => write!(f, "IO error: {}", e),
            DeliveryError::Http(e) => write!(f, "HTTP error: {}", e),
            DeliveryError::NotConfigured(var) => write!(f, "{} not configured", var),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Persistence backend. Idempotent per date: a second delivery for the
/// same date replaces the first artifact.
#[async_trait]
pub trait DeliverySink: Send {
    /// Returns the artifact path when the backend produces one.
    async fn deliver(
        &mut self,
        date: NaiveDate,
        content: &str,
    ) -> Result<Option<PathBuf>, DeliveryError>;

    fn sink_type(&self) -> &'static str;
}

/// Fire-and-forget notification backend.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), DeliveryError>;
}

/// Primary-output-stream sink: used for `--stdout-only` runs and as the
/// fallback target when persistence fails.
pub struct StdoutSink;

#[async_trait]
impl DeliverySink for StdoutSink {
    async fn deliver(
        &mut self,
        _date: NaiveDate,
        content: &str,
    ) -> Result<Option<PathBuf>, DeliveryError> {
        println!("{}", content);
        Ok(None)
    }

    fn sink_type(&self) -> &'static str {
        "stdout"
    }
}
