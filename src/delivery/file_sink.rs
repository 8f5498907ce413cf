//! Date-named report files in the configured reports directory

use super::{DeliveryError, DeliverySink};
use crate::report::report_filename;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

pub struct ReportFileSink {
    report_dir: PathBuf,
}

impl ReportFileSink {
    pub fn new(report_dir: impl AsRef<Path>) -> Self {
        Self {
            report_dir: report_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl DeliverySink for ReportFileSink {
    async fn deliver(
        &mut self,
        date: NaiveDate,
        content: &str,
    ) -> Result<Option<PathBuf>, DeliveryError> {
        std::fs::create_dir_all(&self.report_dir)?;

        let path = self.report_dir.join(report_filename(date));
        std::fs::write(&path, content)?;

        log::info!("📄 Wrote report: {}", path.display());
        Ok(Some(path))
    }

    fn sink_type(&self) -> &'static str {
        "file"
    }
}
