//! Report Writer - Atomic Daily Reports and Prediction Lines
//!
//! Persists each run as `reports/YYYY-MM-DD.json` (the full report) and
//! `predictions/YYYY-MM-DD.jsonl` (one ranked prediction per line).
//! Both files are written to a temp path and renamed into place, so a
//! reader sees either the previous run or the new one, never a partial
//! write. Re-running a date replaces that date's files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::{info, instrument};

use crate::ports::report_sink::ReportSink;
use crate::usecases::ranking::DailyReport;

pub struct ReportWriter {
    reports_dir: PathBuf,
    predictions_dir: PathBuf,
}

impl ReportWriter {
    /// Create a writer under `output_dir`, creating subdirectories.
    pub async fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref();
        let reports_dir = output_dir.join("reports");
        let predictions_dir = output_dir.join("predictions");

        fs::create_dir_all(&reports_dir)
            .await
            .context("Failed to create reports directory")?;
        fs::create_dir_all(&predictions_dir)
            .await
            .context("Failed to create predictions directory")?;

        Ok(Self {
            reports_dir,
            predictions_dir,
        })
    }

    pub fn report_path(&self, report: &DailyReport) -> PathBuf {
        self.reports_dir
            .join(format!("{}.json", report.target_date.format("%Y-%m-%d")))
    }

    pub fn predictions_path(&self, report: &DailyReport) -> PathBuf {
        self.predictions_dir
            .join(format!("{}.jsonl", report.target_date.format("%Y-%m-%d")))
    }
}

/// Write `bytes` to `path` via a sibling tmp file and rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to rename into {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl ReportSink for ReportWriter {
    #[instrument(skip(self, report), fields(date = %report.target_date, run_id = %report.run_id))]
    async fn publish(&self, report: &DailyReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        let report_path = self.report_path(report);
        write_atomic(&report_path, json.as_bytes()).await?;

        let mut lines = String::new();
        for record in &report.records {
            lines.push_str(
                &serde_json::to_string(record).context("Failed to serialize prediction")?,
            );
            lines.push('\n');
        }
        let predictions_path = self.predictions_path(report);
        write_atomic(&predictions_path, lines.as_bytes()).await?;

        info!(
            report = %report_path.display(),
            predictions = report.records.len(),
            "Daily report written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::DateWindow;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_publish_writes_both_files() {
        let dir = std::env::temp_dir().join(format!("weakspot-out-{}", uuid::Uuid::new_v4()));
        let writer = ReportWriter::new(&dir).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let report = DailyReport::assemble(
            date,
            DateWindow::lookback(date, 10).unwrap(),
            Vec::new(),
            &[],
            Vec::new(),
        );

        writer.publish(&report).await.unwrap();

        let json = fs::read_to_string(dir.join("reports/2025-07-01.json"))
            .await
            .unwrap();
        let back: DailyReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.run_id, report.run_id);
        assert!(dir.join("predictions/2025-07-01.jsonl").exists());
        assert!(!dir.join("reports/2025-07-01.json.tmp").exists());

        let _ = fs::remove_dir_all(&dir).await;
    }
}
