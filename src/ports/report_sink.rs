//! Report Sink Port - Ranking & Reporting Interface
//!
//! Receives the finished daily report. What happens next (files,
//! archives, notifications) is the adapter's business.

use async_trait::async_trait;

use crate::usecases::ranking::DailyReport;

/// Trait for report consumers.
#[async_trait]
pub trait ReportSink: Send + Sync + 'static {
  /// Persist one daily report with its prediction records.
  async fn publish(&self, report: &DailyReport) -> anyhow::Result<()>;
}
