//! Prometheus Metrics Registry - Run Observability
//!
//! Registers run metrics on a private registry and renders them in the
//! text exposition format to a file after each run, for a node-exporter
//! textfile collector to pick up. Batch job, so no HTTP listener.

use std::path::Path;

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use tracing::{info, instrument};

use crate::adapters::persistence::report_writer::write_atomic;
use crate::usecases::ranking::{DailyReport, SkipKind};

/// Centralized Prometheus metrics for a daily run.
///
/// All metrics follow the naming convention `weakspot_*`.
pub struct RunMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// Pitcher vulnerability profiles built.
    pub profiles_built: IntCounter,
    /// Skipped entities by kind.
    pub skipped: IntCounterVec,
    /// Prediction records emitted.
    pub predictions: IntCounter,
    /// Predictions by pathway.
    pub pathways: IntCounterVec,
    /// Predictions by market assessment.
    pub market_assessments: IntCounterVec,
    /// Combined score distribution.
    pub combined_score: Histogram,
    /// Records quarantined by the input adapters.
    pub quarantined: IntCounter,
    /// Wall-clock run duration in seconds.
    pub run_duration_seconds: Gauge,
}

impl RunMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let profiles_built = IntCounter::new(
            "weakspot_profiles_built_total",
            "Pitcher vulnerability profiles built",
        )?;

        let skipped = IntCounterVec::new(
            Opts::new("weakspot_skipped_total", "Entities skipped during the run"),
            &["kind"],
        )?;

        let predictions = IntCounter::new(
            "weakspot_predictions_total",
            "Prediction records emitted",
        )?;

        let pathways = IntCounterVec::new(
            Opts::new("weakspot_pathway_total", "Predictions by pathway"),
            &["pathway"],
        )?;

        let market_assessments = IntCounterVec::new(
            Opts::new(
                "weakspot_market_assessment_total",
                "Predictions by market assessment",
            ),
            &["assessment"],
        )?;

        let combined_score = Histogram::with_opts(
            HistogramOpts::new("weakspot_combined_score", "Combined ensemble score (0-100)")
                .buckets(vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]),
        )?;

        let quarantined = IntCounter::new(
            "weakspot_quarantined_records_total",
            "Input records rejected at the adapter boundary",
        )?;

        let run_duration_seconds = Gauge::new(
            "weakspot_run_duration_seconds",
            "Wall-clock duration of the last run",
        )?;

        // Register all metrics
        registry.register(Box::new(profiles_built.clone()))?;
        registry.register(Box::new(skipped.clone()))?;
        registry.register(Box::new(predictions.clone()))?;
        registry.register(Box::new(pathways.clone()))?;
        registry.register(Box::new(market_assessments.clone()))?;
        registry.register(Box::new(combined_score.clone()))?;
        registry.register(Box::new(quarantined.clone()))?;
        registry.register(Box::new(run_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            profiles_built,
            skipped,
            predictions,
            pathways,
            market_assessments,
            combined_score,
            quarantined,
            run_duration_seconds,
        })
    }

    /// Record everything a finished report says about the run.
    pub fn observe_report(&self, report: &DailyReport) {
        self.profiles_built
            .inc_by(report.pitcher_rankings.len() as u64);
        for skip in &report.skipped {
            let kind = match skip.kind {
                SkipKind::Pitcher => "pitcher",
                SkipKind::Pairing => "pairing",
            };
            self.skipped.with_label_values(&[kind]).inc();
        }
        for record in report.predictions() {
            self.predictions.inc();
            let pathway = record.pathway.to_string();
            let assessment = record.market.assessment.to_string();
            self.pathways.with_label_values(&[pathway.as_str()]).inc();
            self.market_assessments
                .with_label_values(&[assessment.as_str()])
                .inc();
            self.combined_score.observe(record.combined_score);
        }
    }

    /// Encode all metrics in Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Write the rendered metrics to `path` atomically.
    #[instrument(skip(self))]
    pub async fn write_textfile(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = self.render()?;
        write_atomic(path, text.as_bytes()).await?;
        info!(path = %path.display(), "Metrics textfile written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::DateWindow;
    use crate::usecases::ranking::SkippedEntity;
    use chrono::NaiveDate;

    #[test]
    fn test_render_after_observe() {
        let metrics = RunMetrics::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let report = DailyReport::assemble(
            date,
            DateWindow::lookback(date, 5).unwrap(),
            Vec::new(),
            &[],
            vec![SkippedEntity {
                kind: SkipKind::Pitcher,
                pitcher_id: 3,
                batter_id: None,
                name: None,
                reason: "insufficient data".into(),
            }],
        );
        metrics.observe_report(&report);
        metrics.quarantined.inc_by(4);
        metrics.run_duration_seconds.set(1.5);

        let text = metrics.render().unwrap();
        assert!(text.contains("weakspot_skipped_total{kind=\"pitcher\"} 1"));
        assert!(text.contains("weakspot_quarantined_records_total 4"));
        assert!(text.contains("weakspot_run_duration_seconds 1.5"));
    }
}
