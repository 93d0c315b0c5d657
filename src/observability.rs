//! Prometheus metrics for pipeline stages, predictions and training jobs.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

use crate::constants::Stage;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// All metric names in one place so call sites never spell them by hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    StageRuns,
    StageDuration,
    Predictions,
    TrainingJobs,
    ModelCacheLoads,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::StageRuns => "wine_stage_runs_total",
            MetricName::StageDuration => "wine_stage_duration_seconds",
            MetricName::Predictions => "wine_predictions_total",
            MetricName::TrainingJobs => "wine_training_jobs_total",
            MetricName::ModelCacheLoads => "wine_model_cache_loads_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder. Idempotent; no HTTP listener is started,
/// the server renders the handle on `/metrics`.
pub fn init_metrics() {
    if HANDLE.get().is_some() {
        return;
    }
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_ok() {
                info!("Prometheus recorder installed");
            }
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    }
}

/// Current metrics in the Prometheus text format, empty if not initialised
pub fn render() -> String {
    HANDLE.get().map(PrometheusHandle::render).unwrap_or_default()
}

pub fn record_stage(stage: Stage, success: bool, elapsed: Duration) {
    let outcome = if success { "success" } else { "error" };
    metrics::counter!(MetricName::StageRuns.as_str(), "stage" => stage.dir_name(), "outcome" => outcome)
        .increment(1);
    metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage.dir_name())
        .record(elapsed.as_secs_f64());
}

pub fn record_prediction(outcome: &'static str) {
    metrics::counter!(MetricName::Predictions.as_str(), "outcome" => outcome).increment(1);
}

pub fn record_training_job(outcome: &'static str) {
    metrics::counter!(MetricName::TrainingJobs.as_str(), "outcome" => outcome).increment(1);
}

pub fn record_model_load() {
    metrics::counter!(MetricName::ModelCacheLoads.as_str()).increment(1);
}
