//! Experiment tracking: report a run's parameters and metrics to an MLflow server.

use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::model::RegressionMetrics;

pub const TRACKING_TOKEN_ENV: &str = "MLFLOW_TRACKING_TOKEN";

/// Sink for one finished evaluation run.
pub trait ExperimentTracker: Send + Sync {
    /// Returns the tracker's run id.
    fn log_run(&self, params: &BTreeMap<String, String>, metrics: &RegressionMetrics) -> Result<String>;
}

/// MLflow REST client (`/api/2.0/mlflow/runs/*`).
pub struct MlflowTracker {
    base_url: String,
    experiment_id: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
struct CreateRunResponse {
    run: RunBody,
}

#[derive(Deserialize)]
struct RunBody {
    info: RunInfo,
}

#[derive(Deserialize)]
struct RunInfo {
    run_id: String,
}

impl MlflowTracker {
    pub fn new(base_url: &str, experiment_id: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            experiment_id: experiment_id.to_string(),
            token: std::env::var(TRACKING_TOKEN_ENV).ok().filter(|t| !t.is_empty()),
            client,
        })
    }

    /// Bearer token sent with every request, overriding `MLFLOW_TRACKING_TOKEN`
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn post(&self, endpoint: &str, body: serde_json::Value) -> Result<reqwest::blocking::Response> {
        let url = format!("{}/api/2.0/mlflow/{}", self.base_url, endpoint);
        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send()?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().unwrap_or_default();
            return Err(PipelineError::Tracking(format!("{} returned status {}: {}", url, status, text)));
        }
        Ok(response)
    }
}

impl ExperimentTracker for MlflowTracker {
    fn log_run(&self, params: &BTreeMap<String, String>, metrics: &RegressionMetrics) -> Result<String> {
        let now_ms = chrono::Utc::now().timestamp_millis();

        let created: CreateRunResponse = self
            .post(
                "runs/create",
                json!({ "experiment_id": self.experiment_id, "start_time": now_ms }),
            )?
            .json()?;
        let run_id = created.run.info.run_id;

        let params: Vec<_> = params
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect();
        let metrics: Vec<_> = metrics
            .as_pairs()
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value, "timestamp": now_ms, "step": 0 }))
            .collect();
        self.post(
            "runs/log-batch",
            json!({ "run_id": run_id, "params": params, "metrics": metrics }),
        )?;

        self.post(
            "runs/update",
            json!({
                "run_id": run_id,
                "status": "FINISHED",
                "end_time": chrono::Utc::now().timestamp_millis()
            }),
        )?;

        info!("Logged run {} to {}", run_id, self.base_url);
        Ok(run_id)
    }
}
