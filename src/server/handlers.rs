use askama::Template;
use axum::{
    extract::{Form, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, info, warn};

use super::state::AppState;
use super::templates::{FormField, IndexTemplate};
use crate::constants::FORM_FIELDS;
use crate::error::PipelineError;
use crate::jobs::{JobId, JobState};
use crate::observability;
use crate::pipeline::serving_score;

const MODEL_MISSING_MESSAGE: &str =
    "Model not found! Please train the model first using the 'Start Training' button above.";

/// Body returned by the training trigger
#[derive(Debug, Serialize)]
pub struct TrainResponse {
    pub status: &'static str,
    pub message: String,
    pub details: String,
}

impl TrainResponse {
    fn success() -> Self {
        Self {
            status: "success",
            message: "Model training completed successfully!".to_string(),
            details: "You can now make predictions.".to_string(),
        }
    }

    fn error(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            details: details.into(),
        }
    }
}

pub async fn index() -> Response {
    render(IndexTemplate {
        fields: FormField::all(None),
        prediction: None,
        error: None,
    })
}

/// Form submission from the index page. Every outcome renders the page; failures show
/// as a message on it rather than as an HTTP error.
pub async fn predict(State(state): State<AppState>, Form(form): Form<HashMap<String, String>>) -> Response {
    let (prediction, error) = match parse_features(&form) {
        Err(e) => {
            observability::record_prediction("invalid_input");
            (None, Some(format!("Invalid input: {}. Please enter valid numbers.", e)))
        }
        Ok(features) => {
            let cache = state.cache.clone();
            let outcome = tokio::task::spawn_blocking(move || -> crate::error::Result<f64> { cache.get()?.predict(&features) })
                .await
                .unwrap_or_else(|e| Err(PipelineError::Prediction(e.to_string())));
            match outcome {
                Ok(raw) => {
                    let score = serving_score(raw);
                    info!("Predicted quality {} (raw {:.4})", score, raw);
                    observability::record_prediction("success");
                    (Some(score), None)
                }
                Err(e) if e.is_model_missing() => {
                    warn!("Prediction requested before a model exists: {}", e);
                    observability::record_prediction("model_missing");
                    (None, Some(MODEL_MISSING_MESSAGE.to_string()))
                }
                Err(e) => {
                    error!("Prediction failed: {}", e);
                    observability::record_prediction("error");
                    (None, Some(format!("Prediction error: {}", e)))
                }
            }
        }
    };

    render(IndexTemplate {
        fields: FormField::all(Some(&form)),
        prediction,
        error,
    })
}

/// Read the eleven inputs in model order.
fn parse_features(form: &HashMap<String, String>) -> Result<Vec<f64>, String> {
    FORM_FIELDS
        .iter()
        .map(|&field| {
            let raw = form
                .get(field)
                .map(|v| v.trim())
                .ok_or_else(|| format!("{}: missing value", field))?;
            let value: f64 = raw
                .parse()
                .map_err(|e| format!("{}: could not convert '{}' to float ({})", field, raw, e))?;
            if !value.is_finite() {
                return Err(format!("{}: '{}' is not a finite number", field, raw));
            }
            Ok(value)
        })
        .collect()
}

/// Run a training job and answer when it finishes.
pub async fn train(State(state): State<AppState>) -> (StatusCode, Json<TrainResponse>) {
    let id = match state.jobs.submit() {
        Ok(id) => id,
        Err(PipelineError::JobInProgress(active)) => {
            warn!("Rejected training trigger: job {} still running", active);
            return (
                StatusCode::CONFLICT,
                Json(TrainResponse::error(
                    "Training already in progress",
                    format!("Training job {} is still running. Please wait for it to finish.", active),
                )),
            );
        }
        Err(e) => {
            error!("Could not start training: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TrainResponse::error("Training error", e.to_string())),
            );
        }
    };

    let status = match state.jobs.wait(id).await {
        Ok(status) => status,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TrainResponse::error("Training error", e.to_string())),
            )
        }
    };

    match status.state {
        JobState::Succeeded => (StatusCode::OK, Json(TrainResponse::success())),
        JobState::Failed { details } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(TrainResponse::error("Training failed", details)),
        ),
        JobState::TimedOut => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(TrainResponse::error(
                "Training timeout",
                format!(
                    "Training took longer than {} seconds and was stopped. Please try again.",
                    state.jobs.timeout().as_secs()
                ),
            )),
        ),
        JobState::Running => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(TrainResponse::error("Training error", "job finished without a final state")),
        ),
    }
}

pub async fn job_status(State(state): State<AppState>, Path(id): Path<JobId>) -> Response {
    match state.jobs.status(id) {
        Ok(status) => Json(status).into_response(),
        Err(e) => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": e.to_string() }))).into_response(),
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "wine_quality",
        "version": env!("CARGO_PKG_VERSION"),
        "model_loaded": state.cache.is_loaded(),
    }))
}

pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        observability::render(),
    )
}

fn render(template: IndexTemplate) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Template rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template rendering failed").into_response()
        }
    }
}
