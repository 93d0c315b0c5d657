use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

use wine_quality::config::ServerConfig;
use wine_quality::constants::FORM_FIELDS;
use wine_quality::jobs::{TrainingLauncher, TrainingOutput};
use wine_quality::model::{ElasticNetParams, FittedModel};
use wine_quality::server::{app_router, build_state};

/// Stands in for the training subprocess: optionally writes a model, then reports.
struct FakeLauncher {
    delay: Duration,
    model: Option<(PathBuf, f64)>,
    success: bool,
}

#[async_trait]
impl TrainingLauncher for FakeLauncher {
    async fn launch(&self) -> wine_quality::Result<TrainingOutput> {
        tokio::time::sleep(self.delay).await;
        if let Some((path, intercept)) = &self.model {
            write_model(path, *intercept);
        }
        Ok(TrainingOutput {
            success: self.success,
            details: if self.success { String::new() } else { "Data validation failed".to_string() },
        })
    }
}

fn write_model(path: &Path, intercept: f64) {
    let model = FittedModel {
        feature_names: FORM_FIELDS.iter().map(|f| f.to_string()).collect(),
        coefficients: vec![0.0; 10].into_iter().chain([1.0]).collect(),
        intercept,
        params: ElasticNetParams::default(),
    };
    fs::write(path, serde_json::to_vec(&model).unwrap()).unwrap();
}

fn app(dir: &TempDir, launcher: FakeLauncher, timeout: Duration) -> Router {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        training_timeout: timeout,
        static_dir: dir.path().join("static"),
        model_file: dir.path().join("model.json"),
    };
    app_router(build_state(&config, Arc::new(launcher)))
}

fn idle_launcher() -> FakeLauncher {
    FakeLauncher {
        delay: Duration::ZERO,
        model: None,
        success: true,
    }
}

/// Form body with every field set to `value`, `alcohol` last
fn form(alcohol: &str, overrides: &[(&str, &str)]) -> String {
    FORM_FIELDS
        .iter()
        .map(|&field| {
            let value = overrides
                .iter()
                .find(|(f, _)| *f == field)
                .map(|(_, v)| *v)
                .unwrap_or(if field == "alcohol" { alcohol } else { "1.0" });
            format!("{}={}", field, value)
        })
        .collect::<Vec<_>>()
        .join("&")
}

async fn post_predict(app: &Router, body: String) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn post(uri: &str) -> Request<Body> {
    Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_index_renders_all_fields() {
    let dir = tempdir().unwrap();
    let app = app(&dir, idle_launcher(), Duration::from_secs(5));

    let (status, body) = send(&app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    for field in FORM_FIELDS {
        assert!(body.contains(&format!("name=\"{}\"", field)), "missing {}", field);
    }

    let (status, _) = send(&app, get("/predict")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_predict_without_model_asks_to_train_first() {
    let dir = tempdir().unwrap();
    let app = app(&dir, idle_launcher(), Duration::from_secs(5));

    let (status, body) = post_predict(&app, form("9.4", &[])).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Model not found! Please train the model first"), "{}", body);
}

#[tokio::test]
async fn test_predict_rejects_non_numeric_input() {
    let dir = tempdir().unwrap();
    write_model(&dir.path().join("model.json"), 0.0);
    let app = app(&dir, idle_launcher(), Duration::from_secs(5));

    let (status, body) = post_predict(&app, form("9.4", &[("fixed_acidity", "abc")])).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Invalid input: fixed_acidity: could not convert"), "{}", body);
    assert!(body.contains("Please enter valid numbers."));
}

#[tokio::test]
async fn test_predict_rounds_and_clamps_score() {
    let dir = tempdir().unwrap();
    write_model(&dir.path().join("model.json"), 0.0);
    let app = app(&dir, idle_launcher(), Duration::from_secs(5));

    let (_, body) = post_predict(&app, form("5.6", &[])).await;
    assert!(body.contains("6 / 10"), "{}", body);

    let (_, body) = post_predict(&app, form("6.5", &[])).await;
    assert!(body.contains("6 / 10"), "{}", body);

    let (_, body) = post_predict(&app, form("11.3", &[])).await;
    assert!(body.contains("10 / 10"), "{}", body);

    let (_, body) = post_predict(&app, form("-0.4", &[])).await;
    assert!(body.contains("0 / 10"), "{}", body);
}

#[tokio::test]
async fn test_successful_training_reloads_cached_model() {
    let dir = tempdir().unwrap();
    let model_file = dir.path().join("model.json");
    write_model(&model_file, 0.0);
    let app = app(
        &dir,
        FakeLauncher {
            delay: Duration::from_millis(10),
            model: Some((model_file, 3.0)),
            success: true,
        },
        Duration::from_secs(5),
    );

    let (_, body) = post_predict(&app, form("4.0", &[])).await;
    assert!(body.contains("4 / 10"), "{}", body);

    let (status, body) = send(&app, post("/train")).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "success");

    let (_, body) = post_predict(&app, form("4.0", &[])).await;
    assert!(body.contains("7 / 10"), "{}", body);

    let (status, body) = send(&app, get("/train/jobs/1")).await;
    assert_eq!(status, StatusCode::OK);
    let job: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(job["state"], "succeeded");
}

#[tokio::test]
async fn test_failed_training_reports_details() {
    let dir = tempdir().unwrap();
    let app = app(
        &dir,
        FakeLauncher {
            delay: Duration::ZERO,
            model: None,
            success: false,
        },
        Duration::from_secs(5),
    );

    let (status, body) = send(&app, post("/train")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "Training failed");
    assert_eq!(json["details"], "Data validation failed");
}

#[tokio::test]
async fn test_training_timeout_has_distinct_message() {
    let dir = tempdir().unwrap();
    let app = app(
        &dir,
        FakeLauncher {
            delay: Duration::from_secs(30),
            model: None,
            success: true,
        },
        Duration::from_millis(50),
    );

    let started = std::time::Instant::now();
    let (status, body) = send(&app, post("/train")).await;
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["message"], "Training timeout");
}

#[tokio::test]
async fn test_concurrent_trigger_is_rejected() {
    let dir = tempdir().unwrap();
    let app = app(
        &dir,
        FakeLauncher {
            delay: Duration::from_millis(300),
            model: None,
            success: true,
        },
        Duration::from_secs(5),
    );

    let first = tokio::spawn({
        let app = app.clone();
        async move { send(&app, post("/train")).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (status, body) = send(&app, post("/train")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Training already in progress"));

    let (status, _) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_and_unknown_job() {
    let dir = tempdir().unwrap();
    let app = app(&dir, idle_launcher(), Duration::from_secs(5));

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"healthy\""));

    let (status, _) = send(&app, get("/train/jobs/99")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
}
