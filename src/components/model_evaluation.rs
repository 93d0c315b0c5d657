use std::fs;
use tracing::{info, warn};

use crate::artifacts::{ArtifactRef, ArtifactStore};
use crate::config::ModelEvaluationConfig;
use crate::constants::Stage;
use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::model::{FittedModel, RegressionMetrics};
use crate::tracking::{ExperimentTracker, MlflowTracker};

/// Scores the trained model on the held-out split.
pub struct ModelEvaluation {
    config: ModelEvaluationConfig,
    tracker: Option<Box<dyn ExperimentTracker>>,
}

impl ModelEvaluation {
    /// Uses an MLflow tracker when `mlflow_uri` is configured.
    pub fn new(config: ModelEvaluationConfig) -> Result<Self> {
        let tracker: Option<Box<dyn ExperimentTracker>> = match &config.mlflow_uri {
            Some(uri) => Some(Box::new(MlflowTracker::new(uri, &config.experiment_id)?)),
            None => None,
        };
        Ok(Self { config, tracker })
    }

    pub fn with_tracker(config: ModelEvaluationConfig, tracker: Box<dyn ExperimentTracker>) -> Self {
        Self { config, tracker: Some(tracker) }
    }

    pub fn eval_metrics(actual: &[f64], predicted: &[f64]) -> Result<RegressionMetrics> {
        RegressionMetrics::compute(actual, predicted)
    }

    /// Predict on the test split, save `metrics.json`, then report to the tracker.
    pub fn evaluate(&self, store: &ArtifactStore) -> Result<(RegressionMetrics, ArtifactRef)> {
        let test = Dataset::from_csv(&self.config.test_file)?;
        let model = load_model(&self.config.model_file)?;

        let (x, y) = test.features_and_target(&model.feature_names, &self.config.target_column)?;
        let predicted = model.predict(&x)?;
        let scores = Self::eval_metrics(&y, &predicted)?;

        let artifact = store.write_json(Stage::Evaluation, &self.config.metric_file, &scores)?;
        info!(
            "Metrics: rmse={:.4} mae={:.4} r2={:.4}; saved to {}",
            scores.rmse,
            scores.mae,
            scores.r2,
            self.config.metric_file.display()
        );

        if let Some(tracker) = &self.tracker {
            // Tracking is best-effort; local metrics are already persisted
            match tracker.log_run(&self.config.all_params, &scores) {
                Ok(run_id) => info!("Evaluation run tracked as {}", run_id),
                Err(e) => warn!("Failed to log run to experiment tracker: {}", e),
            }
        }

        Ok((scores, artifact))
    }
}

/// Read a persisted model; an absent file is `ModelNotFound`.
pub fn load_model(path: &std::path::Path) -> Result<FittedModel> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::ModelNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElasticNetParams;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    struct RecordingTracker {
        runs: Arc<Mutex<Vec<(BTreeMap<String, String>, RegressionMetrics)>>>,
        fail: bool,
    }

    impl ExperimentTracker for RecordingTracker {
        fn log_run(&self, params: &BTreeMap<String, String>, metrics: &RegressionMetrics) -> Result<String> {
            if self.fail {
                return Err(PipelineError::Tracking("unreachable".to_string()));
            }
            self.runs.lock().unwrap().push((params.clone(), *metrics));
            Ok("run-1".to_string())
        }
    }

    fn setup(dir: &Path) -> ModelEvaluationConfig {
        fs::write(dir.join("test.csv"), "x,quality\n1,3\n2,5\n3,7\n").unwrap();
        let model = FittedModel {
            feature_names: vec!["x".to_string()],
            coefficients: vec![2.0],
            intercept: 1.0,
            params: ElasticNetParams::default(),
        };
        fs::write(dir.join("model.json"), serde_json::to_vec(&model).unwrap()).unwrap();

        ModelEvaluationConfig {
            root_dir: dir.to_path_buf(),
            test_file: dir.join("test.csv"),
            model_file: dir.join("model.json"),
            metric_file: dir.join("metrics.json"),
            target_column: "quality".to_string(),
            all_params: ElasticNetParams::default().as_map(),
            mlflow_uri: None,
            experiment_id: "0".to_string(),
        }
    }

    #[test]
    fn test_evaluate_writes_metrics_and_tracks_run() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let runs = Arc::new(Mutex::new(Vec::new()));
        let evaluation = ModelEvaluation::with_tracker(
            setup(dir.path()),
            Box::new(RecordingTracker { runs: runs.clone(), fail: false }),
        );

        let (scores, artifact) = evaluation.evaluate(&store).unwrap();
        assert_eq!(scores, RegressionMetrics { rmse: 0.0, mae: 0.0, r2: 1.0 });

        let saved: RegressionMetrics = serde_json::from_slice(&fs::read(&artifact.path).unwrap()).unwrap();
        assert_eq!(saved, scores);

        let runs = runs.lock().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].0.get("alpha").map(String::as_str), Some("0.2"));
    }

    #[test]
    fn test_tracker_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let evaluation = ModelEvaluation::with_tracker(
            setup(dir.path()),
            Box::new(RecordingTracker { runs: Arc::new(Mutex::new(Vec::new())), fail: true }),
        );
        assert!(evaluation.evaluate(&store).is_ok());
        assert!(dir.path().join("metrics.json").exists());
    }

    #[test]
    fn test_missing_model_is_distinguished() {
        let dir = tempdir().unwrap();
        let err = load_model(&dir.path().join("model.json")).unwrap_err();
        assert!(err.is_model_missing());
    }
}
