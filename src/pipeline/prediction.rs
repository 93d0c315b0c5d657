//! Inference over the persisted model.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use crate::components::load_model;
use crate::constants::{MAX_QUALITY_SCORE, MIN_QUALITY_SCORE};
use crate::error::{PipelineError, Result};
use crate::model::FittedModel;
use crate::observability;

/// A loaded model ready to score single feature vectors.
#[derive(Debug)]
pub struct PredictionPipeline {
    model: FittedModel,
    model_path: PathBuf,
}

impl PredictionPipeline {
    /// Load the model now; an absent file is `ModelNotFound`.
    pub fn new(model_path: impl AsRef<Path>) -> Result<Self> {
        let model_path = model_path.as_ref().to_path_buf();
        let model = load_model(&model_path)?;
        info!(
            "Loaded model from {} ({} features)",
            model_path.display(),
            model.n_features()
        );
        Ok(Self { model, model_path })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn feature_names(&self) -> &[String] {
        &self.model.feature_names
    }

    /// Score one row given in the model's feature order.
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        let raw = self
            .model
            .predict_row(features)
            .map_err(|e| PipelineError::Prediction(format!("Error making prediction: {}", e)))?;
        if !raw.is_finite() {
            return Err(PipelineError::Prediction(format!(
                "Error making prediction: model produced a non-finite value ({})",
                raw
            )));
        }
        debug!("Raw prediction {}", raw);
        Ok(raw)
    }
}

/// Round to the nearest integer (ties to even) and clamp to the quality scale.
pub fn serving_score(raw: f64) -> u8 {
    raw.round_ties_even()
        .clamp(f64::from(MIN_QUALITY_SCORE), f64::from(MAX_QUALITY_SCORE)) as u8
}

/// Process-wide handle on the serving model.
///
/// The model is loaded on first use and kept until `invalidate` is called after a
/// successful training run; the next `get` then reloads it from disk.
#[derive(Debug)]
pub struct ModelCache {
    model_path: PathBuf,
    loaded: RwLock<Option<Arc<PredictionPipeline>>>,
}

impl ModelCache {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            loaded: RwLock::new(None),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn get(&self) -> Result<Arc<PredictionPipeline>> {
        {
            let guard = self.loaded.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(pipeline) = guard.as_ref() {
                return Ok(Arc::clone(pipeline));
            }
        }

        let mut guard = self.loaded.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        // Another caller may have loaded it while we waited for the write lock
        if let Some(pipeline) = guard.as_ref() {
            return Ok(Arc::clone(pipeline));
        }
        let pipeline = Arc::new(PredictionPipeline::new(&self.model_path)?);
        observability::record_model_load();
        *guard = Some(Arc::clone(&pipeline));
        Ok(pipeline)
    }

    pub fn invalidate(&self) {
        let mut guard = self.loaded.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.take().is_some() {
            info!("Model cache invalidated; next prediction reloads {}", self.model_path.display());
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }
}
