use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::steps::evaluation::{EvaluationInput, EvaluationOutput};
use super::steps::{
    run_step, DataIngestionStep, DataTransformationStep, DataValidationStep, ModelEvaluationStep,
    ModelTrainerStep, StepResult, ValidationOutcome,
};
use crate::artifacts::{DatasetHandle, ModelHandle, SplitHandle};
use crate::config::ConfigurationManager;
use crate::constants::Stage;
use crate::error::{PipelineError, Result};
use crate::model::RegressionMetrics;

/// Outcome of a full training run
#[derive(Debug, Clone)]
pub struct PipelineExecutionResult {
    pub stages: Vec<StepResult>,
    pub metrics: RegressionMetrics,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Runs Ingestion → Validation → Transformation → Training → Evaluation.
///
/// Each stage consumes the typed handle produced by the one before it. The first failing
/// stage aborts the run and its error is returned.
pub struct TrainingPipeline {
    manager: ConfigurationManager,
}

impl TrainingPipeline {
    pub fn new(manager: ConfigurationManager) -> Self {
        Self { manager }
    }

    pub fn configuration(&self) -> &ConfigurationManager {
        &self.manager
    }

    pub fn run(&self) -> Result<PipelineExecutionResult> {
        let started_at = Utc::now();
        info!("🚀 Starting training pipeline");
        let mut stages = Vec::with_capacity(Stage::ALL.len());

        let (outcome, summary) = run_step(&DataIngestionStep::new(&self.manager), &());
        stages.push(summary);
        let dataset = outcome?;

        let (outcome, summary) = run_step(&DataValidationStep::new(&self.manager), &dataset);
        stages.push(summary);
        check_validation(&outcome?)?;

        let (outcome, summary) = run_step(&DataTransformationStep::new(&self.manager), &dataset);
        stages.push(summary);
        let split = outcome?;

        let (outcome, summary) = run_step(&ModelTrainerStep::new(&self.manager), &split);
        stages.push(summary);
        let model = outcome?;

        let (outcome, summary) = run_step(&ModelEvaluationStep::new(&self.manager), &EvaluationInput { split, model });
        stages.push(summary);
        let evaluated = outcome?;

        let completed_at = Utc::now();
        info!(
            "🎉 Training pipeline completed in {}ms: rmse={:.4} mae={:.4} r2={:.4}",
            (completed_at - started_at).num_milliseconds(),
            evaluated.metrics.rmse,
            evaluated.metrics.mae,
            evaluated.metrics.r2
        );

        Ok(PipelineExecutionResult {
            stages,
            metrics: evaluated.metrics,
            started_at,
            completed_at,
        })
    }

    /// Run a single stage, locating its inputs at the configured artifact paths
    pub fn run_stage(&self, stage: Stage) -> Result<StepResult> {
        let (outcome, summary) = match stage {
            Stage::Ingestion => {
                let (outcome, summary) = run_step(&DataIngestionStep::new(&self.manager), &());
                (outcome.map(drop), summary)
            }
            Stage::Validation => {
                let dataset = self.locate_dataset()?;
                let (outcome, summary) = run_step(&DataValidationStep::new(&self.manager), &dataset);
                (outcome.map(drop), summary)
            }
            Stage::Transformation => {
                let dataset = self.locate_dataset()?;
                let (outcome, summary) = run_step(&DataTransformationStep::new(&self.manager), &dataset);
                (outcome.map(drop), summary)
            }
            Stage::Training => {
                let split = self.locate_split()?;
                let (outcome, summary) = run_step(&ModelTrainerStep::new(&self.manager), &split);
                (outcome.map(drop), summary)
            }
            Stage::Evaluation => {
                let input = EvaluationInput {
                    split: self.locate_split()?,
                    model: self.locate_model()?,
                };
                let (outcome, summary) = run_step(&ModelEvaluationStep::new(&self.manager), &input);
                (outcome.map(drop), summary)
            }
        };
        outcome.map(|_| summary)
    }

    pub fn initiate_data_ingestion(&self) -> Result<DatasetHandle> {
        run_step(&DataIngestionStep::new(&self.manager), &()).0
    }

    pub fn initiate_data_validation(&self) -> Result<ValidationOutcome> {
        let dataset = self.locate_dataset()?;
        run_step(&DataValidationStep::new(&self.manager), &dataset).0
    }

    pub fn initiate_data_transformation(&self) -> Result<SplitHandle> {
        let dataset = self.locate_dataset()?;
        run_step(&DataTransformationStep::new(&self.manager), &dataset).0
    }

    pub fn initiate_model_training(&self) -> Result<ModelHandle> {
        let split = self.locate_split()?;
        run_step(&ModelTrainerStep::new(&self.manager), &split).0
    }

    pub fn initiate_model_evaluation(&self) -> Result<EvaluationOutput> {
        let input = EvaluationInput {
            split: self.locate_split()?,
            model: self.locate_model()?,
        };
        run_step(&ModelEvaluationStep::new(&self.manager), &input).0
    }

    fn locate_dataset(&self) -> Result<DatasetHandle> {
        let config = self.manager.get_data_validation_config()?;
        self.manager.artifact_store().locate_dataset(&config.data_file)
    }

    fn locate_split(&self) -> Result<SplitHandle> {
        let config = self.manager.get_data_transformation_config()?;
        self.manager
            .artifact_store()
            .locate_split(&config.train_file, &config.test_file)
    }

    fn locate_model(&self) -> Result<ModelHandle> {
        self.manager.artifact_store().locate_model(&self.manager.model_file())
    }
}

/// Stop the run on a failed validation unless the configuration lets it continue
fn check_validation(outcome: &ValidationOutcome) -> Result<()> {
    if outcome.status.passed() {
        return Ok(());
    }
    if outcome.halt_on_failure {
        error!("Stopping pipeline: data validation failed, see {}", outcome.report.path().display());
        return Err(PipelineError::ValidationFailed(format!(
            "columns_ok={}, dtypes_ok={}; report at {}",
            outcome.status.columns_ok,
            outcome.status.dtypes_ok,
            outcome.report.path().display()
        )));
    }
    warn!("Data validation failed; continuing because halt_on_failure is disabled");
    Ok(())
}
