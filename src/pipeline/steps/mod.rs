use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::constants::Stage;
use crate::error::Result;
use crate::observability;

pub mod evaluation;
pub mod ingestion;
pub mod trainer;
pub mod transformation;
pub mod validation;

pub use evaluation::ModelEvaluationStep;
pub use ingestion::DataIngestionStep;
pub use trainer::ModelTrainerStep;
pub use transformation::DataTransformationStep;
pub use validation::{DataValidationStep, ValidationOutcome};

/// One fixed stage of the training pipeline.
///
/// A step builds its component from the configuration it was created with, invokes the
/// component's single domain operation and returns its typed artifact handle(s).
pub trait PipelineStep {
    type Input;
    type Output;

    fn stage(&self) -> Stage;

    fn execute(&self, input: &Self::Input) -> Result<Self::Output>;
}

/// Summary of one stage execution
#[derive(Debug, Clone)]
pub struct StepResult {
    pub stage: Stage,
    pub success: bool,
    pub elapsed: Duration,
    pub message: String,
}

/// Run a step between start/end log lines. Errors are logged with their source chain
/// and returned unchanged.
pub fn run_step<S: PipelineStep>(step: &S, input: &S::Input) -> (Result<S::Output>, StepResult) {
    let stage = step.stage();
    info!(">>>> stage {} started <<<<", stage);
    let started = Instant::now();

    let outcome = step.execute(input);
    let elapsed = started.elapsed();
    observability::record_stage(stage, outcome.is_ok(), elapsed);

    let summary = match &outcome {
        Ok(_) => {
            info!(">>>> stage {} completed <<<<", stage);
            StepResult {
                stage,
                success: true,
                elapsed,
                message: format!("{} completed", stage),
            }
        }
        Err(e) => {
            error!("stage {} failed: {}", stage, error_chain(e));
            StepResult {
                stage,
                success: false,
                elapsed,
                message: e.to_string(),
            }
        }
    };
    (outcome, summary)
}

fn error_chain(e: &dyn std::error::Error) -> String {
    let mut text = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
