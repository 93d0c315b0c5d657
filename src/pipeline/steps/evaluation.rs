use super::PipelineStep;
use crate::artifacts::{MetricsHandle, ModelHandle, SplitHandle};
use crate::components::ModelEvaluation;
use crate::config::ConfigurationManager;
use crate::constants::Stage;
use crate::error::Result;
use crate::model::RegressionMetrics;

pub struct EvaluationInput {
    pub split: SplitHandle,
    pub model: ModelHandle,
}

#[derive(Debug, Clone)]
pub struct EvaluationOutput {
    pub metrics: RegressionMetrics,
    pub artifact: MetricsHandle,
}

/// Score the model on the test split and report the run
pub struct ModelEvaluationStep<'a> {
    manager: &'a ConfigurationManager,
}

impl<'a> ModelEvaluationStep<'a> {
    pub fn new(manager: &'a ConfigurationManager) -> Self {
        Self { manager }
    }
}

impl PipelineStep for ModelEvaluationStep<'_> {
    type Input = EvaluationInput;
    type Output = EvaluationOutput;

    fn stage(&self) -> Stage {
        Stage::Evaluation
    }

    fn execute(&self, input: &EvaluationInput) -> Result<EvaluationOutput> {
        let mut config = self.manager.get_model_evaluation_config()?;
        config.test_file = input.split.test.path.clone();
        config.model_file = input.model.path().to_path_buf();

        let (metrics, artifact) = ModelEvaluation::new(config)?.evaluate(self.manager.artifact_store())?;
        Ok(EvaluationOutput {
            metrics,
            artifact: MetricsHandle(artifact),
        })
    }
}
