use super::PipelineStep;
use crate::artifacts::{ModelHandle, SplitHandle};
use crate::components::ModelTrainer;
use crate::config::ConfigurationManager;
use crate::constants::Stage;
use crate::error::Result;

/// Fit the regressor on the training split
pub struct ModelTrainerStep<'a> {
    manager: &'a ConfigurationManager,
}

impl<'a> ModelTrainerStep<'a> {
    pub fn new(manager: &'a ConfigurationManager) -> Self {
        Self { manager }
    }
}

impl PipelineStep for ModelTrainerStep<'_> {
    type Input = SplitHandle;
    type Output = ModelHandle;

    fn stage(&self) -> Stage {
        Stage::Training
    }

    fn execute(&self, input: &SplitHandle) -> Result<ModelHandle> {
        let mut config = self.manager.get_model_trainer_config()?;
        config.train_file = input.train.path.clone();

        let (_, artifact) = ModelTrainer::new(config).train(self.manager.artifact_store())?;
        Ok(ModelHandle(artifact))
    }
}
