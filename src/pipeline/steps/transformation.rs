use super::PipelineStep;
use crate::artifacts::{DatasetHandle, SplitHandle};
use crate::components::DataTransformation;
use crate::config::ConfigurationManager;
use crate::constants::Stage;
use crate::error::Result;

/// Clean the dataset and write the train/test split
pub struct DataTransformationStep<'a> {
    manager: &'a ConfigurationManager,
}

impl<'a> DataTransformationStep<'a> {
    pub fn new(manager: &'a ConfigurationManager) -> Self {
        Self { manager }
    }
}

impl PipelineStep for DataTransformationStep<'_> {
    type Input = DatasetHandle;
    type Output = SplitHandle;

    fn stage(&self) -> Stage {
        Stage::Transformation
    }

    fn execute(&self, input: &DatasetHandle) -> Result<SplitHandle> {
        let mut config = self.manager.get_data_transformation_config()?;
        config.data_file = input.path().to_path_buf();
        let (train_file, test_file) = (config.train_file.clone(), config.test_file.clone());

        DataTransformation::new(config).train_test_splitting()?;

        let store = self.manager.artifact_store();
        Ok(SplitHandle {
            train: store.register(Stage::Transformation, &train_file)?,
            test: store.register(Stage::Transformation, &test_file)?,
        })
    }
}
