use tracing::info;

use super::PipelineStep;
use crate::artifacts::DatasetHandle;
use crate::components::DataIngestion;
use crate::config::ConfigurationManager;
use crate::constants::Stage;
use crate::error::Result;

/// Download the source and write the cleaned dataset artifact
pub struct DataIngestionStep<'a> {
    manager: &'a ConfigurationManager,
}

impl<'a> DataIngestionStep<'a> {
    pub fn new(manager: &'a ConfigurationManager) -> Self {
        Self { manager }
    }
}

impl PipelineStep for DataIngestionStep<'_> {
    type Input = ();
    type Output = DatasetHandle;

    fn stage(&self) -> Stage {
        Stage::Ingestion
    }

    fn execute(&self, _input: &()) -> Result<DatasetHandle> {
        let config = self.manager.get_data_ingestion_config()?;
        let ingestion = DataIngestion::new(config);
        ingestion.download_file()?;
        ingestion.normalize()?;

        let artifact = self
            .manager
            .artifact_store()
            .register(Stage::Ingestion, ingestion.data_file())?;
        info!("Dataset artifact sha256:{}", artifact.sha256);
        Ok(DatasetHandle(artifact))
    }
}
