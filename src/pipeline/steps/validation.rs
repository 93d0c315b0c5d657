use tracing::{info, warn};

use super::PipelineStep;
use crate::artifacts::{DatasetHandle, StatusReportHandle};
use crate::components::{SchemaValidator, ValidationStatus};
use crate::config::ConfigurationManager;
use crate::constants::Stage;
use crate::dataset::Dataset;
use crate::error::Result;

/// Validation status plus the persisted report
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub status: ValidationStatus,
    pub report: StatusReportHandle,
    /// Whether the configuration asks the orchestrator to stop on a failed status
    pub halt_on_failure: bool,
}

/// Check the ingested dataset against the declared schema
pub struct DataValidationStep<'a> {
    manager: &'a ConfigurationManager,
}

impl<'a> DataValidationStep<'a> {
    pub fn new(manager: &'a ConfigurationManager) -> Self {
        Self { manager }
    }
}

impl PipelineStep for DataValidationStep<'_> {
    type Input = DatasetHandle;
    type Output = ValidationOutcome;

    fn stage(&self) -> Stage {
        Stage::Validation
    }

    fn execute(&self, input: &DatasetHandle) -> Result<ValidationOutcome> {
        let config = self.manager.get_data_validation_config()?;
        let halt_on_failure = config.halt_on_failure;
        let status_json = config.status_file.with_extension("json");
        let validator = SchemaValidator::new(config);

        let data = Dataset::from_csv(input.path())?;
        let status = validator.validate_dataset(&data)?;

        let store = self.manager.artifact_store();
        store.write_json(Stage::Validation, &status_json, &status)?;
        let report = StatusReportHandle(store.register(Stage::Validation, validator.status_file())?);

        if status.passed() {
            info!("All validations passed");
        } else {
            warn!(
                "Some validations failed (columns_ok={}, dtypes_ok={}); see {}",
                status.columns_ok,
                status.dtypes_ok,
                report.path().display()
            );
        }

        Ok(ValidationOutcome { status, report, halt_on_failure })
    }
}
