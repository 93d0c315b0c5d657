//! Names and fixed values shared across the pipeline, the CLI and the server.
use std::fmt;

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE_NAME: &str = "running_logs.log";

pub const DEFAULT_CONFIG_DIR: &str = "config";
pub const CONFIG_DIR_ENV: &str = "WINE_QUALITY_CONFIG_DIR";
pub const CONFIG_FILE: &str = "config.toml";
pub const PARAMS_FILE: &str = "params.toml";
pub const SCHEMA_FILE: &str = "schema.toml";

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TRAINING_TIMEOUT_SECS: u64 = 600;

pub const MIN_QUALITY_SCORE: u8 = 0;
pub const MAX_QUALITY_SCORE: u8 = 10;

/// Form field names accepted by the predict endpoint, in model feature order.
pub const FORM_FIELDS: [&str; 11] = [
    "fixed_acidity",
    "volatile_acidity",
    "citric_acid",
    "residual_sugar",
    "chlorides",
    "free_sulfur_dioxide",
    "total_sulfur_dioxide",
    "density",
    "pH",
    "sulphates",
    "alcohol",
];

/// The five training stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingestion,
    Validation,
    Transformation,
    Training,
    Evaluation,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Ingestion,
        Stage::Validation,
        Stage::Transformation,
        Stage::Training,
        Stage::Evaluation,
    ];

    /// Directory under the artifacts root owned by this stage
    pub fn dir_name(&self) -> &'static str {
        match self {
            Stage::Ingestion => "data_ingestion",
            Stage::Validation => "data_validation",
            Stage::Transformation => "data_transformation",
            Stage::Training => "model_trainer",
            Stage::Evaluation => "model_evaluation",
        }
    }

    /// Human-readable name used in the start/end log lines
    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Ingestion => "Data Ingestion Stage",
            Stage::Validation => "Data Validation Stage",
            Stage::Transformation => "Data Transformation Stage",
            Stage::Training => "Model Training Stage",
            Stage::Evaluation => "Model Evaluation Stage",
        }
    }

    /// Parse the CLI spelling of a stage
    pub fn from_cli_name(name: &str) -> Option<Stage> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ingestion" | "data_ingestion" => Some(Stage::Ingestion),
            "validation" | "data_validation" => Some(Stage::Validation),
            "transformation" | "data_transformation" => Some(Stage::Transformation),
            "training" | "model_trainer" => Some(Stage::Training),
            "evaluation" | "model_evaluation" => Some(Stage::Evaluation),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_cli_names_round_trip_to_dirs() {
        for stage in Stage::ALL {
            assert_eq!(Stage::from_cli_name(stage.dir_name()), Some(stage));
        }
        assert_eq!(Stage::from_cli_name(" Training "), Some(Stage::Training));
        assert_eq!(Stage::from_cli_name("deploy"), None);
    }
}
