//! Typed configuration for every pipeline stage and the server.
//!
//! Three TOML files live in one config directory:
//! - `config.toml`: artifact locations, ingestion source, tracking and server settings
//! - `params.toml`: model hyperparameters and the train/test split
//! - `schema.toml`: expected column -> dtype mapping and the target column

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::artifacts::ArtifactStore;
use crate::constants::{
    Stage, CONFIG_DIR_ENV, CONFIG_FILE, DEFAULT_CONFIG_DIR, DEFAULT_PORT, DEFAULT_TRAINING_TIMEOUT_SECS,
    PARAMS_FILE, SCHEMA_FILE,
};
use crate::error::{PipelineError, Result};
use crate::model::ElasticNetParams;

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    artifacts_root: PathBuf,
    data_ingestion: RawIngestion,
    #[serde(default)]
    data_validation: RawValidation,
    #[serde(default)]
    data_transformation: RawTransformation,
    #[serde(default)]
    model_trainer: RawTrainer,
    #[serde(default)]
    model_evaluation: RawEvaluation,
    #[serde(default)]
    server: RawServer,
}

#[derive(Debug, Clone, Deserialize)]
struct RawIngestion {
    source_url: String,
    #[serde(default = "default_delimiter")]
    source_delimiter: String,
    #[serde(default = "default_local_data_file")]
    local_data_file: String,
    #[serde(default = "default_data_file")]
    data_file: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawValidation {
    status_file: String,
    halt_on_failure: bool,
}

impl Default for RawValidation {
    fn default() -> Self {
        Self {
            status_file: "status.txt".to_string(),
            halt_on_failure: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawTransformation {
    train_file: String,
    test_file: String,
}

impl Default for RawTransformation {
    fn default() -> Self {
        Self {
            train_file: "train.csv".to_string(),
            test_file: "test.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawTrainer {
    model_file: String,
}

impl Default for RawTrainer {
    fn default() -> Self {
        Self { model_file: "model.json".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawEvaluation {
    metric_file: String,
    mlflow_uri: Option<String>,
    experiment_id: String,
}

impl Default for RawEvaluation {
    fn default() -> Self {
        Self {
            metric_file: "metrics.json".to_string(),
            mlflow_uri: None,
            experiment_id: "0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawServer {
    host: String,
    port: u16,
    training_timeout_secs: u64,
    static_dir: PathBuf,
}

impl Default for RawServer {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            training_timeout_secs: DEFAULT_TRAINING_TIMEOUT_SECS,
            static_dir: PathBuf::from("static"),
        }
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_local_data_file() -> String {
    "source.csv".to_string()
}

fn default_data_file() -> String {
    "data.csv".to_string()
}

#[derive(Debug, Clone, Deserialize)]
struct RawParams {
    #[serde(default)]
    elastic_net: ElasticNetParams,
    #[serde(default)]
    split: SplitParams,
}

/// Train/test split settings from `params.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SplitParams {
    pub test_size: f64,
    pub random_state: u64,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self { test_size: 0.25, random_state: 42 }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawSchema {
    columns: BTreeMap<String, String>,
    target_column: TargetColumn,
}

#[derive(Debug, Clone, Deserialize)]
struct TargetColumn {
    name: String,
}

/// Declared column -> dtype tag mapping. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    columns: BTreeMap<String, String>,
    target: String,
}

impl Schema {
    pub fn new(columns: BTreeMap<String, String>, target: impl Into<String>) -> Self {
        Self { columns, target: target.into() }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn expected_dtype(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    pub fn columns(&self) -> &BTreeMap<String, String> {
        &self.columns
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

#[derive(Debug, Clone)]
pub struct DataIngestionConfig {
    pub root_dir: PathBuf,
    pub source_url: String,
    pub source_delimiter: u8,
    pub local_data_file: PathBuf,
    pub data_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DataValidationConfig {
    pub root_dir: PathBuf,
    pub data_file: PathBuf,
    pub status_file: PathBuf,
    pub schema: Schema,
    pub halt_on_failure: bool,
}

#[derive(Debug, Clone)]
pub struct DataTransformationConfig {
    pub root_dir: PathBuf,
    pub data_file: PathBuf,
    pub train_file: PathBuf,
    pub test_file: PathBuf,
    pub split: SplitParams,
}

#[derive(Debug, Clone)]
pub struct ModelTrainerConfig {
    pub root_dir: PathBuf,
    pub train_file: PathBuf,
    pub model_file: PathBuf,
    pub target_column: String,
    pub params: ElasticNetParams,
}

#[derive(Debug, Clone)]
pub struct ModelEvaluationConfig {
    pub root_dir: PathBuf,
    pub test_file: PathBuf,
    pub model_file: PathBuf,
    pub metric_file: PathBuf,
    pub target_column: String,
    pub all_params: BTreeMap<String, String>,
    pub mlflow_uri: Option<String>,
    pub experiment_id: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub training_timeout: Duration,
    pub static_dir: PathBuf,
    pub model_file: PathBuf,
}

/// Reads the three config files once and hands out typed per-stage configs.
#[derive(Debug, Clone)]
pub struct ConfigurationManager {
    config_dir: PathBuf,
    config: RawConfig,
    params: RawParams,
    schema: Schema,
    store: ArtifactStore,
}

impl ConfigurationManager {
    /// Load from `$WINE_QUALITY_CONFIG_DIR`, falling back to `./config`.
    pub fn load() -> Result<Self> {
        let dir = std::env::var(CONFIG_DIR_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_DIR.to_string());
        Self::from_dir(dir)
    }

    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let config_dir = dir.as_ref().to_path_buf();
        let config: RawConfig = read_toml(&config_dir.join(CONFIG_FILE))?;
        let params: RawParams = read_toml(&config_dir.join(PARAMS_FILE))?;
        let raw_schema: RawSchema = read_toml(&config_dir.join(SCHEMA_FILE))?;

        if !raw_schema.columns.contains_key(&raw_schema.target_column.name) {
            return Err(PipelineError::Config(format!(
                "target column '{}' is not declared in {}",
                raw_schema.target_column.name, SCHEMA_FILE
            )));
        }
        if !(params.split.test_size > 0.0 && params.split.test_size < 1.0) {
            return Err(PipelineError::Config(format!(
                "split.test_size must be within (0, 1), got {}",
                params.split.test_size
            )));
        }

        let store = ArtifactStore::new(&config.artifacts_root)?;
        info!("Loaded configuration from {}", config_dir.display());

        Ok(Self {
            config_dir,
            schema: Schema::new(raw_schema.columns, raw_schema.target_column.name),
            config,
            params,
            store,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn artifact_store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn schema(&self) -> Schema {
        self.schema.clone()
    }

    pub fn get_data_ingestion_config(&self) -> Result<DataIngestionConfig> {
        let cfg = &self.config.data_ingestion;
        let delimiter = match cfg.source_delimiter.as_bytes() {
            [b] => *b,
            _ => {
                return Err(PipelineError::Config(format!(
                    "data_ingestion.source_delimiter must be a single byte, got '{}'",
                    cfg.source_delimiter
                )))
            }
        };
        let root_dir = self.store.ensure_stage_dir(Stage::Ingestion)?;
        Ok(DataIngestionConfig {
            source_url: cfg.source_url.clone(),
            source_delimiter: delimiter,
            local_data_file: root_dir.join(&cfg.local_data_file),
            data_file: root_dir.join(&cfg.data_file),
            root_dir,
        })
    }

    pub fn get_data_validation_config(&self) -> Result<DataValidationConfig> {
        let cfg = &self.config.data_validation;
        let root_dir = self.store.ensure_stage_dir(Stage::Validation)?;
        Ok(DataValidationConfig {
            data_file: self.ingested_data_file(),
            status_file: root_dir.join(&cfg.status_file),
            schema: self.schema(),
            halt_on_failure: cfg.halt_on_failure,
            root_dir,
        })
    }

    pub fn get_data_transformation_config(&self) -> Result<DataTransformationConfig> {
        let cfg = &self.config.data_transformation;
        let root_dir = self.store.ensure_stage_dir(Stage::Transformation)?;
        Ok(DataTransformationConfig {
            data_file: self.ingested_data_file(),
            train_file: root_dir.join(&cfg.train_file),
            test_file: root_dir.join(&cfg.test_file),
            split: self.params.split,
            root_dir,
        })
    }

    pub fn get_model_trainer_config(&self) -> Result<ModelTrainerConfig> {
        let root_dir = self.store.ensure_stage_dir(Stage::Training)?;
        Ok(ModelTrainerConfig {
            train_file: self.transformation_dir().join(&self.config.data_transformation.train_file),
            model_file: root_dir.join(&self.config.model_trainer.model_file),
            target_column: self.schema.target().to_string(),
            params: self.params.elastic_net,
            root_dir,
        })
    }

    pub fn get_model_evaluation_config(&self) -> Result<ModelEvaluationConfig> {
        let cfg = &self.config.model_evaluation;
        let root_dir = self.store.ensure_stage_dir(Stage::Evaluation)?;
        Ok(ModelEvaluationConfig {
            test_file: self.transformation_dir().join(&self.config.data_transformation.test_file),
            model_file: self.model_file(),
            metric_file: root_dir.join(&cfg.metric_file),
            target_column: self.schema.target().to_string(),
            all_params: self.params.elastic_net.as_map(),
            mlflow_uri: cfg.mlflow_uri.clone().filter(|uri| !uri.trim().is_empty()),
            experiment_id: cfg.experiment_id.clone(),
            root_dir,
        })
    }

    pub fn get_server_config(&self) -> ServerConfig {
        let cfg = &self.config.server;
        ServerConfig {
            host: cfg.host.clone(),
            port: cfg.port,
            training_timeout: Duration::from_secs(cfg.training_timeout_secs),
            static_dir: cfg.static_dir.clone(),
            model_file: self.model_file(),
        }
    }

    /// Fixed location of the model artifact, read by evaluation and prediction
    pub fn model_file(&self) -> PathBuf {
        self.store
            .stage_dir(Stage::Training)
            .join(&self.config.model_trainer.model_file)
    }

    fn ingested_data_file(&self) -> PathBuf {
        self.store
            .stage_dir(Stage::Ingestion)
            .join(&self.config.data_ingestion.data_file)
    }

    fn transformation_dir(&self) -> PathBuf {
        self.store.stage_dir(Stage::Transformation)
    }
}

fn read_toml<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e)))?;
    Ok(toml::from_str(&content)?)
}
