pub mod artifacts;
pub mod components;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod server;
pub mod tracking;

pub use config::ConfigurationManager;
pub use error::{PipelineError, Result};
pub use pipeline::{PredictionPipeline, TrainingPipeline};
