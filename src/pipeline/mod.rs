// Training pipeline: fixed-order stages plus the prediction path that reads their output

pub mod orchestrator;
pub mod prediction;
pub mod steps;

pub use orchestrator::{PipelineExecutionResult, TrainingPipeline};
pub use prediction::{serving_score, ModelCache, PredictionPipeline};
pub use steps::{PipelineStep, StepResult};
