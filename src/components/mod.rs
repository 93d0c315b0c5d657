// Domain components, one per pipeline stage

pub mod data_ingestion;
pub mod data_transformation;
pub mod data_validation;
pub mod model_evaluation;
pub mod model_trainer;

pub use data_ingestion::DataIngestion;
pub use data_transformation::DataTransformation;
pub use data_validation::{SchemaValidator, ValidationStatus};
pub use model_evaluation::{load_model, ModelEvaluation};
pub use model_trainer::ModelTrainer;
