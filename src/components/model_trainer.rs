use tracing::info;

use crate::artifacts::{ArtifactRef, ArtifactStore};
use crate::config::ModelTrainerConfig;
use crate::constants::Stage;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::model::{ElasticNet, FittedModel};

/// Fits the regressor on the training split and persists it.
pub struct ModelTrainer {
    config: ModelTrainerConfig,
}

impl ModelTrainer {
    pub fn new(config: ModelTrainerConfig) -> Self {
        Self { config }
    }

    pub fn train(&self, store: &ArtifactStore) -> Result<(FittedModel, ArtifactRef)> {
        let train = Dataset::from_csv(&self.config.train_file)?;
        let features = train.feature_columns(&self.config.target_column);
        let (x, y) = train.features_and_target(&features, &self.config.target_column)?;

        let model = ElasticNet::new(self.config.params).fit(&features, &x, &y)?;
        let artifact = store.write_json(Stage::Training, &self.config.model_file, &model)?;
        info!("Model saved to {}", self.config.model_file.display());
        Ok((model, artifact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElasticNetParams;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_trains_on_features_in_dataset_order() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        let train_file = dir.path().join("train.csv");
        fs::write(&train_file, "b,quality,a\n1,3,0\n2,5,1\n3,7,0\n4,9,1\n").unwrap();

        let trainer = ModelTrainer::new(ModelTrainerConfig {
            root_dir: dir.path().to_path_buf(),
            train_file,
            model_file: dir.path().join("model.json"),
            target_column: "quality".to_string(),
            params: ElasticNetParams { alpha: 0.0, l1_ratio: 0.5, max_iter: 5000, tol: 1e-10 },
        });
        let (model, artifact) = trainer.train(&store).unwrap();

        assert_eq!(model.feature_names, vec!["b", "a"]);
        assert!((model.coefficients[0] - 2.0).abs() < 1e-6);
        assert!(model.coefficients[1].abs() < 1e-6);

        let saved: FittedModel = serde_json::from_slice(&fs::read(&artifact.path).unwrap()).unwrap();
        assert_eq!(saved, model);
    }
}
