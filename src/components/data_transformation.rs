use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::config::DataTransformationConfig;
use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};

/// Cleans the ingested dataset and writes a seeded train/test split.
pub struct DataTransformation {
    config: DataTransformationConfig,
}

impl DataTransformation {
    pub fn new(config: DataTransformationConfig) -> Self {
        Self { config }
    }

    pub fn train_test_splitting(&self) -> Result<(Dataset, Dataset)> {
        let mut data = Dataset::from_csv(&self.config.data_file)?;
        let dropped = data.drop_incomplete_rows();
        if dropped > 0 {
            warn!("Dropped {} incomplete rows before splitting", dropped);
        }

        let (train, test) = split(&data, self.config.split.test_size, self.config.split.random_state)?;
        train.write_csv(&self.config.train_file)?;
        test.write_csv(&self.config.test_file)?;

        info!("Split data into training and test sets");
        info!("train shape: {:?}", train.shape());
        info!("test shape: {:?}", test.shape());
        Ok((train, test))
    }
}

/// Shuffle row indices with a seeded RNG; the test set takes `ceil(n * test_size)` rows.
pub fn split(data: &Dataset, test_size: f64, seed: u64) -> Result<(Dataset, Dataset)> {
    let n = data.n_rows();
    if n < 2 {
        return Err(PipelineError::EmptyDataset(format!(
            "need at least 2 complete rows to split, found {}",
            n
        )));
    }

    let n_test = ((n as f64) * test_size).ceil() as usize;
    let n_test = n_test.clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok((data.select_rows(train_idx), data.select_rows(test_idx)))
}
