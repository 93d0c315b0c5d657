use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Regression scores persisted as the metrics artifact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(PipelineError::Prediction(format!(
                "actual ({}) and predicted ({}) lengths differ",
                actual.len(),
                predicted.len()
            )));
        }
        if actual.is_empty() {
            return Err(PipelineError::EmptyDataset("no rows to evaluate".to_string()));
        }

        let n = actual.len() as f64;
        let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
        let abs_err: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum();
        let mean = actual.iter().sum::<f64>() / n;
        let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

        let r2 = if ss_tot == 0.0 {
            // Constant target: perfect predictions score 1, anything else 0
            if ss_res == 0.0 { 1.0 } else { 0.0 }
        } else {
            1.0 - ss_res / ss_tot
        };

        Ok(Self {
            rmse: (ss_res / n).sqrt(),
            mae: abs_err / n,
            r2,
        })
    }

    pub fn as_pairs(&self) -> [(&'static str, f64); 3] {
        [("rmse", self.rmse), ("mae", self.mae), ("r2", self.r2)]
    }
}
