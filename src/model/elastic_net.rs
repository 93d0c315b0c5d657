//! Linear regression with combined L1/L2 regularization.
//!
//! Minimises
//! `1/(2n) * ||y - Xw - b||^2 + alpha * l1_ratio * ||w||_1 + 0.5 * alpha * (1 - l1_ratio) * ||w||^2`
//! by cyclic coordinate descent on centred data. The intercept is not penalised and is
//! recovered from the column means after convergence, so fitting is fully deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

/// Hyperparameters, read from the `[elastic_net]` table of `params.toml`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElasticNetParams {
    pub alpha: f64,
    pub l1_ratio: f64,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_tol")]
    pub tol: f64,
}

fn default_max_iter() -> usize {
    1000
}

fn default_tol() -> f64 {
    1e-4
}

impl Default for ElasticNetParams {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            l1_ratio: 0.1,
            max_iter: default_max_iter(),
            tol: default_tol(),
        }
    }
}

impl ElasticNetParams {
    /// Flattened `name -> value` view used when reporting a run to the tracker
    pub fn as_map(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("alpha".to_string(), self.alpha.to_string());
        params.insert("l1_ratio".to_string(), self.l1_ratio.to_string());
        params.insert("max_iter".to_string(), self.max_iter.to_string());
        params.insert("tol".to_string(), self.tol.to_string());
        params
    }

    fn validate(&self) -> Result<()> {
        if !(self.alpha >= 0.0) {
            return Err(PipelineError::Training(format!("alpha must be >= 0, got {}", self.alpha)));
        }
        if !(0.0..=1.0).contains(&self.l1_ratio) {
            return Err(PipelineError::Training(format!(
                "l1_ratio must be within [0, 1], got {}",
                self.l1_ratio
            )));
        }
        if self.max_iter == 0 {
            return Err(PipelineError::Training("max_iter must be positive".to_string()));
        }
        Ok(())
    }
}

/// Unfitted estimator.
#[derive(Debug, Clone)]
pub struct ElasticNet {
    params: ElasticNetParams,
}

impl ElasticNet {
    pub fn new(params: ElasticNetParams) -> Self {
        Self { params }
    }

    /// Fit on a row-major feature matrix.
    pub fn fit(&self, feature_names: &[String], x: &[Vec<f64>], y: &[f64]) -> Result<FittedModel> {
        self.params.validate()?;

        let n_samples = x.len();
        if n_samples == 0 {
            return Err(PipelineError::Training("cannot fit on an empty training set".to_string()));
        }
        if n_samples != y.len() {
            return Err(PipelineError::Training(format!(
                "feature rows ({}) and target values ({}) differ in length",
                n_samples,
                y.len()
            )));
        }
        let n_features = feature_names.len();
        if let Some((row, bad)) = x.iter().enumerate().find(|(_, r)| r.len() != n_features) {
            return Err(PipelineError::Training(format!(
                "row {} has {} features, expected {}",
                row,
                bad.len(),
                n_features
            )));
        }

        let n = n_samples as f64;
        let x_mean: Vec<f64> = (0..n_features)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n)
            .collect();
        let y_mean = y.iter().sum::<f64>() / n;

        // Column-major centred copy; coordinate descent walks one column at a time
        let columns: Vec<Vec<f64>> = (0..n_features)
            .map(|j| x.iter().map(|row| row[j] - x_mean[j]).collect())
            .collect();
        let col_sq: Vec<f64> = columns
            .iter()
            .map(|c| c.iter().map(|v| v * v).sum::<f64>() / n)
            .collect();

        let l1 = self.params.alpha * self.params.l1_ratio;
        let l2 = self.params.alpha * (1.0 - self.params.l1_ratio);

        let mut weights = vec![0.0; n_features];
        let mut residual: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
        let mut converged = false;
        let mut iterations = 0;

        for iter in 0..self.params.max_iter {
            iterations = iter + 1;
            let mut max_delta = 0.0_f64;
            let mut max_weight = 0.0_f64;

            for j in 0..n_features {
                let old = weights[j];
                let denom = col_sq[j] + l2;
                let new = if denom == 0.0 {
                    0.0
                } else {
                    let rho = columns[j]
                        .iter()
                        .zip(&residual)
                        .map(|(xij, r)| xij * (r + xij * old))
                        .sum::<f64>()
                        / n;
                    soft_threshold(rho, l1) / denom
                };

                let delta = new - old;
                if delta != 0.0 {
                    for (r, xij) in residual.iter_mut().zip(&columns[j]) {
                        *r -= xij * delta;
                    }
                    weights[j] = new;
                }
                max_delta = max_delta.max(delta.abs());
                max_weight = max_weight.max(new.abs());
            }

            if max_weight == 0.0 || max_delta / max_weight < self.params.tol {
                converged = true;
                break;
            }
        }

        if converged {
            debug!("Coordinate descent converged after {} iterations", iterations);
        } else {
            warn!(
                "Coordinate descent did not converge within {} iterations",
                self.params.max_iter
            );
        }

        let intercept = y_mean - weights.iter().zip(&x_mean).map(|(w, m)| w * m).sum::<f64>();
        info!(
            "Fitted ElasticNet on {} samples x {} features (alpha={}, l1_ratio={})",
            n_samples, n_features, self.params.alpha, self.params.l1_ratio
        );

        Ok(FittedModel {
            feature_names: feature_names.to_vec(),
            coefficients: weights,
            intercept,
            params: self.params,
        })
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Inference-only model persisted as the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub params: ElasticNetParams,
}

impl FittedModel {
    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    /// `y = w . x + b` for one feature row
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.coefficients.len() {
            return Err(PipelineError::Prediction(format!(
                "X has {} features, but the model is expecting {} features as input",
                row.len(),
                self.coefficients.len()
            )));
        }
        Ok(self.coefficients.iter().zip(row).map(|(w, v)| w * v).sum::<f64>() + self.intercept)
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    #[test]
    fn test_unregularized_fit_recovers_linear_relation() {
        // y = 2*x0 - 3*x1 + 5
        let x: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![i as f64, ((i * 7) % 11) as f64])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| 2.0 * r[0] - 3.0 * r[1] + 5.0).collect();

        let params = ElasticNetParams { alpha: 0.0, l1_ratio: 0.5, max_iter: 10_000, tol: 1e-10 };
        let model = ElasticNet::new(params).fit(&names(2), &x, &y).unwrap();

        assert!((model.coefficients[0] - 2.0).abs() < 1e-6);
        assert!((model.coefficients[1] + 3.0).abs() < 1e-6);
        assert!((model.intercept - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_strong_l1_penalty_zeroes_all_weights() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64 * 0.1]).collect();
        let y: Vec<f64> = x.iter().map(|r| r[0] + 1.0).collect();

        let params = ElasticNetParams { alpha: 100.0, l1_ratio: 1.0, ..Default::default() };
        let model = ElasticNet::new(params).fit(&names(1), &x, &y).unwrap();

        assert_eq!(model.coefficients, vec![0.0]);
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        assert!((model.intercept - mean).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_gets_zero_weight() {
        let x: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64, 3.0]).collect();
        let y: Vec<f64> = x.iter().map(|r| r[0]).collect();
        let model = ElasticNet::new(ElasticNetParams::default()).fit(&names(2), &x, &y).unwrap();
        assert_eq!(model.coefficients[1], 0.0);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let x: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64, (i * i % 13) as f64]).collect();
        let y: Vec<f64> = x.iter().map(|r| 0.5 * r[0] + 0.1 * r[1]).collect();
        let est = ElasticNet::new(ElasticNetParams::default());
        assert_eq!(est.fit(&names(2), &x, &y).unwrap(), est.fit(&names(2), &x, &y).unwrap());
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let est = ElasticNet::new(ElasticNetParams::default());
        assert!(est.fit(&names(1), &[], &[]).is_err());
        assert!(est.fit(&names(2), &[vec![1.0]], &[1.0]).is_err());

        let bad = ElasticNet::new(ElasticNetParams { l1_ratio: 1.5, ..Default::default() });
        assert!(matches!(
            bad.fit(&names(1), &[vec![1.0]], &[1.0]),
            Err(PipelineError::Training(_))
        ));
    }

    #[test]
    fn test_predict_row_checks_shape() {
        let model = FittedModel {
            feature_names: names(2),
            coefficients: vec![1.0, 2.0],
            intercept: 0.5,
            params: ElasticNetParams::default(),
        };
        assert_eq!(model.predict_row(&[1.0, 1.0]).unwrap(), 3.5);
        match model.predict_row(&[1.0]) {
            Err(PipelineError::Prediction(msg)) => assert!(msg.contains("expecting 2 features")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
