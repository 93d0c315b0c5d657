//! Regression model and evaluation metrics.
//!
//! Training produces a [`FittedModel`]: a plain, serializable set of coefficients that
//! the evaluation stage and the prediction pipeline load read-only.

pub mod elastic_net;
pub mod metrics;

pub use elastic_net::{ElasticNet, ElasticNetParams, FittedModel};
pub use metrics::RegressionMetrics;
