//! Hold-out validation metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::base::Result;
use crate::error::ModelError;

/// Out-of-sample fit of predictions against observed values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub n: usize,
    /// Root mean squared error
    pub rmse: f64,
    /// Mean absolute error
    pub mae: f64,
    /// 1 - SSE / SST around the mean of `actual`
    pub r_squared: f64,
}

impl ValidationMetrics {
    /// Compare equally long `actual` and `predicted`
    pub fn compute(actual: &Array1<f64>, predicted: &Array1<f64>) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(ModelError::Data(pd_core::data::DataError::DimensionMismatch {
                expected: format!("{} predictions", actual.len()),
                actual: format!("{} predictions", predicted.len()),
            }));
        }
        let n = actual.len();
        let mean = actual.mean().ok_or(ModelError::InsufficientData {
            n_samples: 0,
            n_parameters: 1,
        })?;

        let errors = actual - predicted;
        let sse = errors.dot(&errors);
        let sst = actual.iter().map(|a| (a - mean).powi(2)).sum::<f64>();

        Ok(Self {
            n,
            rmse: (sse / n as f64).sqrt(),
            mae: errors.mapv(f64::abs).sum() / n as f64,
            r_squared: if sst > 0.0 { 1.0 - sse / sst } else { 0.0 },
        })
    }
}
