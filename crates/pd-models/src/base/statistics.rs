//! Fit statistics for fixed-effects models

use serde::{Deserialize, Serialize};

/// Goodness of fit and bookkeeping for one estimation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelStatistics {
    /// Observations used in the fit
    pub n_obs: usize,
    /// Estimated slopes
    pub n_coefficients: usize,
    /// Degrees of freedom absorbed by the fixed effects
    pub df_absorbed: usize,
    /// n - slopes - absorbed df
    pub df_residual: usize,
    /// Residual sum of squares
    pub rss: f64,
    /// R-squared of the demeaned regression
    pub r_squared_within: f64,
    /// R-squared including the absorbed effects
    pub r_squared: f64,
    /// Root mean squared residual
    pub rmse: f64,
    /// sqrt(RSS / df_residual)
    pub residual_std_error: f64,
    /// Demeaning sweeps performed
    pub iterations: usize,
    /// Whether demeaning reached its tolerance
    pub converged: bool,
    /// Number of clusters for cluster-robust errors
    pub n_clusters: Option<usize>,
    /// Rows removed as singletons before fitting
    pub dropped_singletons: usize,
}
