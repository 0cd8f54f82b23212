//! Linear estimation with absorbed fixed effects
//!
//! Slopes are estimated on demeaned data with an SVD least-squares solve
//! that refuses rank-deficient designs and names the collinear columns.
//! Standard errors come from one of the [`VcovType`] estimators.
//!
//! ```ignore
//! let model = FixedEffectsRegression::new("log1p(units_a) ~ log(price_a) + promo_a | store + week")?
//!     .data(&df)
//!     .vcov(VcovType::Cluster("store".into()))
//!     .with_group_effects()
//!     .fit()?;
//! ```

pub mod estimator;
pub mod solve;
pub mod vcov;

#[cfg(test)]
mod tests;

pub use estimator::FixedEffectsRegression;

use pd_core::data::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::base::Result;
use crate::error::ModelError;
use crate::fe::DemeanConfig;
use crate::model::DemandModel;

/// Variance-covariance estimator for the slopes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VcovType {
    /// Homoskedastic errors
    #[default]
    Iid,
    /// White heteroskedasticity-robust errors with the HC1 correction
    Hetero,
    /// Liang-Zeger cluster-robust errors (CR1) on one grouping column
    Cluster(String),
}

impl fmt::Display for VcovType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VcovType::Iid => write!(f, "IID"),
            VcovType::Hetero => write!(f, "Heteroskedasticity-robust (HC1)"),
            VcovType::Cluster(var) => write!(f, "Clustered by {} (CR1)", var),
        }
    }
}

/// Estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Standard error type
    pub vcov: VcovType,
    /// Confidence level for intervals
    pub confidence_level: f64,
    /// Demeaning and backfitting settings
    pub demean: DemeanConfig,
    /// Relative singular value below which the design is rank deficient
    pub rank_tol: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            vcov: VcovType::Iid,
            confidence_level: 0.95,
            demean: DemeanConfig::default(),
            rank_tol: 1e-10,
        }
    }
}

impl EstimatorConfig {
    pub fn with_vcov(mut self, vcov: VcovType) -> Self {
        self.vcov = vcov;
        self
    }

    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    pub fn with_demean(mut self, demean: DemeanConfig) -> Self {
        self.demean = demean;
        self
    }

    pub fn with_rank_tol(mut self, rank_tol: f64) -> Self {
        self.rank_tol = rank_tol;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ModelError::invalid_config(format!(
                "confidence level must lie in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if !(self.rank_tol.is_finite() && self.rank_tol > 0.0) {
            return Err(ModelError::invalid_config(format!(
                "rank tolerance must be positive, got {}",
                self.rank_tol
            )));
        }
        self.demean.validate()
    }
}

/// Fit with default settings and recover the group effects
pub fn feols(formula: &str, data: &DataFrame) -> Result<DemandModel> {
    FixedEffectsRegression::new(formula)?
        .data(data)
        .with_group_effects()
        .fit()
}
