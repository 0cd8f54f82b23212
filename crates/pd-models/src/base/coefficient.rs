//! One row of the slope table

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// A slope with its t-test against zero and its confidence interval
///
/// The inference fields stay `None` when the standard error is not
/// finite, so a broken covariance never shows up as a p value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    /// Design column, e.g. `log(price_a)` or `region[north]`
    pub name: String,
    pub estimate: f64,
    pub std_error: Option<f64>,
    pub t_stat: Option<f64>,
    /// Two-sided, against zero
    pub p_value: Option<f64>,
    pub ci_lower: Option<f64>,
    pub ci_upper: Option<f64>,
    /// Degrees of freedom of the reference t distribution
    pub df: Option<f64>,
}

impl Coefficient {
    /// Slope with no inference attached
    pub fn new(name: impl Into<String>, estimate: f64) -> Self {
        Self {
            name: name.into(),
            estimate,
            std_error: None,
            t_stat: None,
            p_value: None,
            ci_lower: None,
            ci_upper: None,
            df: None,
        }
    }

    /// Test `estimate` against zero under `reference`; the interval is
    /// `estimate ± t_critical · std_error`
    pub fn tested(
        name: impl Into<String>,
        estimate: f64,
        std_error: f64,
        reference: &StudentsT,
        t_critical: f64,
    ) -> Self {
        if !std_error.is_finite() {
            return Self::new(name, estimate);
        }
        let t = estimate / std_error;
        let p = (2.0 * (1.0 - reference.cdf(t.abs()))).clamp(0.0, 1.0);
        Self {
            name: name.into(),
            estimate,
            std_error: Some(std_error),
            t_stat: Some(t),
            p_value: Some(p),
            ci_lower: Some(estimate - t_critical * std_error),
            ci_upper: Some(estimate + t_critical * std_error),
            df: Some(reference.freedom()),
        }
    }

    pub fn interval(&self) -> Option<(f64, f64)> {
        Some((self.ci_lower?, self.ci_upper?))
    }

    /// Whether the slope differs from zero at level `alpha`
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value.is_some_and(|p| p < alpha)
    }
}
