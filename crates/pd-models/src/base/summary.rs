//! Model summary structures

use super::coefficient::Coefficient;
use super::statistics::ModelStatistics;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Absorbed grouping variable as reported in a summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedEffectInfo {
    pub variable: String,
    pub levels: usize,
}

/// Reporting view of a fitted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Model formula
    pub formula: String,
    /// Variance estimator label
    pub vcov: String,
    /// Confidence level of the reported intervals
    pub confidence_level: f64,
    /// Coefficients table
    pub coefficients: Vec<Coefficient>,
    /// Absorbed effects
    pub fixed_effects: Vec<FixedEffectInfo>,
    /// Fit statistics
    pub statistics: ModelStatistics,
}

impl ModelSummary {
    /// Look up a coefficient by design column name
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }
}

impl fmt::Display for ModelSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.statistics;
        writeln!(f, "Fixed-Effects Regression")?;
        writeln!(f, "========================")?;
        writeln!(f, "Formula: {}", self.formula)?;
        writeln!(f, "Observations: {}", stats.n_obs)?;
        writeln!(f, "Standard errors: {}", self.vcov)?;
        writeln!(f)?;

        writeln!(f, "Coefficients:")?;
        writeln!(
            f,
            "{:<24} {:>12} {:>12} {:>10} {:>10} {:>12} {:>12}",
            "Term",
            "Estimate",
            "Std Error",
            "t-value",
            "p-value",
            format!("[{:.1}%", (1.0 - self.confidence_level) * 50.0),
            format!("{:.1}%]", 100.0 - (1.0 - self.confidence_level) * 50.0)
        )?;
        writeln!(
            f,
            "{:-<24} {:-<12} {:-<12} {:-<10} {:-<10} {:-<12} {:-<12}",
            "", "", "", "", "", "", ""
        )?;
        for coeff in &self.coefficients {
            writeln!(
                f,
                "{:<24} {:>12.6} {:>12.6} {:>10.3} {:>10.4} {:>12.6} {:>12.6}",
                coeff.name,
                coeff.estimate,
                coeff.std_error.unwrap_or(f64::NAN),
                coeff.t_stat.unwrap_or(f64::NAN),
                coeff.p_value.unwrap_or(f64::NAN),
                coeff.ci_lower.unwrap_or(f64::NAN),
                coeff.ci_upper.unwrap_or(f64::NAN)
            )?;
        }
        writeln!(f)?;

        if !self.fixed_effects.is_empty() {
            writeln!(f, "Absorbed effects:")?;
            for fe in &self.fixed_effects {
                writeln!(f, "  {:<20} {} levels", fe.variable, fe.levels)?;
            }
            writeln!(f, "  Absorbed DF: {}", stats.df_absorbed)?;
            writeln!(f)?;
        }

        writeln!(f, "Model Statistics:")?;
        writeln!(f, "  R-squared: {:.4}", stats.r_squared)?;
        writeln!(f, "  Within R-squared: {:.4}", stats.r_squared_within)?;
        writeln!(f, "  RMSE: {:.4}", stats.rmse)?;
        writeln!(f, "  Residual Std. Error: {:.4}", stats.residual_std_error)?;
        writeln!(f, "  Residual DF: {}", stats.df_residual)?;
        if let Some(g) = stats.n_clusters {
            writeln!(f, "  Clusters: {}", g)?;
        }
        if stats.dropped_singletons > 0 {
            writeln!(f, "  Singletons dropped: {}", stats.dropped_singletons)?;
        }
        write!(f, "  Demeaning sweeps: {}", stats.iterations)?;
        if !stats.converged {
            write!(f, " (not converged)")?;
        }
        writeln!(f)
    }
}
