//! Fixed-effects regression builder

use ndarray::{Array1, s};
use pd_core::data::{DataFrame, Matrix};
use pd_core::formula::{DesignSpec, Formula};
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::{debug, info};

use crate::base::{Coefficient, FixedEffectInfo, ModelStatistics, Result};
use crate::error::ModelError;
use crate::fe::{
    Demeaner, GroupIndex, TrainingMeans, absorbed_df, non_singleton_mask, recover_group_effects,
};
use crate::lm::solve::solve_least_squares;
use crate::lm::vcov::{self, VcovInput};
use crate::lm::{EstimatorConfig, VcovType};
use crate::model::DemandModel;

/// Builder for a log-linear regression with absorbed fixed effects
#[derive(Debug, Clone)]
pub struct FixedEffectsRegression {
    formula: Formula,
    data: Option<DataFrame>,
    config: EstimatorConfig,
    recover_effects: bool,
}

impl FixedEffectsRegression {
    /// Parse `formula` and start a builder
    pub fn new(formula: &str) -> Result<Self> {
        let formula = Formula::parse(formula)?;
        Self::from_formula(formula)
    }

    /// Start a builder from an already constructed formula
    pub fn from_formula(formula: Formula) -> Result<Self> {
        formula.validate()?;
        Ok(Self {
            formula,
            data: None,
            config: EstimatorConfig::default(),
            recover_effects: false,
        })
    }

    /// Set training data
    pub fn data(mut self, data: &DataFrame) -> Self {
        self.data = Some(data.clone());
        self
    }

    /// Set configuration
    pub fn config(mut self, config: EstimatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the standard error type
    pub fn vcov(mut self, vcov: VcovType) -> Self {
        self.config.vcov = vcov;
        self
    }

    /// Also recover the per-level effects needed for prediction
    pub fn with_group_effects(mut self) -> Self {
        self.recover_effects = true;
        self
    }

    /// Estimate the model
    pub fn fit(self) -> Result<DemandModel> {
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| ModelError::invalid_config("no data provided"))?;
        self.config.validate()?;

        let mut frame = data.clone();
        let mut dropped_singletons = 0;
        if self.config.demean.drop_singletons && !self.formula.fixed_effects.is_empty() {
            let groups = self.group_indices(&frame)?;
            let mask = non_singleton_mask(&groups);
            dropped_singletons = mask.iter().filter(|keep| !**keep).count();
            if dropped_singletons > 0 {
                frame = frame.filter(&mask)?;
                debug!(dropped = dropped_singletons, "removed singleton observations");
            }
        }

        let groups = self.group_indices(&frame)?;
        let clusters = match &self.config.vcov {
            VcovType::Cluster(variable) => Some(GroupIndex::from_frame(&frame, variable)?),
            _ => None,
        };

        let design = DesignSpec::learn(&self.formula.terms, &frame)?;
        let x = design.build(&frame)?.matrix;
        let y = self.formula.response.evaluate(&frame)?;
        let names = design.column_names();
        let (n, p) = x.dim();

        let df_absorbed = absorbed_df(&groups);
        if n <= p + df_absorbed {
            return Err(ModelError::InsufficientData {
                n_samples: n,
                n_parameters: p + df_absorbed,
            });
        }

        let mut stacked = Matrix::zeros((n, p + 1));
        stacked.column_mut(0).assign(&y);
        stacked.slice_mut(s![.., 1..]).assign(&x);
        let demeaned = Demeaner::new(&groups, self.config.demean).demean(&stacked)?;
        let training_means = TrainingMeans::new(&demeaned, &groups);
        let y_within = demeaned.columns.column(0).to_owned();
        let x_within = demeaned.columns.slice(s![.., 1..]).to_owned();

        let ls = solve_least_squares(&x_within, &y_within, &names, self.config.rank_tol)?;
        let beta = ls.coefficients;

        let residuals = &y_within - &x_within.dot(&beta);
        let fitted_values = &y - &residuals;
        let rss = residuals.dot(&residuals);
        let tss_within = y_within.dot(&y_within);
        let y_mean = demeaned.grand_means[0];
        let tss = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>();

        let cov = vcov::compute(
            &self.config.vcov,
            &VcovInput {
                x: &x_within,
                residuals: &residuals,
                xtx_inv: &ls.xtx_inv,
                df_absorbed,
            },
            clusters.as_ref(),
        )?;
        let coefficients = coefficient_table(
            &names,
            &beta,
            &cov.std_errors(),
            cov.df,
            self.config.confidence_level,
        )?;

        let df_residual = n - p - df_absorbed;
        let statistics = ModelStatistics {
            n_obs: n,
            n_coefficients: p,
            df_absorbed,
            df_residual,
            rss,
            r_squared_within: if tss_within > 0.0 { 1.0 - rss / tss_within } else { 0.0 },
            r_squared: if tss > 0.0 { 1.0 - rss / tss } else { 0.0 },
            rmse: (rss / n as f64).sqrt(),
            residual_std_error: (rss / df_residual as f64).sqrt(),
            iterations: demeaned.iterations,
            converged: demeaned.converged,
            n_clusters: cov.n_clusters,
            dropped_singletons,
        };

        // With nothing absorbed the decomposition is just the intercept.
        let group_effects = if groups.len() <= 1 && (self.recover_effects || groups.is_empty()) {
            Some(training_means.group_effects(&beta)?)
        } else if self.recover_effects {
            let raw_residual = &y - &x.dot(&beta);
            Some(recover_group_effects(&raw_residual, &groups, &self.config.demean)?)
        } else {
            None
        };

        info!(
            formula = %self.formula,
            n_obs = n,
            n_coefficients = p,
            df_absorbed,
            r_squared = statistics.r_squared,
            "fitted fixed-effects regression"
        );

        Ok(DemandModel {
            formula: self.formula,
            design,
            coefficients: beta,
            coefficient_table: coefficients,
            vcov: cov.matrix,
            config: self.config,
            statistics,
            fixed_effects: groups
                .iter()
                .map(|g| FixedEffectInfo {
                    variable: g.variable().to_string(),
                    levels: g.n_levels(),
                })
                .collect(),
            fitted_values,
            residuals,
            training_means,
            group_effects,
        })
    }

    fn group_indices(&self, frame: &DataFrame) -> Result<Vec<GroupIndex>> {
        self.formula
            .fixed_effects
            .iter()
            .map(|fe| GroupIndex::from_frame(frame, fe))
            .collect()
    }
}

fn coefficient_table(
    names: &[String],
    beta: &Array1<f64>,
    std_errors: &Array1<f64>,
    df: f64,
    confidence_level: f64,
) -> Result<Vec<Coefficient>> {
    let t_dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| ModelError::numerical(e.to_string(), "t distribution"))?;
    let alpha = 1.0 - confidence_level;
    let t_critical = t_dist.inverse_cdf(1.0 - alpha / 2.0);

    Ok(names
        .iter()
        .zip(beta.iter().zip(std_errors))
        .map(|(name, (&estimate, &se))| {
            Coefficient::tested(name.clone(), estimate, se, &t_dist, t_critical)
        })
        .collect())
}
