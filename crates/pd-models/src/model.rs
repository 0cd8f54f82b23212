//! The fitted demand model

use ndarray::{Array1, Array2};
use pd_core::data::DataFrame;
use pd_core::formula::{DesignSpec, Formula, Transform};
use tracing::debug;

use crate::base::{Coefficient, FixedEffectInfo, ModelStatistics, ModelSummary, Result};
use crate::error::ModelError;
use crate::fe::{GroupEffects, GroupIndex, TrainingMeans, recover_group_effects};
use crate::lm::EstimatorConfig;
use crate::predict::{self, Prediction, PredictionMode, ValidationMetrics};

/// Immutable result of one estimation
///
/// Holds everything prediction needs to reproduce the training
/// transformation on new rows: the formula, the learned design (column
/// order, transforms, factor levels and baselines), the slopes and, once
/// recovered, the grand mean and per-level effects.
#[derive(Debug, Clone)]
pub struct DemandModel {
    pub(crate) formula: Formula,
    pub(crate) design: DesignSpec,
    pub(crate) coefficients: Array1<f64>,
    pub(crate) coefficient_table: Vec<Coefficient>,
    pub(crate) vcov: Array2<f64>,
    pub(crate) config: EstimatorConfig,
    pub(crate) statistics: ModelStatistics,
    pub(crate) fixed_effects: Vec<FixedEffectInfo>,
    pub(crate) fitted_values: Array1<f64>,
    pub(crate) residuals: Array1<f64>,
    pub(crate) training_means: TrainingMeans,
    pub(crate) group_effects: Option<GroupEffects>,
}

impl DemandModel {
    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    /// Learned expansion of the regressors
    pub fn design(&self) -> &DesignSpec {
        &self.design
    }

    /// Slopes in design column order
    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub fn coefficient_names(&self) -> Vec<String> {
        self.design.column_names()
    }

    /// Slope of one design column
    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.coefficient_table
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.estimate)
    }

    /// Estimates with standard errors, t statistics, p values and intervals
    pub fn coefficient_table(&self) -> &[Coefficient] {
        &self.coefficient_table
    }

    /// Variance-covariance matrix of the slopes
    pub fn vcov(&self) -> &Array2<f64> {
        &self.vcov
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    pub fn statistics(&self) -> &ModelStatistics {
        &self.statistics
    }

    /// In-sample fitted values on the link scale (y minus within residual)
    pub fn fitted_values(&self) -> &Array1<f64> {
        &self.fitted_values
    }

    /// Within residuals
    pub fn residuals(&self) -> &Array1<f64> {
        &self.residuals
    }

    /// Transform applied to the response; invert predictions with it
    pub fn response_transform(&self) -> Transform {
        self.formula.response_transform()
    }

    /// Absorbed grouping variables in declaration order
    pub fn fixed_effects(&self) -> &[String] {
        &self.formula.fixed_effects
    }

    /// Response and regressor means of the training rows
    pub fn training_means(&self) -> &TrainingMeans {
        &self.training_means
    }

    pub fn group_effects(&self) -> Option<&GroupEffects> {
        self.group_effects.as_ref()
    }

    pub fn has_group_effects(&self) -> bool {
        self.group_effects.is_some()
    }

    /// Intercept of the recovered decomposition
    pub fn grand_mean(&self) -> Option<f64> {
        self.group_effects.as_ref().map(|e| e.grand_mean)
    }

    /// Reporting view of the fit
    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            formula: self.formula.to_string(),
            vcov: self.config.vcov.to_string(),
            confidence_level: self.config.confidence_level,
            coefficients: self.coefficient_table.clone(),
            fixed_effects: self.fixed_effects.clone(),
            statistics: self.statistics,
        }
    }

    /// Recover the per-level effects from `data`, normally the training rows
    ///
    /// The slopes are kept; the residual `y - Xβ` on `data` is decomposed
    /// into a grand mean and level effects. A new model is returned.
    pub fn with_group_effects(self, data: &DataFrame) -> Result<Self> {
        let built = self.design.build(data)?;
        if let Some(first) = built.unseen.first() {
            return Err(ModelError::UnseenCategory {
                variable: first.variable.clone(),
                level: first.level.clone(),
                row: first.row,
            });
        }
        let y = self.formula.response.evaluate(data)?;
        let residual = &y - &built.matrix.dot(&self.coefficients);

        let groups = self
            .formula
            .fixed_effects
            .iter()
            .map(|fe| GroupIndex::from_frame(data, fe))
            .collect::<Result<Vec<_>>>()?;
        let effects = recover_group_effects(&residual, &groups, &self.config.demean)?;
        debug!(
            iterations = effects.iterations,
            grand_mean = effects.grand_mean,
            "group effects attached to model"
        );

        Ok(Self {
            group_effects: Some(effects),
            ..self
        })
    }

    /// Recover the per-level effects from the stored training means
    ///
    /// Needs no data but only works with at most one absorbed grouping
    /// variable; use [`DemandModel::with_group_effects`] otherwise.
    pub fn with_training_group_effects(self) -> Result<Self> {
        let effects = self.training_means.group_effects(&self.coefficients)?;
        debug!(grand_mean = effects.grand_mean, "group effects rebuilt from training means");
        Ok(Self {
            group_effects: Some(effects),
            ..self
        })
    }

    /// Link-scale predictions, failing on any unseen level
    pub fn predict(&self, data: &DataFrame) -> Result<Array1<f64>> {
        Ok(predict::predict(self, data, PredictionMode::Strict)?.values)
    }

    /// Link-scale predictions under `mode`
    pub fn predict_with(&self, data: &DataFrame, mode: PredictionMode) -> Result<Prediction> {
        predict::predict(self, data, mode)
    }

    /// Hold-out fit on the link scale for the rows that could be scored
    pub fn validate(&self, data: &DataFrame, mode: PredictionMode) -> Result<ValidationMetrics> {
        let prediction = self.predict_with(data, mode)?;
        let actual = self.formula.response.evaluate(data)?;
        let observed: Array1<f64> = prediction.rows.iter().map(|&i| actual[i]).collect();
        ValidationMetrics::compute(&observed, &prediction.values)
    }
}
