//! Prediction with the exact training transformation
//!
//! A prediction re-applies the stored design (transforms, factor levels,
//! omitted baselines) to new rows and adds back the grand mean and the
//! recovered level effects. Values stay on the link scale; inverting the
//! response transform is an explicit separate step.

use ndarray::Array1;
use pd_core::data::DataFrame;
pub use pd_core::formula::UnseenLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use crate::base::Result;
use crate::error::ModelError;
use crate::model::DemandModel;

pub mod metrics;

#[cfg(test)]
mod tests;

pub use metrics::ValidationMetrics;

/// What to do with a row carrying a level never seen in training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PredictionMode {
    /// Fail with [`ModelError::UnseenCategory`]
    #[default]
    Strict,
    /// Exclude the row and report it
    Lenient,
}

/// Predictions for the rows that could be scored
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Link-scale values, one per entry of `rows`
    pub values: Array1<f64>,
    /// Input row of each value
    pub rows: Vec<usize>,
    /// Unseen levels that excluded rows, ordered by row
    pub unseen: Vec<UnseenLevel>,
}

impl Prediction {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of distinct rows that were excluded
    pub fn n_excluded(&self) -> usize {
        self.unseen.iter().map(|u| u.row).collect::<BTreeSet<_>>().len()
    }

    /// Values laid out over `n_rows` input rows, `None` where excluded
    pub fn by_row(&self, n_rows: usize) -> Vec<Option<f64>> {
        let mut out = vec![None; n_rows];
        for (&row, &value) in self.rows.iter().zip(self.values.iter()) {
            if let Some(slot) = out.get_mut(row) {
                *slot = Some(value);
            }
        }
        out
    }
}

/// grand mean + Σ βⱼ xⱼ + Σ effect(level) for every row of `data`
pub fn predict(model: &DemandModel, data: &DataFrame, mode: PredictionMode) -> Result<Prediction> {
    let effects = model
        .group_effects()
        .ok_or(ModelError::GroupEffectsUnavailable)?;

    let built = model.design().build(data)?;
    let mut values = built.matrix.dot(model.coefficients()) + effects.grand_mean;
    let mut unseen = built.unseen;

    for variable in model.fixed_effects() {
        let labels = data.column(variable)?.level_labels()?;
        let levels = effects.effects.get(variable).ok_or_else(|| {
            ModelError::numerical(format!("no effects stored for '{}'", variable), "predict")
        })?;
        for (row, label) in labels.into_iter().enumerate() {
            match levels.get(&label) {
                Some(effect) => values[row] += effect,
                None => unseen.push(UnseenLevel {
                    row,
                    variable: variable.clone(),
                    level: label,
                }),
            }
        }
    }
    unseen.sort_by_key(|u| u.row);

    if unseen.is_empty() {
        return Ok(Prediction {
            rows: (0..values.len()).collect(),
            values,
            unseen,
        });
    }

    match mode {
        PredictionMode::Strict => {
            let first = &unseen[0];
            Err(ModelError::UnseenCategory {
                variable: first.variable.clone(),
                level: first.level.clone(),
                row: first.row,
            })
        }
        PredictionMode::Lenient => {
            let excluded: BTreeSet<usize> = unseen.iter().map(|u| u.row).collect();
            let rows: Vec<usize> = (0..values.len()).filter(|r| !excluded.contains(r)).collect();
            warn!(
                excluded = excluded.len(),
                scored = rows.len(),
                "rows with unseen levels excluded from prediction"
            );
            let kept: Array1<f64> = rows.iter().map(|&r| values[r]).collect();
            Ok(Prediction {
                values: kept,
                rows,
                unseen,
            })
        }
    }
}
