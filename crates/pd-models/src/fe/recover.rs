//! Recovery of absorbed level effects
//!
//! After the slopes are known, the residual `r = y - Xβ` is split into a
//! grand mean plus one effect per level of every grouping variable. The
//! split is what prediction adds back on new rows.

use indexmap::IndexMap;
use ndarray::{Array1, Array2, ArrayView1, s};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{DemeanConfig, Demeaned, GroupIndex};
use crate::base::Result;
use crate::error::ModelError;

/// Grand mean plus per-level effects of every absorbed grouping variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupEffects {
    /// Intercept of the recovered decomposition
    pub grand_mean: f64,
    /// Grouping variable → level label → effect; each map has an
    /// observation-weighted mean of zero over the training rows
    pub effects: IndexMap<String, IndexMap<String, f64>>,
    /// Backfitting sweeps performed
    pub iterations: usize,
    pub converged: bool,
}

impl GroupEffects {
    /// Effect of `level` in `variable`
    pub fn effect(&self, variable: &str, level: &str) -> Option<f64> {
        self.effects.get(variable)?.get(level).copied()
    }
}

/// Decompose `residual` into a grand mean and per-level effects
///
/// One grouping variable needs a single pass. Several are fitted by
/// Gauss-Seidel backfitting: each dimension's effect is re-estimated as the
/// level mean of what the other dimensions leave unexplained, until no
/// effect moves by more than the tolerance. Each dimension is then
/// normalised to a zero weighted mean and the offsets folded into the
/// grand mean.
pub fn recover_group_effects(
    residual: &Array1<f64>,
    groups: &[GroupIndex],
    config: &DemeanConfig,
) -> Result<GroupEffects> {
    config.validate()?;
    let n = residual.len();
    let mut grand_mean = residual
        .mean()
        .ok_or_else(|| ModelError::numerical("empty residual", "group effect recovery"))?;

    let mut alphas: Vec<Vec<f64>> = groups.iter().map(|g| vec![0.0; g.n_levels()]).collect();
    // residual left after removing the grand mean and every current effect
    let mut remaining = residual - grand_mean;

    let mut iterations = 0;
    let mut converged = true;
    if !groups.is_empty() {
        let max_sweeps = if groups.len() == 1 { 1 } else { config.max_iter };
        converged = false;
        let mut max_change = f64::INFINITY;

        for sweep in 1..=max_sweeps {
            max_change = 0.0_f64;
            for (group, alpha) in groups.iter().zip(alphas.iter_mut()) {
                for (level, rows) in group.members().iter().enumerate() {
                    let shift =
                        rows.iter().map(|&i| remaining[i]).sum::<f64>() / rows.len() as f64;
                    alpha[level] += shift;
                    for &i in rows {
                        remaining[i] -= shift;
                    }
                    max_change = max_change.max(shift.abs());
                }
            }
            iterations = sweep;
            if groups.len() == 1 || max_change < config.tol {
                converged = true;
                break;
            }
        }

        if !converged {
            if config.fail_on_nonconvergence {
                return Err(ModelError::NotConverged {
                    max_iter: config.max_iter,
                    max_change,
                });
            }
            warn!(
                max_iter = config.max_iter,
                max_change, "group effect backfitting did not converge"
            );
        }
    }

    let mut effects = IndexMap::with_capacity(groups.len());
    for (group, mut alpha) in groups.iter().zip(alphas) {
        let weighted: f64 = group
            .members()
            .iter()
            .zip(&alpha)
            .map(|(rows, a)| rows.len() as f64 * a)
            .sum();
        let offset = weighted / n as f64;
        for a in alpha.iter_mut() {
            *a -= offset;
        }
        grand_mean += offset;

        let levels: IndexMap<String, f64> = group.levels().iter().cloned().zip(alpha).collect();
        effects.insert(group.variable().to_string(), levels);
    }

    debug!(
        n_groups = groups.len(),
        iterations, converged, grand_mean, "recovered group effects"
    );

    Ok(GroupEffects {
        grand_mean,
        effects,
        iterations,
        converged,
    })
}

/// Means of the response and every regressor over the training rows
///
/// Column 0 is the response, columns 1.. follow the design order. With at
/// most one grouping variable these are enough to rebuild the level
/// effects for any slope vector.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingMeans {
    pub grand: Array1<f64>,
    pub groups: Vec<LevelMeans>,
}

/// Per-level means of one grouping variable
#[derive(Debug, Clone, PartialEq)]
pub struct LevelMeans {
    pub variable: String,
    pub levels: Vec<String>,
    /// levels × columns
    pub means: Array2<f64>,
}

impl TrainingMeans {
    pub(crate) fn new(demeaned: &Demeaned, groups: &[GroupIndex]) -> Self {
        let groups = groups
            .iter()
            .zip(&demeaned.group_means)
            .map(|(group, means)| LevelMeans {
                variable: group.variable().to_string(),
                levels: group.levels().to_vec(),
                means: means.clone(),
            })
            .collect();
        Self {
            grand: demeaned.grand_means.clone(),
            groups,
        }
    }

    /// Grand mean and level effects implied by `beta`
    ///
    /// The grand mean is ȳ - x̄β and each level effect is
    /// (ȳ_g - x̄_gβ) minus the grand mean, which already has a weighted mean
    /// of zero. Two or more grouping variables are not separable from the
    /// means alone.
    pub fn group_effects(&self, beta: &Array1<f64>) -> Result<GroupEffects> {
        if self.groups.len() > 1 {
            return Err(ModelError::invalid_config(format!(
                "{} grouping variables need the training rows to recover effects",
                self.groups.len()
            )));
        }
        if self.grand.len() != beta.len() + 1 {
            return Err(ModelError::numerical(
                format!(
                    "{} slopes for {} regressor means",
                    beta.len(),
                    self.grand.len().saturating_sub(1)
                ),
                "group effects from means",
            ));
        }
        let intercept = |means: ArrayView1<f64>| means[0] - means.slice(s![1..]).dot(beta);
        let grand_mean = intercept(self.grand.view());

        let effects = self
            .groups
            .iter()
            .map(|group| {
                let levels = group
                    .levels
                    .iter()
                    .cloned()
                    .zip(group.means.rows().into_iter().map(|row| intercept(row) - grand_mean))
                    .collect::<IndexMap<_, _>>();
                (group.variable.clone(), levels)
            })
            .collect();

        Ok(GroupEffects {
            grand_mean,
            effects,
            iterations: self.groups.len(),
            converged: true,
        })
    }
}
