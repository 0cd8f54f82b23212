//! Within-group demeaning by alternating projections

use ndarray::{Array1, Array2, ArrayView1, Axis};
use pd_core::data::Matrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};

use super::GroupIndex;
use crate::base::Result;
use crate::error::ModelError;

/// Demeaning configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemeanConfig {
    /// Stop once the largest absolute change in one sweep falls below this
    pub tol: f64,
    /// Sweep cap for two or more grouping variables
    pub max_iter: usize,
    /// Remove observations that are alone in any group before fitting
    pub drop_singletons: bool,
    /// Return an error instead of the last approximation on non-convergence
    pub fail_on_nonconvergence: bool,
}

impl Default for DemeanConfig {
    fn default() -> Self {
        Self {
            tol: 1e-8,
            max_iter: 10_000,
            drop_singletons: false,
            fail_on_nonconvergence: false,
        }
    }
}

impl DemeanConfig {
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_drop_singletons(mut self, drop: bool) -> Self {
        self.drop_singletons = drop;
        self
    }

    pub fn with_fail_on_nonconvergence(mut self, fail: bool) -> Self {
        self.fail_on_nonconvergence = fail;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(ModelError::invalid_config(format!(
                "demeaning tolerance must be positive, got {}",
                self.tol
            )));
        }
        if self.max_iter == 0 {
            return Err(ModelError::invalid_config("max_iter must be at least 1"));
        }
        Ok(())
    }
}

/// Output of [`Demeaner::demean`]
#[derive(Debug, Clone)]
pub struct Demeaned {
    /// Demeaned copy of the input, same shape
    pub columns: Matrix,
    /// Grand mean of every input column
    pub grand_means: Array1<f64>,
    /// Per grouping variable: levels × columns matrix of original-value means
    pub group_means: Vec<Array2<f64>>,
    /// Sweeps performed (largest over columns)
    pub iterations: usize,
    /// Whether every column met the tolerance
    pub converged: bool,
    /// Largest absolute change in the final sweep of any column
    pub max_change: f64,
}

struct ColumnResult {
    values: Array1<f64>,
    iterations: usize,
    converged: bool,
    max_change: f64,
}

/// Demeans columns within the levels of one or more grouping variables
#[derive(Debug, Clone)]
pub struct Demeaner<'a> {
    groups: &'a [GroupIndex],
    config: DemeanConfig,
}

impl<'a> Demeaner<'a> {
    pub fn new(groups: &'a [GroupIndex], config: DemeanConfig) -> Self {
        Self { groups, config }
    }

    /// Demean every column of `data`
    ///
    /// The input is left untouched. With no grouping variables the columns
    /// are centred on their grand means; with one, a single exact pass is
    /// made; with more, sweeps repeat until the tolerance or the cap.
    pub fn demean(&self, data: &Matrix) -> Result<Demeaned> {
        self.config.validate()?;

        let (n, m) = data.dim();
        if n == 0 {
            return Err(ModelError::InsufficientData {
                n_samples: 0,
                n_parameters: m,
            });
        }
        if let Some(group) = self.groups.iter().find(|g| g.n_obs() != n) {
            return Err(ModelError::Data(pd_core::data::DataError::DimensionMismatch {
                expected: format!("{} rows in group '{}'", n, group.variable()),
                actual: format!("{} rows", group.n_obs()),
            }));
        }

        let grand_means = data
            .mean_axis(Axis(0))
            .ok_or_else(|| ModelError::numerical("empty input", "grand mean"))?;

        let group_means = self
            .groups
            .iter()
            .map(|g| {
                let mut means = Array2::zeros((g.n_levels(), m));
                for (j, column) in data.axis_iter(Axis(1)).enumerate() {
                    means.column_mut(j).assign(&Array1::from(g.group_means(column)));
                }
                means
            })
            .collect();

        #[cfg(feature = "parallel")]
        let results: Vec<ColumnResult> = (0..m)
            .into_par_iter()
            .map(|j| self.demean_column(data.column(j), grand_means[j]))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let results: Vec<ColumnResult> = (0..m)
            .map(|j| self.demean_column(data.column(j), grand_means[j]))
            .collect();

        let mut columns = Matrix::zeros((n, m));
        let mut iterations = 0;
        let mut converged = true;
        let mut max_change = 0.0_f64;
        for (j, result) in results.into_iter().enumerate() {
            columns.column_mut(j).assign(&result.values);
            iterations = iterations.max(result.iterations);
            converged &= result.converged;
            max_change = max_change.max(result.max_change);
        }

        if !converged {
            if self.config.fail_on_nonconvergence {
                return Err(ModelError::NotConverged {
                    max_iter: self.config.max_iter,
                    max_change,
                });
            }
            warn!(
                max_iter = self.config.max_iter,
                max_change, "demeaning did not converge; using last approximation"
            );
        } else {
            debug!(
                n_groups = self.groups.len(),
                columns = m,
                iterations,
                "demeaning converged"
            );
        }

        Ok(Demeaned {
            columns,
            grand_means,
            group_means,
            iterations,
            converged,
            max_change,
        })
    }

    fn demean_column(&self, column: ArrayView1<f64>, grand_mean: f64) -> ColumnResult {
        let mut values = column.to_owned();

        match self.groups {
            [] => {
                values -= grand_mean;
                ColumnResult {
                    values,
                    iterations: 0,
                    converged: true,
                    max_change: 0.0,
                }
            }
            [group] => {
                sweep(&mut values, group);
                ColumnResult {
                    values,
                    iterations: 1,
                    converged: true,
                    max_change: 0.0,
                }
            }
            groups => {
                let mut max_change = f64::INFINITY;
                for iteration in 1..=self.config.max_iter {
                    let before = values.clone();
                    for group in groups {
                        sweep(&mut values, group);
                    }
                    max_change = values
                        .iter()
                        .zip(before.iter())
                        .fold(0.0_f64, |acc, (a, b)| acc.max((a - b).abs()));
                    if max_change < self.config.tol {
                        return ColumnResult {
                            values,
                            iterations: iteration,
                            converged: true,
                            max_change,
                        };
                    }
                }
                ColumnResult {
                    values,
                    iterations: self.config.max_iter,
                    converged: false,
                    max_change,
                }
            }
        }
    }
}

/// Subtract each level's current mean in place
fn sweep(values: &mut Array1<f64>, group: &GroupIndex) {
    let means = level_means(values, group);
    for (value, &code) in values.iter_mut().zip(group.codes()) {
        *value -= means[code];
    }
}

#[cfg(feature = "parallel")]
fn level_means(values: &Array1<f64>, group: &GroupIndex) -> Vec<f64> {
    group
        .members()
        .par_iter()
        .map(|rows| rows.iter().map(|&i| values[i]).sum::<f64>() / rows.len() as f64)
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn level_means(values: &Array1<f64>, group: &GroupIndex) -> Vec<f64> {
    group.group_means(values.view())
}
