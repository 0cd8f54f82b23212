//! Variance-covariance estimators for the slopes
//!
//! All three use the demeaned design and within residuals. The sandwich
//! forms share the bread `(X'X)⁻¹` computed by the solver.

use ndarray::{Array1, Array2, ArrayView1};
use pd_core::data::Matrix;

use crate::base::Result;
use crate::error::ModelError;
use crate::fe::GroupIndex;
use crate::lm::VcovType;

/// Covariance matrix plus the degrees of freedom of its reference t
#[derive(Debug, Clone)]
pub struct Vcov {
    pub matrix: Array2<f64>,
    pub df: f64,
    pub n_clusters: Option<usize>,
}

impl Vcov {
    /// Square roots of the diagonal
    pub fn std_errors(&self) -> Array1<f64> {
        self.matrix.diag().mapv(|v| v.max(0.0).sqrt())
    }
}

/// Inputs shared by every estimator
pub struct VcovInput<'a> {
    /// Demeaned regressors
    pub x: &'a Matrix,
    /// Within residuals
    pub residuals: &'a Array1<f64>,
    pub xtx_inv: &'a Array2<f64>,
    /// Degrees of freedom absorbed by the fixed effects
    pub df_absorbed: usize,
}

/// Compute the covariance for `kind`; `clusters` is required for
/// [`VcovType::Cluster`]
pub fn compute(kind: &VcovType, input: &VcovInput<'_>, clusters: Option<&GroupIndex>) -> Result<Vcov> {
    let (n, p) = input.x.dim();
    let k = p + input.df_absorbed;
    if n <= k {
        return Err(ModelError::InsufficientData {
            n_samples: n,
            n_parameters: k,
        });
    }
    let df_resid = (n - k) as f64;

    match kind {
        VcovType::Iid => {
            let rss = input.residuals.dot(input.residuals);
            let sigma2 = rss / df_resid;
            Ok(Vcov {
                matrix: input.xtx_inv * sigma2,
                df: df_resid,
                n_clusters: None,
            })
        }
        VcovType::Hetero => {
            let mut meat = Array2::<f64>::zeros((p, p));
            for (row, &e) in input.x.rows().into_iter().zip(input.residuals) {
                add_outer(&mut meat, row, e * e);
            }
            let correction = n as f64 / df_resid;
            Ok(Vcov {
                matrix: sandwich(input.xtx_inv, &meat) * correction,
                df: df_resid,
                n_clusters: None,
            })
        }
        VcovType::Cluster(variable) => {
            let clusters = clusters.ok_or_else(|| {
                ModelError::invalid_config(format!("cluster variable '{}' not resolved", variable))
            })?;
            let g = clusters.n_levels();
            if g < 2 {
                return Err(ModelError::invalid_config(format!(
                    "clustering on '{}' needs at least 2 clusters, found {}",
                    variable, g
                )));
            }
            if n <= p {
                return Err(ModelError::InsufficientData {
                    n_samples: n,
                    n_parameters: p,
                });
            }

            let mut meat = Array2::<f64>::zeros((p, p));
            for rows in clusters.members() {
                let mut score = Array1::<f64>::zeros(p);
                for &i in rows {
                    score.scaled_add(input.residuals[i], &input.x.row(i));
                }
                add_outer(&mut meat, score.view(), 1.0);
            }

            let (g_f, n_f, p_f) = (g as f64, n as f64, p as f64);
            let correction = (g_f / (g_f - 1.0)) * ((n_f - 1.0) / (n_f - p_f));
            Ok(Vcov {
                matrix: sandwich(input.xtx_inv, &meat) * correction,
                df: g_f - 1.0,
                n_clusters: Some(g),
            })
        }
    }
}

fn add_outer(meat: &mut Array2<f64>, v: ArrayView1<f64>, weight: f64) {
    let p = v.len();
    for a in 0..p {
        for b in 0..p {
            meat[(a, b)] += weight * v[a] * v[b];
        }
    }
}

fn sandwich(bread: &Array2<f64>, meat: &Array2<f64>) -> Array2<f64> {
    bread.dot(meat).dot(bread)
}
