//! SVD least squares with rank diagnosis

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use pd_core::data::Matrix;

use crate::base::Result;
use crate::error::ModelError;

/// Weight above which a column counts as part of a null-space direction
const NULL_WEIGHT_TOL: f64 = 1e-6;

/// Solution of `min ‖y − Xβ‖²` for a full-rank `X`
#[derive(Debug, Clone)]
pub struct LeastSquares {
    pub coefficients: Array1<f64>,
    /// (X'X)⁻¹ from the same decomposition
    pub xtx_inv: Array2<f64>,
    pub singular_values: Array1<f64>,
}

/// Solve the least-squares problem, rejecting rank-deficient designs
///
/// A singular value below `rank_tol · s_max` marks a null-space direction;
/// every column with non-negligible weight in such a direction is reported
/// in [`ModelError::RankDeficient`].
pub fn solve_least_squares(
    x: &Matrix,
    y: &Array1<f64>,
    names: &[String],
    rank_tol: f64,
) -> Result<LeastSquares> {
    let (n, p) = x.dim();
    if y.len() != n {
        return Err(ModelError::Data(pd_core::data::DataError::DimensionMismatch {
            expected: format!("response length {}", n),
            actual: format!("response length {}", y.len()),
        }));
    }
    if p == 0 {
        return Ok(LeastSquares {
            coefficients: Array1::zeros(0),
            xtx_inv: Array2::zeros((0, 0)),
            singular_values: Array1::zeros(0),
        });
    }
    if n < p {
        return Err(ModelError::InsufficientData {
            n_samples: n,
            n_parameters: p,
        });
    }

    let design = DMatrix::from_fn(n, p, |i, j| x[(i, j)]);
    let svd = design.svd(true, true);
    let v_t = svd
        .v_t
        .as_ref()
        .ok_or_else(|| ModelError::numerical("right singular vectors missing", "svd"))?;

    let s = &svd.singular_values;
    let s_max = s.max();
    let threshold = rank_tol * s_max;

    let mut implicated = vec![false; p];
    let mut deficient = s_max <= 0.0;
    for (k, &sk) in s.iter().enumerate() {
        if sk <= threshold {
            deficient = true;
            for (j, flag) in implicated.iter_mut().enumerate() {
                if v_t[(k, j)].abs() > NULL_WEIGHT_TOL {
                    *flag = true;
                }
            }
        }
    }
    if deficient {
        let columns: Vec<String> = names
            .iter()
            .zip(&implicated)
            .filter(|(_, flag)| **flag || s_max <= 0.0)
            .map(|(name, _)| name.clone())
            .collect();
        return Err(ModelError::RankDeficient { columns });
    }

    let rhs = DVector::from_iterator(n, y.iter().copied());
    let beta = svd
        .solve(&rhs, threshold)
        .map_err(|e| ModelError::numerical(e, "svd solve"))?;

    let xtx_inv = Array2::from_shape_fn((p, p), |(a, b)| {
        s.iter()
            .enumerate()
            .map(|(k, &sk)| v_t[(k, a)] * v_t[(k, b)] / (sk * sk))
            .sum()
    });

    Ok(LeastSquares {
        coefficients: beta.iter().copied().collect(),
        xtx_inv,
        singular_values: s.iter().copied().collect(),
    })
}
