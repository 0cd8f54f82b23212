//! Counterfactual profit grid

use pd_core::data::{DataFrame, Series};
use serde::{Deserialize, Serialize};

use crate::base::Result;

/// Result of one grid cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellOutcome {
    /// Aggregate profit; `ratio` is relative to the (0, 0) cell and is
    /// `None` when the baseline failed or earned exactly zero
    Profit {
        profit: f64,
        ratio: Option<f64>,
        /// Rows both models scored
        scored: usize,
        /// Rows left out in lenient mode
        excluded: usize,
    },
    /// Prediction or aggregation failed for this cell only
    Failed { reason: String },
}

/// One (delta_a, delta_b) combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub delta_a: f64,
    pub delta_b: f64,
    pub outcome: CellOutcome,
}

impl GridCell {
    pub fn profit(&self) -> Option<f64> {
        match self.outcome {
            CellOutcome::Profit { profit, .. } => Some(profit),
            CellOutcome::Failed { .. } => None,
        }
    }

    pub fn ratio(&self) -> Option<f64> {
        match self.outcome {
            CellOutcome::Profit { ratio, .. } => ratio,
            CellOutcome::Failed { .. } => None,
        }
    }

    /// (scored, excluded) row counts behind the profit
    pub fn coverage(&self) -> Option<(usize, usize)> {
        match self.outcome {
            CellOutcome::Profit {
                scored, excluded, ..
            } => Some((scored, excluded)),
            CellOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, CellOutcome::Failed { .. })
    }
}

/// Full Cartesian grid, row-major with `delta_a` outer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitGrid {
    deltas: Vec<f64>,
    cells: Vec<GridCell>,
}

impl ProfitGrid {
    pub(crate) fn new(deltas: Vec<f64>, cells: Vec<GridCell>) -> Self {
        Self { deltas, cells }
    }

    /// Deltas along each axis, in input order
    pub fn deltas(&self) -> &[f64] {
        &self.deltas
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell for an exact pair of deltas from the set
    pub fn get(&self, delta_a: f64, delta_b: f64) -> Option<&GridCell> {
        let i = self.deltas.iter().position(|&d| d == delta_a)?;
        let j = self.deltas.iter().position(|&d| d == delta_b)?;
        self.cells.get(i * self.deltas.len() + j)
    }

    /// The (0, 0) cell
    pub fn baseline(&self) -> Option<&GridCell> {
        self.get(0.0, 0.0)
    }

    /// Cell with the highest profit, ignoring failures
    pub fn best(&self) -> Option<&GridCell> {
        self.cells
            .iter()
            .filter_map(|c| c.profit().map(|p| (c, p)))
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(c, _)| c)
    }

    /// Cells that failed
    pub fn failures(&self) -> impl Iterator<Item = &GridCell> {
        self.cells.iter().filter(|c| c.is_failed())
    }

    /// Tabular hand-off for reporting
    ///
    /// Failed cells carry NaN profit and ratio, zero row counts,
    /// `failed = true` and their reason in `status`.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let floats = |f: fn(&GridCell) -> f64| {
            Series::float(self.cells.iter().map(f).collect::<Vec<_>>())
        };
        let counts = |f: fn((usize, usize)) -> usize| {
            Series::int(
                self.cells
                    .iter()
                    .map(|c| c.coverage().map_or(0, f) as i64)
                    .collect::<Vec<_>>(),
            )
        };
        let status: Vec<String> = self
            .cells
            .iter()
            .map(|c| match &c.outcome {
                CellOutcome::Profit { .. } => "ok".to_string(),
                CellOutcome::Failed { reason } => reason.clone(),
            })
            .collect();

        let frame = DataFrame::from_columns(vec![
            ("delta_a", floats(|c| c.delta_a)),
            ("delta_b", floats(|c| c.delta_b)),
            ("profit", floats(|c| c.profit().unwrap_or(f64::NAN))),
            ("profit_ratio", floats(|c| c.ratio().unwrap_or(f64::NAN))),
            ("scored", counts(|(scored, _)| scored)),
            ("excluded", counts(|(_, excluded)| excluded)),
            (
                "failed",
                Series::bool(self.cells.iter().map(GridCell::is_failed).collect::<Vec<_>>()),
            ),
            ("status", Series::string(status)),
        ])?;
        Ok(frame)
    }
}
