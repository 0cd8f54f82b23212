//! Counterfactual joint-pricing profit simulation
//!
//! Two fitted demand models, one per product, are scored on the baseline
//! data after scaling both products' prices by every pair of deltas in a
//! [`DeltaSet`]. Everything else in the data is held at its observed
//! value. Each cell is a pure function of read-only inputs, so cells are
//! evaluated in parallel and merged in grid order.

use ndarray::Array1;
use pd_core::data::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::base::Result;
use crate::error::ModelError;
use crate::model::DemandModel;
use crate::predict::PredictionMode;

pub mod grid;


pub use grid::{CellOutcome, GridCell, ProfitGrid};

/// Validated, ordered set of relative price changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct DeltaSet(Vec<f64>);

impl DeltaSet {
    /// Validate `deltas`: non-empty, finite, each above -1, no
    /// duplicates, and containing the 0.0 baseline
    pub fn new(deltas: Vec<f64>) -> Result<Self> {
        if deltas.is_empty() {
            return Err(ModelError::grid_config("delta set is empty"));
        }
        if let Some(d) = deltas.iter().find(|d| !d.is_finite()) {
            return Err(ModelError::grid_config(format!("delta {} is not finite", d)));
        }
        if let Some(d) = deltas.iter().find(|&&d| d <= -1.0) {
            return Err(ModelError::grid_config(format!(
                "delta {} would make prices non-positive",
                d
            )));
        }
        let mut seen = BTreeSet::new();
        for d in &deltas {
            // -0.0 and 0.0 are the same price change
            if !seen.insert((d + 0.0).to_bits()) {
                return Err(ModelError::grid_config(format!("delta {} appears twice", d)));
            }
        }
        if !deltas.contains(&0.0) {
            return Err(ModelError::grid_config(
                "delta set must contain the 0.0 baseline",
            ));
        }
        Ok(Self(deltas))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every (delta_a, delta_b) pair, delta_a outer
    pub fn pairs(&self) -> Vec<(f64, f64)> {
        self.0
            .iter()
            .flat_map(|&a| self.0.iter().map(move |&b| (a, b)))
            .collect()
    }
}

impl TryFrom<Vec<f64>> for DeltaSet {
    type Error = ModelError;

    fn try_from(deltas: Vec<f64>) -> Result<Self> {
        DeltaSet::new(deltas)
    }
}

impl From<DeltaSet> for Vec<f64> {
    fn from(set: DeltaSet) -> Self {
        set.0
    }
}

/// Price column and unit cost of one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSpec {
    pub price_column: String,
    pub cost: f64,
}

impl ProductSpec {
    pub fn new(price_column: impl Into<String>, cost: f64) -> Self {
        Self {
            price_column: price_column.into(),
            cost,
        }
    }

    /// Unit cost implied by the margins at the mean baseline price:
    /// `(1 - gross_margin) · (1 - retail_margin) · mean(price)`
    pub fn from_margins(
        price_column: impl Into<String>,
        data: &DataFrame,
        gross_margin: f64,
        retail_margin: f64,
    ) -> Result<Self> {
        for (name, value) in [("gross margin", gross_margin), ("retail margin", retail_margin)] {
            if !(0.0..1.0).contains(&value) {
                return Err(ModelError::invalid_config(format!(
                    "{} must lie in [0, 1), got {}",
                    name, value
                )));
            }
        }
        let price_column = price_column.into();
        let mean_price = data.column(&price_column)?.mean()?;
        Ok(Self {
            cost: (1.0 - gross_margin) * (1.0 - retail_margin) * mean_price,
            price_column,
        })
    }
}

/// Simulation settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Share of the shelf price kept by the retailer
    pub retail_margin: f64,
    /// How rows with unseen levels are handled in every cell
    pub prediction_mode: PredictionMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            retail_margin: 0.0,
            prediction_mode: PredictionMode::Strict,
        }
    }
}

impl SimulationConfig {
    pub fn with_retail_margin(mut self, retail_margin: f64) -> Self {
        self.retail_margin = retail_margin;
        self
    }

    pub fn with_prediction_mode(mut self, mode: PredictionMode) -> Self {
        self.prediction_mode = mode;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.retail_margin) {
            return Err(ModelError::invalid_config(format!(
                "retail margin must lie in [0, 1), got {}",
                self.retail_margin
            )));
        }
        Ok(())
    }
}

/// Evaluates joint price changes of two products
#[derive(Debug, Clone, Default)]
pub struct ProfitSimulator {
    config: SimulationConfig,
}

impl ProfitSimulator {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Aggregate profit at observed prices
    pub fn baseline_profit(
        &self,
        model_a: &DemandModel,
        model_b: &DemandModel,
        data: &DataFrame,
        product_a: &ProductSpec,
        product_b: &ProductSpec,
    ) -> Result<f64> {
        self.check_inputs(data, product_a, product_b)?;
        self.profit(model_a, model_b, data, product_a, product_b)
            .map(|aggregate| aggregate.total)
    }

    /// Profit for every pair of deltas
    ///
    /// Invalid inputs abort the run. A cell whose prediction fails is
    /// recorded as [`CellOutcome::Failed`] and the rest of the grid is
    /// still evaluated.
    pub fn simulate(
        &self,
        model_a: &DemandModel,
        model_b: &DemandModel,
        data: &DataFrame,
        product_a: &ProductSpec,
        product_b: &ProductSpec,
        deltas: &DeltaSet,
    ) -> Result<ProfitGrid> {
        self.check_inputs(data, product_a, product_b)?;
        let pairs = deltas.pairs();

        let evaluate = |&(delta_a, delta_b): &(f64, f64)| -> (f64, f64, Result<Aggregate>) {
            let profit = data
                .with_scaled_columns(&[
                    (product_a.price_column.as_str(), 1.0 + delta_a),
                    (product_b.price_column.as_str(), 1.0 + delta_b),
                ])
                .map_err(ModelError::from)
                .and_then(|scaled| self.profit(model_a, model_b, &scaled, product_a, product_b));
            (delta_a, delta_b, profit)
        };

        #[cfg(feature = "parallel")]
        let raw: Vec<(f64, f64, Result<Aggregate>)> = pairs.par_iter().map(evaluate).collect();

        #[cfg(not(feature = "parallel"))]
        let raw: Vec<(f64, f64, Result<Aggregate>)> = pairs.iter().map(evaluate).collect();

        let baseline = raw
            .iter()
            .find(|(a, b, _)| *a == 0.0 && *b == 0.0)
            .and_then(|(_, _, p)| p.as_ref().ok().map(|aggregate| aggregate.total))
            .filter(|p| *p != 0.0);

        let cells: Vec<GridCell> = raw
            .into_iter()
            .map(|(delta_a, delta_b, result)| {
                let outcome = match result {
                    Ok(Aggregate {
                        total: profit,
                        scored,
                        excluded,
                    }) => {
                        let ratio = if delta_a == 0.0 && delta_b == 0.0 && baseline.is_some() {
                            Some(1.0)
                        } else {
                            baseline.map(|base| profit / base)
                        };
                        CellOutcome::Profit {
                            profit,
                            ratio,
                            scored,
                            excluded,
                        }
                    }
                    Err(e) => {
                        warn!(delta_a, delta_b, error = %e, "grid cell failed");
                        CellOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                };
                GridCell {
                    delta_a,
                    delta_b,
                    outcome,
                }
            })
            .collect();

        let grid = ProfitGrid::new(deltas.as_slice().to_vec(), cells);
        let failed = grid.failures().count();
        info!(
            cells = grid.len(),
            failed,
            baseline_profit = baseline.unwrap_or(f64::NAN),
            "profit grid simulated"
        );
        Ok(grid)
    }

    fn check_inputs(
        &self,
        data: &DataFrame,
        product_a: &ProductSpec,
        product_b: &ProductSpec,
    ) -> Result<()> {
        self.config.validate()?;
        if product_a.price_column == product_b.price_column {
            return Err(ModelError::grid_config(format!(
                "both products use price column '{}'",
                product_a.price_column
            )));
        }
        for product in [product_a, product_b] {
            if !product.cost.is_finite() {
                return Err(ModelError::invalid_config(format!(
                    "cost for '{}' is not finite",
                    product.price_column
                )));
            }
            data.float_column(&product.price_column)?;
        }
        Ok(())
    }

    /// Σ q_a (p_a (1 - rm) - c_a) + q_b (p_b (1 - rm) - c_b) over rows both
    /// models could score; fails when there are none
    fn profit(
        &self,
        model_a: &DemandModel,
        model_b: &DemandModel,
        frame: &DataFrame,
        product_a: &ProductSpec,
        product_b: &ProductSpec,
    ) -> Result<Aggregate> {
        let n = frame.nrows();
        let mode = self.config.prediction_mode;
        let quantities_a = quantities(model_a, frame, mode)?;
        let quantities_b = quantities(model_b, frame, mode)?;
        let price_a = frame.float_column(&product_a.price_column)?;
        let price_b = frame.float_column(&product_b.price_column)?;
        let keep = 1.0 - self.config.retail_margin;

        let mut total = 0.0;
        let mut scored = 0;
        for i in 0..n {
            if let (Some(qa), Some(qb)) = (quantities_a[i], quantities_b[i]) {
                total += qa * (price_a[i] * keep - product_a.cost)
                    + qb * (price_b[i] * keep - product_b.cost);
                scored += 1;
            }
        }

        let excluded = n - scored;
        if scored == 0 {
            return Err(ModelError::numerical(
                format!("no row could be scored by both demand models ({} excluded)", excluded),
                "profit aggregation",
            ));
        }
        if excluded > 0 {
            debug!(scored, excluded, "profit aggregated over scored rows");
        }
        if !total.is_finite() {
            return Err(ModelError::numerical(
                format!("profit is not finite ({})", total),
                "profit aggregation",
            ));
        }
        Ok(Aggregate {
            total,
            scored,
            excluded,
        })
    }
}

/// Profit summed over the rows that were scored
#[derive(Debug, Clone, Copy)]
struct Aggregate {
    total: f64,
    scored: usize,
    excluded: usize,
}

/// Predicted quantities on the original scale, `None` for excluded rows
fn quantities(
    model: &DemandModel,
    frame: &DataFrame,
    mode: PredictionMode,
) -> Result<Vec<Option<f64>>> {
    let prediction = model.predict_with(frame, mode)?;
    let transform = model.response_transform();
    let levels: Array1<f64> = transform.inverse_array(&prediction.values);
    let mut out = vec![None; frame.nrows()];
    for (&row, &q) in prediction.rows.iter().zip(levels.iter()) {
        out[row] = Some(q);
    }
    Ok(out)
}
