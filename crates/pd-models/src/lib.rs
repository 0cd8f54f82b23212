//! Fixed-effects demand models for PanelDemand
//!
//! Estimation absorbs high-cardinality grouping variables by demeaning,
//! the resulting [`DemandModel`] predicts on new rows with the exact
//! training transformation, and [`ProfitSimulator`] turns two fitted
//! models into a counterfactual profit grid over joint price changes.

pub mod base;
pub mod error;
pub mod fe;
pub mod lm;
pub mod model;
pub mod predict;
pub mod simulate;

pub use error::ModelError;
pub use lm::{EstimatorConfig, FixedEffectsRegression, VcovType, feols};
pub use model::DemandModel;
pub use predict::{Prediction, PredictionMode, ValidationMetrics};
pub use simulate::{DeltaSet, ProductSpec, ProfitGrid, ProfitSimulator, SimulationConfig};
