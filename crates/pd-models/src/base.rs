//! Reporting structures shared by fitted models
//!
//! Estimation produces a coefficient table and fit statistics; these are
//! the hand-off types consumed by summaries and external reporting.

pub use coefficient::Coefficient;
pub use statistics::ModelStatistics;
pub use summary::{FixedEffectInfo, ModelSummary};

pub use crate::error::ModelError;

pub mod coefficient;
pub mod statistics;
pub mod summary;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;
