//! Model-related error types

use thiserror::Error;

use pd_core::data::DataError;
use pd_core::formula::error::FormulaError;

/// Model-related errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// Formula parsing or evaluation error
    #[error("Formula error: {0}")]
    Formula(#[from] FormulaError),

    /// Data-related error
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Regressors are not of full column rank after demeaning
    #[error("Design matrix is rank deficient; collinear columns: {columns:?}")]
    RankDeficient {
        /// Columns with weight in a null-space direction
        columns: Vec<String>,
    },

    /// Alternating projections did not reach the tolerance
    #[error("Demeaning failed to converge after {max_iter} sweeps (last change {max_change:e})")]
    NotConverged {
        /// Sweeps attempted
        max_iter: usize,
        /// Largest absolute change in the final sweep
        max_change: f64,
    },

    /// A row carries a level never seen in training
    #[error("Level '{level}' of '{variable}' at row {row} was not seen in training")]
    UnseenCategory {
        /// Grouping or factor variable
        variable: String,
        /// Offending level label
        level: String,
        /// Row in the prediction data
        row: usize,
    },

    /// Invalid counterfactual grid configuration
    #[error("Invalid grid configuration: {message}")]
    GridConfig {
        /// Configuration error message
        message: String,
    },

    /// Model absorbs fixed effects but their levels were never recovered
    #[error("Group effects have not been recovered; call with_group_effects before predicting")]
    GroupEffectsUnavailable,

    /// Insufficient data for model fitting
    #[error("Not enough data: {n_samples} samples for {n_parameters} parameters")]
    InsufficientData {
        /// Number of samples
        n_samples: usize,
        /// Slopes plus absorbed degrees of freedom
        n_parameters: usize,
    },

    /// Invalid model configuration
    #[error("Invalid model configuration: {message}")]
    InvalidConfig {
        /// Configuration error message
        message: String,
    },

    /// Numerical computation error
    #[error("Numerical error: {message} (operation: {operation})")]
    Numerical {
        /// Error message
        message: String,
        /// Operation that failed
        operation: String,
    },
}

impl ModelError {
    pub(crate) fn numerical(message: impl Into<String>, operation: &str) -> Self {
        ModelError::Numerical {
            message: message.into(),
            operation: operation.to_string(),
        }
    }

    pub(crate) fn invalid_config(message: impl Into<String>) -> Self {
        ModelError::InvalidConfig {
            message: message.into(),
        }
    }

    pub(crate) fn grid_config(message: impl Into<String>) -> Self {
        ModelError::GridConfig {
            message: message.into(),
        }
    }
}
