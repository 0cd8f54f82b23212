//! Core data structures for PanelDemand
//!
//! This module provides the tabular containers the estimator consumes:
//! typed columns, data frames and the store × week panel dataset.

mod builder;
mod dataframe;
mod panel;
mod series;


// Re-exports
pub use builder::DataFrameBuilder;
pub use dataframe::DataFrame;
pub use panel::{PanelDataset, ProductColumns};
pub use series::{Series, SeriesValue};

// Type aliases for common use cases
pub type FloatArray = ndarray::Array1<f64>;
pub type IntArray = ndarray::Array1<i64>;
pub type BoolArray = ndarray::Array1<bool>;
pub type StringArray = Vec<String>;
pub type Matrix = ndarray::Array2<f64>;

/// Error types specific to data operations
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Index out of bounds: index {index}, length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Invalid column type for '{column}': expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("Operation requires numeric data, got {0}")]
    NonNumericData(&'static str),

    #[error("Missing value in column '{column}' at row {row}")]
    MissingData { column: String, row: usize },

    #[error("Non-positive value {value} in column '{column}' at row {row}")]
    NonPositive {
        column: String,
        row: usize,
        value: f64,
    },

    #[error("Invalid value {value} in column '{column}' at row {row}: {reason}")]
    InvalidValue {
        column: String,
        row: usize,
        value: f64,
        reason: &'static str,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type for data operations
pub type Result<T> = std::result::Result<T, DataError>;
