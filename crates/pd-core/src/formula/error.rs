//! Formula-specific error types
//!
//! This module provides detailed error types for formula parsing and evaluation.

use crate::data::DataError;
use thiserror::Error;

/// Errors that can occur during formula parsing and evaluation
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    /// Syntax errors in the formula string
    #[error("Syntax error at position {position}: {message}")]
    Syntax {
        position: usize,
        message: String,
        context: Option<String>,
    },

    /// Function name the formula language does not know
    #[error("Unknown function '{function}'")]
    UnknownFunction { function: String },

    /// Variable not found in the DataFrame
    #[error(
        "Variable '{variable}' not found in DataFrame. Available variables: {available_vars:?}"
    )]
    VariableNotFound {
        variable: String,
        available_vars: Vec<String>,
    },

    /// Variable type mismatch
    #[error("Variable '{variable}' has type {actual_type}, but {expected_type} was expected")]
    TypeMismatch {
        variable: String,
        expected_type: &'static str,
        actual_type: String,
    },

    /// Invalid formula structure
    #[error("Invalid formula structure: {message}")]
    InvalidStructure { message: String },

    /// Data-related errors that bubble up from the data layer
    #[error("Data error in formula evaluation: {0}")]
    Data(#[from] DataError),
}

/// Result type alias for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

impl FormulaError {
    /// Create a syntax error
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        FormulaError::Syntax {
            position,
            message: message.into(),
            context: None,
        }
    }

    /// Create a syntax error with context
    pub fn syntax_with_context(
        position: usize,
        message: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        FormulaError::Syntax {
            position,
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Create a variable not found error
    pub fn variable_not_found(variable: &str, available_vars: &[&str]) -> Self {
        FormulaError::VariableNotFound {
            variable: variable.to_string(),
            available_vars: available_vars.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create a structural error
    pub fn structure(message: impl Into<String>) -> Self {
        FormulaError::InvalidStructure {
            message: message.into(),
        }
    }
}
