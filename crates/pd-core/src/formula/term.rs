//! Term types for formula specification
//!
//! A term names one source column and how it enters the model: as a
//! numeric value (optionally log-transformed) or as a categorical factor
//! expanded into dummy columns.

use crate::data::*;
use crate::formula::error::{FormulaError, FormulaResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Elementwise transform applied to a numeric column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transform {
    /// Value used as is
    Identity,
    /// Natural log, defined for x > 0
    Log,
    /// ln(1 + x), defined for x > -1
    Log1p,
}

impl Transform {
    /// Resolve a formula function name
    pub fn from_function(name: &str) -> Option<Self> {
        match name {
            "log" => Some(Transform::Log),
            "log1p" => Some(Transform::Log1p),
            "I" | "identity" => Some(Transform::Identity),
            _ => None,
        }
    }

    /// Function name used when displaying the transform
    pub fn function_name(&self) -> Option<&'static str> {
        match self {
            Transform::Identity => None,
            Transform::Log => Some("log"),
            Transform::Log1p => Some("log1p"),
        }
    }

    /// Apply the transform, or `None` outside its domain
    pub fn apply(&self, x: f64) -> Option<f64> {
        match self {
            Transform::Identity => Some(x),
            Transform::Log if x > 0.0 => Some(x.ln()),
            Transform::Log1p if x > -1.0 => Some(x.ln_1p()),
            _ => None,
        }
    }

    /// Map a link-scale value back to the original scale
    ///
    /// `exp(y) - 1` for `log1p`, `exp(y)` for `log`.
    pub fn inverse(&self, y: f64) -> f64 {
        match self {
            Transform::Identity => y,
            Transform::Log => y.exp(),
            Transform::Log1p => y.exp_m1(),
        }
    }

    /// Error for a value outside the domain of the transform
    fn domain_error(&self, column: &str, row: usize, value: f64) -> DataError {
        match self {
            Transform::Log1p => DataError::InvalidValue {
                column: column.to_string(),
                row,
                value,
                reason: "log1p is only defined above -1",
            },
            _ => DataError::NonPositive {
                column: column.to_string(),
                row,
                value,
            },
        }
    }

    /// Apply [`Transform::inverse`] to every element
    pub fn inverse_array(&self, values: &FloatArray) -> FloatArray {
        values.mapv(|y| self.inverse(y))
    }
}

/// Kind of term
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TermKind {
    /// Numeric column, possibly transformed
    Numeric(Transform),
    /// Categorical column expanded to dummies, first sorted level omitted
    Factor,
}

/// A term in a formula
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    /// Source column
    pub variable: String,
    /// How the column enters the model
    pub kind: TermKind,
}

impl Term {
    /// Create a plain numeric term
    pub fn variable(name: &str) -> Self {
        Self::numeric(name, Transform::Identity)
    }

    /// Create a transformed numeric term
    pub fn numeric(name: &str, transform: Transform) -> Self {
        Self {
            variable: name.to_string(),
            kind: TermKind::Numeric(transform),
        }
    }

    /// `log(name)`
    pub fn log(name: &str) -> Self {
        Self::numeric(name, Transform::Log)
    }

    /// `log1p(name)`
    pub fn log1p(name: &str) -> Self {
        Self::numeric(name, Transform::Log1p)
    }

    /// `factor(name)`
    pub fn factor(name: &str) -> Self {
        Self {
            variable: name.to_string(),
            kind: TermKind::Factor,
        }
    }

    /// Transform of a numeric term
    pub fn transform(&self) -> Option<Transform> {
        match self.kind {
            TermKind::Numeric(t) => Some(t),
            TermKind::Factor => None,
        }
    }

    /// Check if the term is a categorical factor
    pub fn is_factor(&self) -> bool {
        matches!(self.kind, TermKind::Factor)
    }

    /// Evaluate a numeric term to a column of values
    ///
    /// Missing values and values outside the transform's domain are
    /// reported, never coerced.
    pub fn evaluate(&self, df: &DataFrame) -> FormulaResult<FloatArray> {
        let transform = self.transform().ok_or_else(|| FormulaError::TypeMismatch {
            variable: self.variable.clone(),
            expected_type: "numeric term",
            actual_type: "factor".to_string(),
        })?;

        let series = df
            .get_column(&self.variable)
            .ok_or_else(|| FormulaError::variable_not_found(&self.variable, &df.column_names()))?;

        if !series.is_numeric() {
            return Err(FormulaError::TypeMismatch {
                variable: self.variable.clone(),
                expected_type: "numeric",
                actual_type: series.dtype().to_string(),
            });
        }

        let raw = series.to_float_array()?;
        let mut out = FloatArray::zeros(raw.len());
        for (row, (&x, slot)) in raw.iter().zip(out.iter_mut()).enumerate() {
            if x.is_nan() {
                return Err(DataError::MissingData {
                    column: self.variable.clone(),
                    row,
                }
                .into());
            }
            *slot = transform
                .apply(x)
                .ok_or_else(|| transform.domain_error(&self.variable, row, x))?;
        }

        Ok(out)
    }

    /// Level labels of a factor term (or of any categorical key column)
    pub fn levels(&self, df: &DataFrame) -> FormulaResult<Vec<String>> {
        let series = df
            .get_column(&self.variable)
            .ok_or_else(|| FormulaError::variable_not_found(&self.variable, &df.column_names()))?;
        Ok(series.level_labels()?)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TermKind::Numeric(t) => match t.function_name() {
                Some(func) => write!(f, "{}({})", func, self.variable),
                None => write!(f, "{}", self.variable),
            },
            TermKind::Factor => write!(f, "factor({})", self.variable),
        }
    }
}
