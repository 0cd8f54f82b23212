//! Series data structure for holding homogeneous data
//!
//! A Series is a one-dimensional typed column. Numeric series feed the
//! regressors and the response; every non-float series can also act as a
//! grouping key, in which case its values are read as level labels.

use super::*;

use ndarray::Array1;
use std::collections::BTreeSet;

/// A Series is a typed, one-dimensional array of data
#[derive(Clone, Debug, PartialEq)]
pub enum Series {
    /// Floating point numbers (f64)
    Float(FloatArray),
    /// Integer numbers (i64)
    Int(IntArray),
    /// Boolean values
    Bool(BoolArray),
    /// String values
    String(StringArray),
    /// Categorical data (encoded as u32)
    Categorical(Array1<u32>, Vec<String>), // values, categories
}

impl Series {
    /// Create a new Float series
    pub fn float(data: impl Into<FloatArray>) -> Self {
        Series::Float(data.into())
    }

    /// Create a new Int series
    pub fn int(data: impl Into<IntArray>) -> Self {
        Series::Int(data.into())
    }

    /// Create a new Bool series
    pub fn bool(data: impl Into<BoolArray>) -> Self {
        Series::Bool(data.into())
    }

    /// Create a new String series
    pub fn string(data: impl Into<StringArray>) -> Self {
        Series::String(data.into())
    }

    /// Create a new Categorical series with sorted categories
    pub fn categorical<T: AsRef<str>>(data: &[T]) -> Self {
        let categories: Vec<String> = data
            .iter()
            .map(|s| s.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let encoded: Array1<u32> = data
            .iter()
            .map(|s| {
                // Categories were built from the same data, so the search always hits.
                categories
                    .binary_search_by(|c| c.as_str().cmp(s.as_ref()))
                    .map(|i| i as u32)
                    .unwrap_or_default()
            })
            .collect();

        Series::Categorical(encoded, categories)
    }

    /// Get the length of the series
    pub fn len(&self) -> usize {
        match self {
            Series::Float(arr) => arr.len(),
            Series::Int(arr) => arr.len(),
            Series::Bool(arr) => arr.len(),
            Series::String(arr) => arr.len(),
            Series::Categorical(arr, _) => arr.len(),
        }
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the type name of the series
    pub fn dtype(&self) -> &'static str {
        match self {
            Series::Float(_) => "float64",
            Series::Int(_) => "int64",
            Series::Bool(_) => "bool",
            Series::String(_) => "string",
            Series::Categorical(_, _) => "categorical",
        }
    }

    /// Whether the series can be used as a numeric regressor or response
    pub fn is_numeric(&self) -> bool {
        matches!(self, Series::Float(_) | Series::Int(_) | Series::Bool(_))
    }

    /// Get a value at index
    pub fn get(&self, idx: usize) -> Option<SeriesValue> {
        if idx >= self.len() {
            return None;
        }

        match self {
            Series::Float(arr) => arr.get(idx).map(|&v| SeriesValue::Float(v)),
            Series::Int(arr) => arr.get(idx).map(|&v| SeriesValue::Int(v)),
            Series::Bool(arr) => arr.get(idx).map(|&v| SeriesValue::Bool(v)),
            Series::String(arr) => arr.get(idx).map(|v| SeriesValue::String(v.clone())),
            Series::Categorical(arr, cats) => arr
                .get(idx)
                .and_then(|&code| cats.get(code as usize))
                .map(|cat| SeriesValue::String(cat.clone())),
        }
    }

    /// Filter the series with a boolean mask
    pub fn filter(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.len() {
            return Err(DataError::DimensionMismatch {
                expected: format!("mask length {}", self.len()),
                actual: format!("mask length {}", mask.len()),
            });
        }

        fn keep<T: Clone>(values: impl Iterator<Item = T>, mask: &[bool]) -> Vec<T> {
            values
                .zip(mask.iter())
                .filter(|(_, keep)| **keep)
                .map(|(val, _)| val)
                .collect()
        }

        Ok(match self {
            Series::Float(arr) => Series::Float(keep(arr.iter().copied(), mask).into()),
            Series::Int(arr) => Series::Int(keep(arr.iter().copied(), mask).into()),
            Series::Bool(arr) => Series::Bool(keep(arr.iter().copied(), mask).into()),
            Series::String(arr) => Series::String(keep(arr.iter().cloned(), mask)),
            Series::Categorical(arr, cats) => {
                Series::Categorical(keep(arr.iter().copied(), mask).into(), cats.clone())
            }
        })
    }

    /// Convert a numeric series to a float array
    ///
    /// Booleans map to 0/1. String and categorical series are rejected so
    /// that category codes never leak into a regression as numbers.
    pub fn to_float_array(&self) -> Result<FloatArray> {
        match self {
            Series::Float(arr) => Ok(arr.clone()),
            Series::Int(arr) => Ok(arr.mapv(|v| v as f64)),
            Series::Bool(arr) => Ok(arr.mapv(|v| if v { 1.0 } else { 0.0 })),
            Series::String(_) => Err(DataError::NonNumericData("string")),
            Series::Categorical(_, _) => Err(DataError::NonNumericData("categorical")),
        }
    }

    /// Render each value as a level label, for use as a grouping key
    ///
    /// Float series are rejected: grouping on floating-point values is
    /// almost always a mistake upstream.
    pub fn level_labels(&self) -> Result<Vec<String>> {
        match self {
            Series::Int(arr) => Ok(arr.iter().map(|v| v.to_string()).collect()),
            Series::Bool(arr) => Ok(arr.iter().map(|v| v.to_string()).collect()),
            Series::String(arr) => Ok(arr.clone()),
            Series::Categorical(arr, cats) => arr
                .iter()
                .map(|&code| {
                    cats.get(code as usize)
                        .cloned()
                        .ok_or(DataError::IndexOutOfBounds {
                            index: code as usize,
                            len: cats.len(),
                        })
                })
                .collect(),
            Series::Float(_) => Err(DataError::NonNumericData("float64 used as a category")),
        }
    }

    /// Multiply every value by `factor`, producing a float series
    pub fn scaled(&self, factor: f64) -> Result<Series> {
        Ok(Series::Float(self.to_float_array()? * factor))
    }

    /// Compute mean of numeric series
    pub fn mean(&self) -> Result<f64> {
        let arr = self.to_float_array()?;
        arr.mean().ok_or(DataError::InvalidParameter(
            "mean of an empty series".to_string(),
        ))
    }
}

/// Enum for type-safe value access
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    String(String),
}

impl SeriesValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SeriesValue::Float(v) => Some(*v),
            SeriesValue::Int(v) => Some(*v as f64),
            SeriesValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            SeriesValue::String(_) => None,
        }
    }
}
