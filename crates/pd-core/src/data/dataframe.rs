//! DataFrame implementation for tabular data
//!
//! A DataFrame is a 2-dimensional labeled data structure with columns of
//! potentially different types. All transforming operations return a new
//! frame; the estimator and the simulator only ever borrow one.

use super::*;

use indexmap::IndexMap;

/// Main DataFrame structure
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataFrame {
    pub(crate) columns: IndexMap<String, Series>,
    pub(crate) nrows: usize,
}

impl DataFrame {
    /// Create an empty DataFrame
    pub fn new() -> Self {
        Self::default()
    }

    /// Create DataFrame from columns
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Series)>,
        S: Into<String>,
    {
        let mut builder = DataFrameBuilder::new();

        for (name, series) in columns.into_iter() {
            builder = builder.with_column(name, series)?;
        }

        builder.build()
    }

    /// Get the shape of the DataFrame (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.columns.len())
    }

    /// Get the number of rows
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Get the number of columns
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Get column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(|k| k.as_str()).collect()
    }

    /// Get a reference to a column
    pub fn get_column(&self, name: &str) -> Option<&Series> {
        self.columns.get(name)
    }

    /// Get a column or fail with `ColumnNotFound`
    pub fn column(&self, name: &str) -> Result<&Series> {
        self.columns
            .get(name)
            .ok_or_else(|| DataError::ColumnNotFound(name.to_string()))
    }

    /// Get a numeric column as floats
    pub fn float_column(&self, name: &str) -> Result<FloatArray> {
        self.column(name)?.to_float_array()
    }

    /// Check if column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Filter rows with a boolean mask
    pub fn filter(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.nrows {
            return Err(DataError::DimensionMismatch {
                expected: format!("mask length {}", self.nrows),
                actual: format!("mask length {}", mask.len()),
            });
        }

        let columns = self
            .columns
            .iter()
            .map(|(name, series)| Ok((name.clone(), series.filter(mask)?)))
            .collect::<Result<IndexMap<_, _>>>()?;

        Ok(Self {
            columns,
            nrows: mask.iter().filter(|&&keep| keep).count(),
        })
    }

    /// Add a new column
    pub fn with_column<S: Into<String>>(mut self, name: S, series: Series) -> Result<Self> {
        let name = name.into();

        if self.columns.contains_key(&name) {
            return Err(DataError::DuplicateColumn(name));
        }

        if !self.columns.is_empty() && series.len() != self.nrows {
            return Err(DataError::DimensionMismatch {
                expected: format!("{} rows", self.nrows),
                actual: format!("{} rows", series.len()),
            });
        }

        if self.columns.is_empty() {
            self.nrows = series.len();
        }

        self.columns.insert(name, series);
        Ok(self)
    }

    /// Replace an existing column, keeping its position
    pub fn replace_column(mut self, name: &str, series: Series) -> Result<Self> {
        if series.len() != self.nrows {
            return Err(DataError::DimensionMismatch {
                expected: format!("{} rows", self.nrows),
                actual: format!("{} rows", series.len()),
            });
        }

        match self.columns.get_mut(name) {
            Some(existing) => {
                *existing = series;
                Ok(self)
            }
            None => Err(DataError::ColumnNotFound(name.to_string())),
        }
    }

    /// Copy of the frame with each named numeric column multiplied by its factor
    ///
    /// Columns not listed are shared by value unchanged. Used to build
    /// ceteris paribus counterfactuals where only prices move.
    pub fn with_scaled_columns(&self, factors: &[(&str, f64)]) -> Result<Self> {
        let mut scaled = self.clone();
        for &(name, factor) in factors {
            let series = self.column(name)?.scaled(factor)?;
            scaled = scaled.replace_column(name, series)?;
        }
        Ok(scaled)
    }
}
