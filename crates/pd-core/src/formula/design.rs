//! Design specification: the fitted expansion of regressor terms
//!
//! A `DesignSpec` is learned once from training data. It fixes the column
//! order, the transform of each numeric column and, for every factor term,
//! the full list of levels seen in training with the first (sorted) level
//! omitted as baseline. Building a matrix on new data re-applies exactly
//! that expansion, so estimation and prediction never disagree about
//! which dummy a level maps to.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::data::{DataFrame, Matrix};
use crate::formula::error::{FormulaError, FormulaResult};
use crate::formula::term::{Term, TermKind, Transform};

/// Where a design column's values come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnSource {
    /// Transformed numeric column
    Numeric { variable: String, transform: Transform },
    /// Indicator of one non-baseline factor level
    Dummy { variable: String, level: String },
}

/// One named column of the design matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignColumn {
    pub name: String,
    pub source: ColumnSource,
}

/// Row whose factor value was not seen when the design was learned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnseenLevel {
    pub row: usize,
    pub variable: String,
    pub level: String,
}

/// Design matrix built from a [`DesignSpec`]
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    /// n × p values; rows listed in `unseen` hold zeros in their dummy block
    pub matrix: Matrix,
    /// Rows with factor levels outside the learned level set
    pub unseen: Vec<UnseenLevel>,
}

/// Learned expansion of a formula's regressor terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSpec {
    columns: Vec<DesignColumn>,
    /// Factor variable → all training levels, baseline first
    factor_levels: IndexMap<String, Vec<String>>,
}

impl DesignSpec {
    /// Learn the expansion of `terms` from `df`
    pub fn learn(terms: &[Term], df: &DataFrame) -> FormulaResult<Self> {
        let mut columns = Vec::new();
        let mut factor_levels = IndexMap::new();

        for term in terms {
            match &term.kind {
                TermKind::Numeric(transform) => {
                    if !df.has_column(&term.variable) {
                        return Err(FormulaError::variable_not_found(
                            &term.variable,
                            &df.column_names(),
                        ));
                    }
                    columns.push(DesignColumn {
                        name: term.to_string(),
                        source: ColumnSource::Numeric {
                            variable: term.variable.clone(),
                            transform: *transform,
                        },
                    });
                }
                TermKind::Factor => {
                    let levels: Vec<String> = term
                        .levels(df)?
                        .into_iter()
                        .collect::<BTreeSet<_>>()
                        .into_iter()
                        .collect();

                    for level in levels.iter().skip(1) {
                        columns.push(DesignColumn {
                            name: format!("{}[{}]", term.variable, level),
                            source: ColumnSource::Dummy {
                                variable: term.variable.clone(),
                                level: level.clone(),
                            },
                        });
                    }
                    factor_levels.insert(term.variable.clone(), levels);
                }
            }
        }

        Ok(Self {
            columns,
            factor_levels,
        })
    }

    /// Design columns in order
    pub fn columns(&self) -> &[DesignColumn] {
        &self.columns
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Number of design columns
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Training levels of a factor variable, baseline first
    pub fn factor_levels(&self, variable: &str) -> Option<&[String]> {
        self.factor_levels.get(variable).map(|v| v.as_slice())
    }

    /// Omitted baseline level of a factor variable
    pub fn baseline_level(&self, variable: &str) -> Option<&str> {
        self.factor_levels
            .get(variable)
            .and_then(|levels| levels.first())
            .map(|s| s.as_str())
    }

    /// Evaluate the design on `df`
    ///
    /// Numeric domain errors are returned; unseen factor levels are listed
    /// per row so the caller decides whether to abort or skip.
    pub fn build(&self, df: &DataFrame) -> FormulaResult<DesignMatrix> {
        let n = df.nrows();
        let mut matrix = Matrix::zeros((n, self.columns.len()));
        let mut unseen = Vec::new();

        let mut labels_by_factor: IndexMap<&str, Vec<String>> = IndexMap::new();
        for (variable, levels) in &self.factor_levels {
            let known: HashSet<&str> = levels.iter().map(|l| l.as_str()).collect();
            let labels = Term::factor(variable).levels(df)?;
            for (row, label) in labels.iter().enumerate() {
                if !known.contains(label.as_str()) {
                    unseen.push(UnseenLevel {
                        row,
                        variable: variable.clone(),
                        level: label.clone(),
                    });
                }
            }
            labels_by_factor.insert(variable.as_str(), labels);
        }

        for (j, column) in self.columns.iter().enumerate() {
            match &column.source {
                ColumnSource::Numeric {
                    variable,
                    transform,
                } => {
                    let values = Term::numeric(variable, *transform).evaluate(df)?;
                    matrix.column_mut(j).assign(&values);
                }
                ColumnSource::Dummy { variable, level } => {
                    let labels = labels_by_factor
                        .get(variable.as_str())
                        .ok_or_else(|| FormulaError::structure(format!(
                            "dummy column '{}' has no factor level map",
                            column.name
                        )))?;
                    for (row, label) in labels.iter().enumerate() {
                        if label == level {
                            matrix[(row, j)] = 1.0;
                        }
                    }
                }
            }
        }

        unseen.sort_by_key(|u| u.row);
        Ok(DesignMatrix { matrix, unseen })
    }
}
