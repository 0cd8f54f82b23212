//! Formula parsing for log-linear fixed-effects models
//!
//! A formula names a (possibly transformed) response, a list of regressor
//! terms and, after a bar, the grouping variables whose effects are
//! absorbed: `log1p(units_a) ~ log(price_a) + log(price_b) + promo_a | store + week`.

pub use crate::formula::error::{FormulaError, FormulaResult};

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

pub mod error;
mod design;
mod parser;
mod term;


pub use design::{ColumnSource, DesignColumn, DesignMatrix, DesignSpec, UnseenLevel};
pub use parser::FormulaParser;
pub use term::{Term, TermKind, Transform};

/// A parsed fixed-effects formula
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    /// Response term (left-hand side), always numeric
    pub response: Term,

    /// Regressor terms
    pub terms: Vec<Term>,

    /// Absorbed grouping variables, in declaration order
    pub fixed_effects: Vec<String>,

    /// Original formula string
    pub original: String,
}

impl Formula {
    /// Parse a formula from a string
    pub fn parse(formula: &str) -> FormulaResult<Self> {
        let parsed = FormulaParser::parse(formula)?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Start a formula programmatically with only a response
    pub fn new(response: Term) -> Self {
        Self {
            response,
            terms: Vec::new(),
            fixed_effects: Vec::new(),
            original: String::new(),
        }
    }

    /// Add a regressor term
    pub fn with_term(mut self, term: Term) -> Self {
        self.terms.push(term);
        self
    }

    /// Absorb a grouping variable
    pub fn absorb(mut self, variable: &str) -> Self {
        self.fixed_effects.push(variable.to_string());
        self
    }

    /// Reject formulas that cannot be estimated as written
    ///
    /// Duplicate regressors, duplicate grouping variables and a grouping
    /// variable that also appears as a regressor are structural errors.
    pub fn validate(&self) -> FormulaResult<()> {
        if self.response.is_factor() {
            return Err(FormulaError::structure(
                "the response must be numeric, not a factor",
            ));
        }

        let mut seen_terms = HashSet::new();
        for term in &self.terms {
            if !seen_terms.insert(term) {
                return Err(FormulaError::structure(format!(
                    "term '{}' appears more than once",
                    term
                )));
            }
        }

        let mut seen_fe = HashSet::new();
        for fe in &self.fixed_effects {
            if !seen_fe.insert(fe.as_str()) {
                return Err(FormulaError::structure(format!(
                    "fixed effect '{}' appears more than once",
                    fe
                )));
            }
            if self.terms.iter().any(|t| &t.variable == fe) {
                return Err(FormulaError::structure(format!(
                    "'{}' is absorbed and cannot also be a regressor",
                    fe
                )));
            }
        }

        Ok(())
    }

    /// Every column the formula reads
    pub fn variables(&self) -> HashSet<&str> {
        let mut vars = HashSet::new();
        vars.insert(self.response.variable.as_str());
        for term in &self.terms {
            vars.insert(term.variable.as_str());
        }
        for fe in &self.fixed_effects {
            vars.insert(fe.as_str());
        }
        vars
    }

    /// Transform applied to the response
    pub fn response_transform(&self) -> Transform {
        self.response.transform().unwrap_or(Transform::Identity)
    }
}

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formula::parse(s)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ~ ", self.response)?;
        if self.terms.is_empty() {
            write!(f, "1")?;
        } else {
            let terms: Vec<String> = self.terms.iter().map(|t| t.to_string()).collect();
            write!(f, "{}", terms.join(" + "))?;
        }
        if !self.fixed_effects.is_empty() {
            write!(f, " | {}", self.fixed_effects.join(" + "))?;
        }
        Ok(())
    }
}
