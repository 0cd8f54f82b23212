//! Formula parser for fixed-effects formulas
//!
//! Grammar:
//! - Response and regressors: `log1p(units) ~ log(price) + promo`
//! - Transforms: `log(x)`, `log1p(x)`, `I(x)`
//! - Categorical regressors: `factor(x)` or `C(x)`
//! - Absorbed fixed effects after a bar: `... | store + week`
//! - An empty regressor list is written `1`: `y ~ 1 | store`

use crate::formula::error::{FormulaError, FormulaResult};
use crate::formula::term::Transform;
use crate::formula::{Formula, Term};
use std::iter::Peekable;
use std::str::Chars;

/// Formula parser
pub struct FormulaParser<'a> {
    chars: Peekable<Chars<'a>>,
    original: String,
    position: usize,
}

impl<'a> FormulaParser<'a> {
    /// Create a new parser
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            original: input.to_string(),
            position: 0,
        }
    }

    /// Parse a formula
    pub fn parse(formula: &str) -> FormulaResult<Formula> {
        let mut parser = FormulaParser::new(formula);
        parser.parse_formula()
    }

    /// Parse the entire formula
    fn parse_formula(&mut self) -> FormulaResult<Formula> {
        self.skip_whitespace();

        if self.chars.peek().is_none() {
            return Err(FormulaError::syntax(self.position, "Empty formula"));
        }

        let response = self.parse_term()?;
        if response.is_factor() {
            return Err(FormulaError::structure(
                "the response must be numeric, not a factor",
            ));
        }

        self.expect('~')?;
        let terms = self.parse_rhs()?;

        self.skip_whitespace();
        let fixed_effects = if self.peek_char() == Some('|') {
            self.advance();
            self.parse_fixed_effects()?
        } else {
            Vec::new()
        };

        self.skip_whitespace();
        if self.chars.peek().is_some() {
            let remaining: String = self.chars.clone().collect();
            return Err(FormulaError::syntax_with_context(
                self.position,
                "Trailing characters after formula",
                format!("Unexpected: '{}'", remaining),
            ));
        }

        Ok(Formula {
            response,
            terms,
            fixed_effects,
            original: self.original.clone(),
        })
    }

    /// Parse the regressor list (between `~` and `|` or the end)
    fn parse_rhs(&mut self) -> FormulaResult<Vec<Term>> {
        self.skip_whitespace();

        if self.peek_char() == Some('1') {
            self.advance();
            self.skip_whitespace();
            return match self.peek_char() {
                None | Some('|') => Ok(Vec::new()),
                Some(c) => Err(FormulaError::syntax_with_context(
                    self.position,
                    "'1' must stand alone on the right-hand side",
                    format!("Found '{}' after it", c),
                )),
            };
        }

        let mut terms = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek_char() {
                None | Some('|') => {
                    return Err(FormulaError::syntax(
                        self.position,
                        "Expected a term on the right-hand side",
                    ));
                }
                Some('+') => {
                    return Err(FormulaError::syntax(self.position, "Expected term before '+'"));
                }
                _ => {}
            }

            terms.push(self.parse_term()?);

            self.skip_whitespace();
            if self.peek_char() == Some('+') {
                self.advance();
                continue;
            }
            break;
        }

        Ok(terms)
    }

    /// Parse the absorbed grouping variables after `|`
    fn parse_fixed_effects(&mut self) -> FormulaResult<Vec<String>> {
        let mut names = Vec::new();
        loop {
            self.skip_whitespace();
            names.push(self.parse_identifier()?);
            self.skip_whitespace();
            if self.peek_char() == Some('+') {
                self.advance();
                continue;
            }
            break;
        }
        Ok(names)
    }

    /// Parse a variable or a single-argument function call
    fn parse_term(&mut self) -> FormulaResult<Term> {
        self.skip_whitespace();
        let ident = self.parse_identifier()?;

        self.skip_whitespace();
        if self.peek_char() != Some('(') {
            return Ok(Term::variable(&ident));
        }

        self.advance();
        self.skip_whitespace();
        let arg = self.parse_identifier()?;
        self.skip_whitespace();
        match self.chars.next() {
            Some(')') => self.position += 1,
            Some(c) => {
                return Err(FormulaError::syntax(
                    self.position,
                    format!("Expected ')', found '{}'", c),
                ));
            }
            None => {
                return Err(FormulaError::syntax(
                    self.position,
                    "Unexpected end of input, expected ')'",
                ));
            }
        }

        match ident.as_str() {
            "factor" | "C" => Ok(Term::factor(&arg)),
            other => match Transform::from_function(other) {
                Some(transform) => Ok(Term::numeric(&arg, transform)),
                None => Err(FormulaError::UnknownFunction {
                    function: other.to_string(),
                }),
            },
        }
    }

    /// Parse an identifier
    fn parse_identifier(&mut self) -> FormulaResult<String> {
        let mut ident = String::new();
        let start_pos = self.position;

        // First character must be alphabetic
        match self.chars.next() {
            Some(c) if c.is_alphabetic() || c == '_' => {
                self.position += 1;
                ident.push(c);
            }
            Some(c) => {
                return Err(FormulaError::syntax(
                    start_pos,
                    format!("Identifier must start with a letter, found '{}'", c),
                ));
            }
            None => {
                return Err(FormulaError::syntax(
                    start_pos,
                    "Unexpected end of input, expected identifier",
                ));
            }
        }

        // Subsequent characters can be alphanumeric, underscore, or period
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }

        Ok(ident)
    }

    fn expect(&mut self, expected: char) -> FormulaResult<()> {
        self.skip_whitespace();

        match self.chars.next() {
            Some(c) if c == expected => {
                self.position += 1;
                Ok(())
            }
            Some(c) => Err(FormulaError::syntax(
                self.position,
                format!("Expected '{}', found '{}'", expected, c),
            )),
            None => Err(FormulaError::syntax(
                self.position,
                format!("Unexpected end of formula, expected '{}'", expected),
            )),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn advance(&mut self) {
        if self.chars.next().is_some() {
            self.position += 1;
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }
}
