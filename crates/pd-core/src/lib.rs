//! Core data structures for PanelDemand
//!
//! `data` holds typed columns, data frames and the store × week panel
//! container; `formula` parses and evaluates fixed-effects model formulas.

pub mod data;
pub mod formula;
