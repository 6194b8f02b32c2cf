/// PromQL analysis for correlation
///
/// This module provides:
/// - A lexer and recursive-descent parser producing an [`ast::Expr`]
/// - Selector group extraction in pre-order
/// - Label matching against series label sets
/// - Alert threshold stripping for the metrics view

pub mod ast;
pub mod duration;
pub mod lexer;
pub mod matcher;
pub mod parser;
pub mod selectors;

use std::collections::BTreeMap;
use thiserror::Error;

pub use ast::Expr;
pub use duration::{parse_duration, PromDuration};
pub use matcher::{LabelMatcher, MatchOp, METRIC_NAME_LABEL};
pub use parser::parse;
pub use selectors::{extract_selector_groups, strip_alert_threshold, SelectorGroup};

/// Label set of a series or alert instance
pub type Labels = BTreeMap<String, String>;

/// Syntax error with the byte offset it was detected at
#[derive(Debug, Clone, PartialEq, Error)]
#[error("parse error at char {pos}: {message}")]
pub struct ParseError {
    pub pos: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(pos: usize, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }
}
