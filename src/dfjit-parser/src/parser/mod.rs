//! Parser implementation for column expressions
//!
//! This module contains the main parser that converts expression strings
//! into AST representations using nom parser combinators.

use nom::{combinator::all_consuming, Parser};

use crate::ast::Expr;
use crate::error::{ParseError, Result};

mod expressions;
mod identifiers;
mod literals;
mod operators;
mod utils;

pub use expressions::parse_expression;
pub use identifiers::parse_identifier;
pub use literals::parse_string_literal;
pub use utils::{keyword, ws};

/// Main parser for column expressions
#[derive(Debug, Default, Clone, Copy)]
pub struct ExprParser {}

impl ExprParser {
    /// Create a new parser instance
    pub fn new() -> Self {
        Self {}
    }

    /// Parse an expression string into an AST
    pub fn parse(&self, input: &str) -> Result<Expr> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseError::EmptyInput);
        }

        match all_consuming(parse_expression).parse(input) {
            Ok((_, expr)) => Ok(expr),
            Err(e) => Err(ParseError::from_nom(input, e)),
        }
    }
}
