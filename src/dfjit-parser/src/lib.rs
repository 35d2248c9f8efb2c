//! dfjit-parser: Parser for dfjit column expressions
//!
//! This crate turns the text of a filter predicate or a derived-column
//! formula into an [`Expr`] tree using the nom parser combinator library,
//! and provides the identifier tokenizer used to find which columns an
//! expression mentions.
//!
//! # Quick Start
//!
//! ```rust
//! use dfjit_parser::{ExprParser, Expr};
//!
//! let parser = ExprParser::new();
//! let expr: Expr = parser.parse("pt > 20 && abs(eta) < 2.4")?;
//! assert_eq!(expr.identifiers(), vec!["pt", "eta"]);
//! # Ok::<(), dfjit_parser::ParseError>(())
//! ```
//!
//! # Supported Syntax
//!
//! - **Literals**: `42`, `1.5e3`, `"text"`, `'text'`, `true`, `false`
//! - **Identifiers**: `pt`, `_weight`, `jet_1`
//! - **Function calls**: `sqrt(x)`, `pow(x, 2)`, `max(a, b)`
//! - **Arithmetic**: `+`, `-`, `*`, `/`, `%`
//! - **Comparisons**: `>`, `<`, `==`, `!=`, `>=`, `<=`
//! - **Logic**: `&&`, `||`, `!` (and the keywords `and`, `or`, `not`)
//! - **Conditional**: `cond ? a : b`
//!
//! # Column tokens
//!
//! ```rust
//! use dfjit_parser::identifier_tokens;
//!
//! let tokens: Vec<&str> = identifier_tokens("max_val > 1e5 && name == \"max\"").collect();
//! assert_eq!(tokens, vec!["max_val", "name"]);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]

pub mod ast;
pub mod error;
mod parser;
pub mod tokens;
#[cfg(test)]
mod tests;

// Re-export main types
pub use ast::*;
pub use error::*;
pub use parser::*;
pub use tokens::{contains_token, identifier_tokens};

// Re-export shared types
pub use dfjit_shared::VERSION;
