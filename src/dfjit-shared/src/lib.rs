//! dfjit-shared: Shared types and utilities for dfjit crates
//!
//! This crate contains the value model and the column type model used by
//! the expression parser, the interpreter and the processing graph.
//!
//! # Features
//!
//! - **Common Result Type**: Standardized Result type alias
//! - **Values**: The dynamically typed cell value read from columns
//! - **Column Types**: The closed set of declared column types and their names
//! - **Value Operations**: Arithmetic, comparison and logic with C-like promotion

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::uninlined_format_args
)]

/// Result type alias for value-level operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common error handling utilities
pub mod error {
    /// Create a generic operation error
    pub fn operation_error(msg: impl Into<String>) -> anyhow::Error {
        anyhow::anyhow!("Operation error: {}", msg.into())
    }
}

/// Core value type for cell data
pub mod value;

/// Declared column types
pub mod types;

/// Operations on values
pub mod ops;

pub use types::ColumnType;
pub use value::{is_truthy, Value};

/// Common constants
pub mod constants {
    /// Prefix of the scopes synthesized for text expressions
    pub const DEFAULT_SCOPE_PREFIX: &str = "__dfjit_";

    /// Name of the binding used to validate an expression on its own
    pub const CHECK_BINDING: &str = "res";
}
