//! Error types for dfjit-core

use std::io;

use thiserror::Error;

/// Result type alias for dfjit-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for graph construction and execution
#[derive(Debug, Error)]
pub enum Error {
    /// One or more selected columns exist in no namespace
    #[error("{}", unknown_columns_message(.0))]
    UnknownColumn(Vec<String>),

    /// The number of supplied or default columns does not match an operation's arity
    #[error("{message}")]
    ColumnCountMismatch {
        /// Columns the operation requires
        required: usize,
        /// Columns that were available
        provided: usize,
        /// Human readable description
        message: String,
    },

    /// A column type or a registered type descriptor could not be resolved
    #[error("{0}")]
    TypeResolution(String),

    /// The interpreter rejected a generated fragment
    #[error("{step}: {diagnostic}\n{code}")]
    Compilation {
        /// Which generation step failed
        step: String,
        /// The fragment that was submitted
        code: String,
        /// The interpreter's diagnostic
        diagnostic: String,
    },

    /// A fragment was accepted but did not produce what was expected
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// A derived column name is not a valid identifier
    #[error("Cannot define column \"{0}\": not a valid identifier")]
    InvalidColumnName(String),

    /// A derived column name already exists
    #[error("Redefinition of column \"{0}\"")]
    Redefinition(String),

    /// The operation is not available in this configuration
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Per-entry evaluation failure during the event loop
    #[error("Runtime error: {0:#}")]
    Runtime(anyhow::Error),

    /// Polars errors (dataset access)
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn unknown_columns_message(columns: &[String]) -> String {
    let noun = if columns.len() == 1 { "column" } else { "columns" };
    format!("Unknown {}: {}", noun, columns.join(","))
}

impl Error {
    /// Create a compilation error for a rejected fragment
    pub fn compilation(
        step: impl Into<String>,
        code: impl Into<String>,
        diagnostic: impl ToString,
    ) -> Self {
        Error::Compilation {
            step: step.into(),
            code: code.into(),
            diagnostic: diagnostic.to_string(),
        }
    }

    /// Create a configuration error with a custom message
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an unsupported operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedOperation(msg.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<Error>() {
            Ok(inner) => inner,
            Err(e) => Error::Runtime(e),
        }
    }
}
