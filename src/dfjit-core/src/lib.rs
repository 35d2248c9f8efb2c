//! dfjit-core: Text expressions for a lazy, slot-parallel processing graph
//!
//! This crate lets filters and derived columns of a chained processing graph
//! be written as plain text expressions. Column names mentioned by an
//! expression are resolved across three namespaces, typed, and bound to a
//! callable through generated code that an interpreter evaluates. Terminal
//! actions are booked through generated, type-specialized builder calls and
//! run over parallel execution slots.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use dfjit_core::prelude::*;
//!
//! let df = df!(
//!     "pt" => [12.0, 35.5, 7.25, 50.0],
//!     "eta" => [0.1, -1.2, 2.6, 0.4]
//! )?;
//!
//! let root = DataFrameBuilder::from_dataframe(df).slots(2).build()?;
//! let central = root.filter("abs(eta) < 2.4", "central")?;
//! let hard = central.define("pt2", "pt * pt")?.filter("pt > 20", "hard")?;
//!
//! println!("{} central, mean pt2 {}", central.count()?.value()?, hard.mean("pt2")?.value()?);
//! print!("{}", root.report()?);
//! # Ok::<(), dfjit_core::Error>(())
//! ```
//!
//! # Architecture
//!
//! - [`columns`] - Column reference resolution and column selection
//! - [`graph`] - Nodes, the loop manager, actions and result handles
//! - [`jit`] - Code generation, the interpreter and the type registry
//! - [`interface`] - The builder API
//! - [`actions`] - Builtin actions
//! - [`source`] - Dataset and data-source access
//! - [`config`] - Configuration files and environment
//! - [`error`] - Error handling and result types

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::uninlined_format_args
)]

pub use dfjit_shared::{ColumnType, Value, VERSION};

/// Builtin actions
pub mod actions;

/// Column resolution and validation
pub mod columns;

/// Configuration
pub mod config;

/// Error types and handling
pub mod error;

/// Processing graph
pub mod graph;

/// Builder API
pub mod interface;

/// Code generation and interpretation
pub mod jit;

/// Dataset and data-source access
pub mod source;

pub use crate::error::{Error, Result};

pub use actions::{Count, Max, Mean, Min, Sum};
pub use columns::{
    column_type_name, find_undefined_ds_columns, find_used_column_names,
    get_validated_column_names, ColumnCatalog,
};
pub use config::{validate_config, Config, ExecutionConfig, JitConfig};
pub use graph::{
    upcast_define, upcast_filter, upcast_range, upcast_root, ActionImpl, LoopManager, NodeHandle,
    ResultHandle,
};
pub use interface::{DataFrameBuilder, FilterReport, Interface, Report};
pub use jit::{
    jit_build_and_book, Bindings, Callable, ExprInterpreter, FnCallable, Interpreter, Jit,
    TypeRegistry,
};
pub use source::{DataFrameDataset, DataSource, Dataset, MemoryDataSource};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ActionImpl, ColumnType, Config, DataFrameBuilder, DataSource, Dataset, Error, Interface,
        MemoryDataSource, Result, ResultHandle, Value,
    };

    pub use polars::df;
    pub use polars::prelude::DataFrame;
}
