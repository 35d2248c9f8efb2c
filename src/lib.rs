//! dfjit: text-expression filters and derived columns for a lazy,
//! slot-parallel columnar processing graph.
//!
//! The library surface lives in the workspace crates and is re-exported here.

pub use dfjit_core::*;

/// The expression language
pub use dfjit_parser as parser;

/// Types shared across the workspace
pub use dfjit_shared as shared;
