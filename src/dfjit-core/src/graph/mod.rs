//! Processing graph
//!
//! A graph is a chain of nodes rooted at a [`RootNode`]. Every node holds an
//! `Arc` to its single parent, so a chain stays alive for as long as any
//! interface or booked action refers to its tail. Nodes never refer back to
//! the [`LoopManager`]; the manager owns the custom-column registry, the
//! named filters and the booked actions.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dfjit_shared::{ColumnType, Value};

use crate::error::{Error, Result};
use crate::jit::Callable;

mod action;
mod define;
mod filter;
mod loop_manager;
mod range;
mod root;

pub use action::{build_and_book, ActionImpl, BookedAction, ResultHandle, ResultSlot};
pub use define::DefineNode;
pub use filter::{FilterCounts, FilterNode};
pub use loop_manager::LoopManager;
pub use range::RangeNode;
pub use root::RootNode;

/// A handle to any graph node
///
/// The set of node kinds is closed, so dispatch is a plain `match`.
#[derive(Clone)]
pub enum NodeHandle {
    /// A filter node
    Filter(Arc<FilterNode>),
    /// A derived-column node
    Define(Arc<DefineNode>),
    /// A range node
    Range(Arc<RangeNode>),
    /// The chain root
    Root(Arc<RootNode>),
}

/// Expose a filter node through the common node handle
pub fn upcast_filter(node: Arc<FilterNode>) -> NodeHandle {
    NodeHandle::Filter(node)
}

/// Expose a derived-column node through the common node handle
pub fn upcast_define(node: Arc<DefineNode>) -> NodeHandle {
    NodeHandle::Define(node)
}

/// Expose a range node through the common node handle
pub fn upcast_range(node: Arc<RangeNode>) -> NodeHandle {
    NodeHandle::Range(node)
}

/// Expose the chain root through the common node handle
pub fn upcast_root(node: Arc<RootNode>) -> NodeHandle {
    NodeHandle::Root(node)
}

impl NodeHandle {
    /// Graph-unique node id
    pub fn id(&self) -> usize {
        match self {
            NodeHandle::Filter(n) => n.id(),
            NodeHandle::Define(n) => n.id(),
            NodeHandle::Range(n) => n.id(),
            NodeHandle::Root(n) => n.id(),
        }
    }

    /// Name of the node's concrete type, unique per node (`FilterNode_7`)
    pub fn type_name(&self) -> String {
        format!("{}_{}", self.kind(), self.id())
    }

    /// Name of the node kind (`FilterNode`)
    pub fn kind(&self) -> &'static str {
        match self {
            NodeHandle::Filter(_) => "FilterNode",
            NodeHandle::Define(_) => "DefineNode",
            NodeHandle::Range(_) => "RangeNode",
            NodeHandle::Root(_) => "RootNode",
        }
    }

    /// Name of the common base the node is exposed through (`FilterBase`)
    pub fn base_name(&self) -> &'static str {
        match self {
            NodeHandle::Filter(_) => "FilterBase",
            NodeHandle::Define(_) => "DefineBase",
            NodeHandle::Range(_) => "RangeBase",
            NodeHandle::Root(_) => "RootBase",
        }
    }

    /// Whether the node and all of its ancestors accept the current entry
    pub fn check(&self, ctx: &mut EntryContext<'_>) -> Result<bool> {
        match self {
            NodeHandle::Filter(n) => n.check(ctx),
            NodeHandle::Define(n) => n.check(ctx),
            NodeHandle::Range(n) => n.check(ctx),
            NodeHandle::Root(_) => Ok(true),
        }
    }

    /// Whether two handles point at the same node
    pub fn ptr_eq(&self, other: &NodeHandle) -> bool {
        match (self, other) {
            (NodeHandle::Filter(a), NodeHandle::Filter(b)) => Arc::ptr_eq(a, b),
            (NodeHandle::Define(a), NodeHandle::Define(b)) => Arc::ptr_eq(a, b),
            (NodeHandle::Range(a), NodeHandle::Range(b)) => Arc::ptr_eq(a, b),
            (NodeHandle::Root(a), NodeHandle::Root(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({})", self.type_name())
    }
}

/// How a custom column obtains its value
#[derive(Clone)]
pub enum ColumnKind {
    /// Computed from other columns by a callable
    Computed {
        /// The function producing the value
        callable: Arc<dyn Callable>,
        /// Input columns, in argument order
        inputs: Vec<String>,
    },
    /// Read from the data source under the same name
    DataSource,
}

/// A column registered on a graph in addition to the dataset's own columns
#[derive(Clone)]
pub struct CustomColumn {
    name: String,
    ty: ColumnType,
    kind: ColumnKind,
}

impl CustomColumn {
    /// A column computed from `inputs`
    pub fn computed(
        name: impl Into<String>,
        ty: ColumnType,
        callable: Arc<dyn Callable>,
        inputs: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: ColumnKind::Computed { callable, inputs },
        }
    }

    /// A materialized data-source column
    pub fn data_source(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            kind: ColumnKind::DataSource,
        }
    }

    /// Column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared value type
    pub fn column_type(&self) -> ColumnType {
        self.ty
    }

    /// How the value is obtained
    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    fn evaluate(&self, ctx: &mut EntryContext<'_>) -> Result<Value> {
        let value = match &self.kind {
            ColumnKind::Computed { callable, inputs } => {
                let args = ctx.columns(inputs)?;
                callable.call(&args).map_err(|e| ctx.runtime_error(e))?
            }
            ColumnKind::DataSource => ctx.manager.read_data_source(&self.name, ctx.entry)?,
        };
        self.ty.coerce(value).map_err(|e| ctx.runtime_error(e))
    }
}

impl fmt::Debug for CustomColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomColumn")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

/// Per-slot state while the event loop processes one entry
///
/// Column values and node decisions are computed at most once per entry,
/// and filter statistics are accumulated per slot before being merged.
pub struct EntryContext<'a> {
    manager: &'a LoopManager,
    slot: usize,
    entry: usize,
    values: HashMap<String, Value>,
    decisions: HashMap<usize, bool>,
    counts: HashMap<usize, FilterCounts>,
}

impl<'a> EntryContext<'a> {
    pub(crate) fn new(manager: &'a LoopManager, slot: usize) -> Self {
        Self {
            manager,
            slot,
            entry: 0,
            values: HashMap::new(),
            decisions: HashMap::new(),
            counts: HashMap::new(),
        }
    }

    /// Start processing `entry`
    pub(crate) fn begin_entry(&mut self, entry: usize) {
        self.entry = entry;
        self.values.clear();
        self.decisions.clear();
    }

    /// Slot this context belongs to
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Entry being processed
    pub fn entry(&self) -> usize {
        self.entry
    }

    /// Value of a column at the current entry
    pub fn column(&mut self, name: &str) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }
        let value = match self.manager.custom_column(name) {
            Some(column) => column.evaluate(self)?,
            None => self.manager.read_native(name, self.entry)?,
        };
        self.values.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Values of several columns at the current entry
    pub fn columns(&mut self, names: &[String]) -> Result<Vec<Value>> {
        names.iter().map(|name| self.column(name)).collect()
    }

    pub(crate) fn decision(&self, node: usize) -> Option<bool> {
        self.decisions.get(&node).copied()
    }

    pub(crate) fn record_decision(&mut self, node: usize, pass: bool) {
        self.decisions.insert(node, pass);
    }

    pub(crate) fn count_filter(&mut self, node: usize, pass: bool) {
        let counts = self.counts.entry(node).or_default();
        counts.all += 1;
        if pass {
            counts.pass += 1;
        }
    }

    pub(crate) fn into_counts(self) -> HashMap<usize, FilterCounts> {
        self.counts
    }

    pub(crate) fn runtime_error(&self, e: anyhow::Error) -> Error {
        Error::Runtime(e.context(format!("while processing entry {}", self.entry)))
    }
}
