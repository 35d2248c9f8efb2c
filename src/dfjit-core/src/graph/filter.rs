use std::fmt;
use std::sync::Arc;

use dfjit_shared::is_truthy;
use parking_lot::Mutex;

use super::{EntryContext, NodeHandle};
use crate::error::Result;
use crate::jit::Callable;

/// Entries seen and accepted by a filter during one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterCounts {
    /// Entries that passed the filter
    pub pass: u64,
    /// Entries that reached the filter
    pub all: u64,
}

impl FilterCounts {
    /// Fraction of entries that passed, in percent
    #[allow(clippy::cast_precision_loss)]
    pub fn efficiency(&self) -> f64 {
        if self.all == 0 {
            0.0
        } else {
            self.pass as f64 / self.all as f64 * 100.0
        }
    }

    pub(crate) fn merge(&mut self, other: FilterCounts) {
        self.pass += other.pass;
        self.all += other.all;
    }
}

/// A node that drops entries for which its predicate is false
pub struct FilterNode {
    id: usize,
    name: String,
    predicate: Arc<dyn Callable>,
    columns: Vec<String>,
    parent: NodeHandle,
    counts: Mutex<FilterCounts>,
}

impl FilterNode {
    pub(crate) fn new(
        id: usize,
        name: impl Into<String>,
        predicate: Arc<dyn Callable>,
        columns: Vec<String>,
        parent: NodeHandle,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            predicate,
            columns,
            parent,
            counts: Mutex::new(FilterCounts::default()),
        }
    }

    /// Node id
    pub fn id(&self) -> usize {
        self.id
    }

    /// Filter name; empty for anonymous filters
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the filter has a name and shows up in reports
    pub fn is_named(&self) -> bool {
        !self.name.is_empty()
    }

    /// Columns passed to the predicate
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The parent node
    pub fn parent(&self) -> &NodeHandle {
        &self.parent
    }

    /// Counts of the last run
    pub fn counts(&self) -> FilterCounts {
        *self.counts.lock()
    }

    pub(crate) fn reset_counts(&self) {
        *self.counts.lock() = FilterCounts::default();
    }

    pub(crate) fn merge_counts(&self, counts: FilterCounts) {
        self.counts.lock().merge(counts);
    }

    pub(crate) fn check(&self, ctx: &mut EntryContext<'_>) -> Result<bool> {
        if let Some(pass) = ctx.decision(self.id) {
            return Ok(pass);
        }
        let pass = if self.parent.check(ctx)? {
            let args = ctx.columns(&self.columns)?;
            let value = self
                .predicate
                .call(&args)
                .map_err(|e| ctx.runtime_error(e))?;
            let pass = is_truthy(&value);
            ctx.count_filter(self.id, pass);
            pass
        } else {
            false
        };
        ctx.record_decision(self.id, pass);
        Ok(pass)
    }
}

impl fmt::Debug for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("columns", &self.columns)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}
