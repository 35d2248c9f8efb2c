use std::sync::Arc;

use super::{CustomColumn, EntryContext, NodeHandle};
use crate::error::Result;

/// A node that makes a derived column visible downstream
///
/// The column itself lives in the manager's registry and is evaluated
/// lazily, only when something downstream reads it.
#[derive(Debug)]
pub struct DefineNode {
    id: usize,
    column: Arc<CustomColumn>,
    parent: NodeHandle,
}

impl DefineNode {
    pub(crate) fn new(id: usize, column: Arc<CustomColumn>, parent: NodeHandle) -> Self {
        Self { id, column, parent }
    }

    /// Node id
    pub fn id(&self) -> usize {
        self.id
    }

    /// The defined column
    pub fn column(&self) -> &CustomColumn {
        &self.column
    }

    /// The parent node
    pub fn parent(&self) -> &NodeHandle {
        &self.parent
    }

    pub(crate) fn check(&self, ctx: &mut EntryContext<'_>) -> Result<bool> {
        self.parent.check(ctx)
    }
}
