use std::sync::atomic::{AtomicU64, Ordering};

use super::{EntryContext, NodeHandle};
use crate::error::Result;

/// A node that keeps entries `begin, begin + stride, ...` below `end`
///
/// Entries are counted as they reach the node, so ranges only make sense
/// when a single slot processes entries in order. `end == 0` means no upper
/// bound.
#[derive(Debug)]
pub struct RangeNode {
    id: usize,
    begin: u64,
    end: u64,
    stride: u64,
    seen: AtomicU64,
    parent: NodeHandle,
}

impl RangeNode {
    pub(crate) fn new(id: usize, begin: u64, end: u64, stride: u64, parent: NodeHandle) -> Self {
        Self {
            id,
            begin,
            end,
            stride,
            seen: AtomicU64::new(0),
            parent,
        }
    }

    /// Node id
    pub fn id(&self) -> usize {
        self.id
    }

    /// `(begin, end, stride)`
    pub fn bounds(&self) -> (u64, u64, u64) {
        (self.begin, self.end, self.stride)
    }

    /// The parent node
    pub fn parent(&self) -> &NodeHandle {
        &self.parent
    }

    pub(crate) fn reset(&self) {
        self.seen.store(0, Ordering::SeqCst);
    }

    pub(crate) fn check(&self, ctx: &mut EntryContext<'_>) -> Result<bool> {
        if let Some(pass) = ctx.decision(self.id) {
            return Ok(pass);
        }
        let pass = self.parent.check(ctx)? && {
            let n = self.seen.fetch_add(1, Ordering::SeqCst);
            n >= self.begin && (self.end == 0 || n < self.end) && (n - self.begin) % self.stride == 0
        };
        ctx.record_decision(self.id, pass);
        Ok(pass)
    }
}
