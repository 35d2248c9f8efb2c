//! Terminal accumulating operations
//!
//! An action keeps one partial state per execution slot. Slots fill their
//! own state independently; once every slot is done the action merges the
//! states and publishes the result through a [`ResultSlot`] shared with the
//! caller's [`ResultHandle`].

use std::fmt;
use std::sync::Arc;

use dfjit_shared::{ColumnType, Value};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::{EntryContext, LoopManager, NodeHandle};
use crate::error::{Error, Result};

/// Behavior of an action type
///
/// `new` receives the declared types of the selected columns, which is how
/// an action is specialized for the columns it is booked on.
pub trait ActionImpl: Sized + Send + Sync + 'static {
    /// Per-slot partial state
    type State: Send;
    /// Final result
    type Result: Send + Sync + 'static;

    /// Number of columns the action reads
    const N_COLUMNS: usize;
    /// Name the action is registered and generated under
    const NAME: &'static str;
    /// Generatable name of the result type
    const RESULT_TYPE: &'static str;

    /// Specialize the action for columns of the given types
    fn new(types: &[ColumnType]) -> Result<Self>;

    /// A fresh partial state
    fn initial_state(&self) -> Self::State;

    /// Fold the values of one accepted entry into a slot state
    fn exec(&self, state: &mut Self::State, values: &[Value]) -> anyhow::Result<()>;

    /// Merge the states of all slots into the result
    fn finalize(&self, states: Vec<Self::State>) -> Self::Result;
}

/// Storage for a result, shared between an action and result handles
pub struct ResultSlot<T> {
    value: OnceCell<T>,
}

impl<T> ResultSlot<T> {
    /// An empty slot
    pub fn new() -> Self {
        Self {
            value: OnceCell::new(),
        }
    }

    /// The result, once the action has been finalized
    pub fn get(&self) -> Option<&T> {
        self.value.get()
    }

    pub(crate) fn set(&self, value: T) {
        // A slot is finalized by exactly one run; later values are dropped.
        let _ = self.value.set(value);
    }
}

impl<T> Default for ResultSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for ResultSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSlot").field("value", &self.value.get()).finish()
    }
}

/// An action as seen by the event loop
pub trait BookedAction: Send + Sync {
    /// Process the current entry in the context's slot
    fn exec(&self, ctx: &mut EntryContext<'_>) -> Result<()>;

    /// Merge the slot states and publish the result
    fn finalize(&self);
}

struct Action<A: ActionImpl> {
    helper: A,
    columns: Vec<String>,
    prev: NodeHandle,
    states: Vec<Mutex<A::State>>,
    result: Arc<ResultSlot<A::Result>>,
}

impl<A: ActionImpl> BookedAction for Action<A> {
    fn exec(&self, ctx: &mut EntryContext<'_>) -> Result<()> {
        if !self.prev.check(ctx)? {
            return Ok(());
        }
        let values = ctx.columns(&self.columns)?;
        let mut state = self.states[ctx.slot()].lock();
        self.helper
            .exec(&mut state, &values)
            .map_err(|e| ctx.runtime_error(e))
    }

    fn finalize(&self) {
        let states = self
            .states
            .iter()
            .map(|state| std::mem::replace(&mut *state.lock(), self.helper.initial_state()))
            .collect();
        self.result.set(self.helper.finalize(states));
    }
}

/// Register an action of type `A` on `manager`
///
/// The action reads `columns` (whose declared types are `types`) from
/// entries accepted by `prev` and keeps `n_slots` partial states.
pub fn build_and_book<A: ActionImpl>(
    manager: &LoopManager,
    prev: NodeHandle,
    columns: Vec<String>,
    types: &[ColumnType],
    n_slots: usize,
    result: Arc<ResultSlot<A::Result>>,
) -> Result<()> {
    if columns.len() != A::N_COLUMNS || types.len() != A::N_COLUMNS {
        return Err(Error::ColumnCountMismatch {
            required: A::N_COLUMNS,
            provided: columns.len(),
            message: format!(
                "{} needs {} columns but was booked with {} columns and {} types",
                A::NAME,
                A::N_COLUMNS,
                columns.len(),
                types.len()
            ),
        });
    }
    if n_slots != manager.n_slots() {
        return Err(Error::unsupported(format!(
            "{} was booked for {} slots on a graph running {} slots",
            A::NAME,
            n_slots,
            manager.n_slots()
        )));
    }
    let helper = A::new(types)?;
    let states = (0..n_slots)
        .map(|_| Mutex::new(helper.initial_state()))
        .collect();
    log::debug!("booking {} on {} over {:?}", A::NAME, prev.type_name(), columns);
    manager.book(Arc::new(Action {
        helper,
        columns,
        prev,
        states,
        result,
    }));
    Ok(())
}

/// A lazily computed result
///
/// The first access runs the event loop if the result is not available yet.
pub struct ResultHandle<T> {
    slot: Arc<ResultSlot<T>>,
    manager: Arc<LoopManager>,
}

impl<T> ResultHandle<T> {
    pub(crate) fn new(slot: Arc<ResultSlot<T>>, manager: Arc<LoopManager>) -> Self {
        Self { slot, manager }
    }

    /// Whether the result has been computed
    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }

    /// The result, running the event loop first if needed
    pub fn get(&self) -> Result<&T> {
        if self.slot.get().is_none() {
            self.manager.run()?;
        }
        self.slot.get().ok_or_else(|| {
            Error::Evaluation("the result was not produced by the event loop".to_string())
        })
    }
}

impl<T: Clone> ResultHandle<T> {
    /// A copy of the result, running the event loop first if needed
    pub fn value(&self) -> Result<T> {
        self.get().cloned()
    }
}

impl<T: fmt::Debug> fmt::Debug for ResultHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

impl<T> Clone for ResultHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            manager: Arc::clone(&self.manager),
        }
    }
}
