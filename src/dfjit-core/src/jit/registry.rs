//! Type descriptors and action factories
//!
//! Generated code names types by their generatable names. The registry maps
//! Rust `TypeId`s to those names and keeps, for every registered action, a
//! factory that books the action once the generated builder call has been
//! interpreted.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use dfjit_shared::ColumnType;
use parking_lot::RwLock;

use crate::actions::{Count, Max, Mean, Min, Sum};
use crate::error::{Error, Result};
use crate::graph::{build_and_book, ActionImpl, LoopManager, NodeHandle, ResultSlot};

/// Everything an action factory needs to book an action
pub struct BookRequest<'a> {
    /// Manager owning the graph
    pub manager: &'a LoopManager,
    /// Node whose accepted entries the action processes
    pub prev: NodeHandle,
    /// Selected columns
    pub columns: Vec<String>,
    /// Declared types of the selected columns
    pub types: Vec<ColumnType>,
    /// Number of slot states to keep
    pub n_slots: usize,
    /// Result storage, a `ResultSlot` of the action's result type
    pub result: Arc<dyn Any + Send + Sync>,
}

/// Books one registered action type
pub type ActionFactory = Arc<dyn Fn(BookRequest<'_>) -> Result<()> + Send + Sync>;

#[derive(Default)]
struct Registrations {
    names: HashMap<TypeId, String>,
    actions: HashMap<String, ActionFactory>,
}

/// Registry of generatable type names and action factories
pub struct TypeRegistry {
    inner: RwLock<Registrations>,
}

impl TypeRegistry {
    /// A registry knowing the column value types and the builtin actions
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register_type::<bool>(ColumnType::Bool.name());
        registry.register_type::<i32>(ColumnType::Int32.name());
        registry.register_type::<i64>(ColumnType::Int64.name());
        registry.register_type::<u32>(ColumnType::UInt32.name());
        registry.register_type::<u64>(ColumnType::UInt64.name());
        registry.register_type::<f32>(ColumnType::Float32.name());
        registry.register_type::<f64>(ColumnType::Float64.name());
        registry.register_type::<String>(ColumnType::String.name());
        registry.register_action::<Count>();
        registry.register_action::<Sum>();
        registry.register_action::<Mean>();
        registry.register_action::<Min>();
        registry.register_action::<Max>();
        registry
    }

    /// A registry without any registration
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(Registrations::default()),
        }
    }

    /// Register the generatable name of `T`; the first registration wins
    pub fn register_type<T: 'static>(&self, name: &str) {
        self.inner
            .write()
            .names
            .entry(TypeId::of::<T>())
            .or_insert_with(|| name.to_string());
    }

    /// Register an action type and its result type
    pub fn register_action<A: ActionImpl>(&self) {
        self.register_type::<A::Result>(A::RESULT_TYPE);
        self.register_type::<A>(A::NAME);
        let factory: ActionFactory = Arc::new(|request: BookRequest<'_>| {
            let result = request
                .result
                .downcast::<ResultSlot<A::Result>>()
                .map_err(|_| {
                    Error::TypeResolution(format!(
                        "result storage of {} does not hold a {}",
                        A::NAME,
                        A::RESULT_TYPE
                    ))
                })?;
            build_and_book::<A>(
                request.manager,
                request.prev,
                request.columns,
                &request.types,
                request.n_slots,
                result,
            )
        });
        self.inner
            .write()
            .actions
            .entry(A::NAME.to_string())
            .or_insert(factory);
    }

    /// Generatable name registered for a type
    pub fn type_name(&self, id: TypeId) -> Option<String> {
        self.inner.read().names.get(&id).cloned()
    }

    /// Factory of the action registered under `name`
    pub fn action_factory(&self, name: &str) -> Option<ActionFactory> {
        self.inner.read().actions.get(name).cloned()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
