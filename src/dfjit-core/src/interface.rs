//! Builder API over a processing graph
//!
//! An [`Interface`] is a handle to one node of a graph. Transformations
//! return a new interface for the node they add; actions return a
//! [`ResultHandle`] that runs the event loop on first access.
//!
//! ```no_run
//! use dfjit_core::DataFrameBuilder;
//! use polars::prelude::*;
//!
//! # fn main() -> dfjit_core::Result<()> {
//! let df = df!("x" => [1.0, 2.0, 3.0], "y" => [3.0, 2.0, 1.0])?;
//! let root = DataFrameBuilder::from_dataframe(df).slots(2).build()?;
//! let selected = root.filter("x + y > 3.5 && x > 1", "cut")?;
//! let total = selected.define("z", "x * y")?.sum("z")?;
//! assert_eq!(*total.get()?, 7.0);
//! # Ok(())
//! # }
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use dfjit_shared::{ColumnType, Value};
use polars::prelude::DataFrame;

use crate::actions::{Count, Max, Mean, Min, Sum};
use crate::columns::{
    check_custom_column, find_undefined_ds_columns, get_validated_column_names, ColumnCatalog,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::graph::{
    upcast_define, upcast_filter, upcast_range, upcast_root, ActionImpl, CustomColumn, DefineNode,
    FilterNode, LoopManager, NodeHandle, RangeNode, ResultHandle, ResultSlot, RootNode,
};
use crate::jit::{jit_build_and_book, Bindings, Callable, FnCallable, Jit};
use crate::source::{DataFrameDataset, DataSource, Dataset};

/// A handle to one node of a processing graph
#[derive(Clone)]
pub struct Interface {
    node: NodeHandle,
    manager: Arc<LoopManager>,
    valid_columns: Vec<String>,
}

impl Interface {
    pub(crate) fn new(node: NodeHandle, manager: Arc<LoopManager>, valid_columns: Vec<String>) -> Self {
        Self {
            node,
            manager,
            valid_columns,
        }
    }

    /// Generatable type name of this interface (`Interface<FilterNode_3>`)
    pub fn type_name(&self) -> String {
        format!("Interface<{}>", self.node.type_name())
    }

    /// The node this interface is attached to
    pub fn node(&self) -> &NodeHandle {
        &self.node
    }

    /// The manager owning the graph
    pub fn manager(&self) -> &Arc<LoopManager> {
        &self.manager
    }

    /// Custom columns visible from this node, in definition order
    pub fn defined_columns(&self) -> &[String] {
        &self.valid_columns
    }

    /// Every column name visible from this node
    pub fn column_names(&self) -> Vec<String> {
        self.catalog().all_names()
    }

    /// Names and declared types of the columns visible from this node
    pub fn catalog(&self) -> ColumnCatalog {
        let mut catalog = ColumnCatalog::new();
        for name in &self.valid_columns {
            if let Some(column) = self.manager.custom_column(name) {
                catalog = catalog.with_custom(name.clone(), column.column_type());
            }
        }
        if let Some(dataset) = self.manager.dataset() {
            for name in dataset.column_names() {
                let ty = dataset.column_type(&name);
                catalog = catalog.with_dataset(name, ty);
            }
        }
        if let Some(source) = self.manager.data_source() {
            for name in source.column_names() {
                let ty = source.column_type(&name);
                catalog = catalog.with_data_source(name, ty);
            }
        }
        catalog
    }

    /// Keep the entries for which `expression` is true
    ///
    /// Named filters show up in [`Interface::report`].
    pub fn filter(&self, expression: &str, name: &str) -> Result<Interface> {
        let jit = Arc::clone(self.manager.jit());
        jit.jit_transformation(self, "Filter", name, expression, "Interface<FilterBase>")
    }

    /// Add a column computed by `expression`
    pub fn define(&self, name: &str, expression: &str) -> Result<Interface> {
        check_custom_column(name, &self.catalog())?;
        let jit = Arc::clone(self.manager.jit());
        jit.jit_transformation(self, "Define", name, expression, "Interface<DefineBase>")
    }

    /// Keep the entries for which a Rust predicate over `columns` is true
    pub fn filter_fn<F>(&self, columns: &[&str], name: &str, predicate: F) -> Result<Interface>
    where
        F: Fn(&[Value]) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        let callable = FnCallable::new(columns.len(), ColumnType::Bool, move |args: &[Value]| {
            predicate(args).map(Value::Bool)
        });
        self.filter_callable(Arc::new(callable), &owned(columns), name)
    }

    /// Add a column of type `ty` computed by a Rust function of `columns`
    pub fn define_fn<F>(&self, name: &str, ty: ColumnType, columns: &[&str], f: F) -> Result<Interface>
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let callable = FnCallable::new(columns.len(), ty, f);
        self.define_callable(name, Arc::new(callable), &owned(columns))
    }

    /// Attach a filter node running `callable` on `columns`
    ///
    /// With no columns given, the callable's arity is taken from the default
    /// columns.
    pub fn filter_callable(
        &self,
        callable: Arc<dyn Callable>,
        columns: &[String],
        name: &str,
    ) -> Result<Interface> {
        let catalog = self.catalog();
        let columns = get_validated_column_names(
            self.manager.default_columns(),
            callable.arity(),
            columns,
            &catalog,
        )?;
        let valid_columns = self.define_data_source_columns(&columns, &catalog)?;

        let node = Arc::new(FilterNode::new(
            self.manager.next_node_id(),
            name,
            callable,
            columns,
            self.node.clone(),
        ));
        self.manager.register_filter(Arc::clone(&node));
        Ok(Interface::new(
            upcast_filter(node),
            Arc::clone(&self.manager),
            valid_columns,
        ))
    }

    /// Attach a derived column computed by `callable` from `columns`
    pub fn define_callable(
        &self,
        name: &str,
        callable: Arc<dyn Callable>,
        columns: &[String],
    ) -> Result<Interface> {
        let catalog = self.catalog();
        check_custom_column(name, &catalog)?;
        let columns = get_validated_column_names(
            self.manager.default_columns(),
            callable.arity(),
            columns,
            &catalog,
        )?;
        let mut valid_columns = self.define_data_source_columns(&columns, &catalog)?;

        let ty = callable.return_type();
        let column = self
            .manager
            .register_custom_column(CustomColumn::computed(name, ty, callable, columns))?;
        let node = Arc::new(DefineNode::new(
            self.manager.next_node_id(),
            column,
            self.node.clone(),
        ));
        valid_columns.push(name.to_string());
        log::debug!("defined column {} of type {}", name, ty);
        Ok(Interface::new(
            upcast_define(node),
            Arc::clone(&self.manager),
            valid_columns,
        ))
    }

    /// Keep entries `begin, begin + stride, ...` before `end` (0 for no end)
    pub fn range(&self, begin: u64, end: u64, stride: u64) -> Result<Interface> {
        if self.manager.n_slots() > 1 {
            return Err(Error::unsupported(
                "Range is not available when the event loop runs on more than one slot",
            ));
        }
        if stride == 0 || (end != 0 && end < begin) {
            return Err(Error::unsupported(
                "Range: stride must be strictly greater than 0 and end must be greater than begin",
            ));
        }
        let node = Arc::new(RangeNode::new(
            self.manager.next_node_id(),
            begin,
            end,
            stride,
            self.node.clone(),
        ));
        self.manager.register_range(Arc::clone(&node));
        Ok(Interface::new(
            upcast_range(node),
            Arc::clone(&self.manager),
            self.valid_columns.clone(),
        ))
    }

    /// Number of entries accepted by this node
    pub fn count(&self) -> Result<ResultHandle<u64>> {
        self.book::<Count>(&[])
    }

    /// Sum of a column; an empty name selects the first default column
    pub fn sum(&self, column: &str) -> Result<ResultHandle<f64>> {
        self.book::<Sum>(&single(column))
    }

    /// Mean of a column; an empty name selects the first default column
    pub fn mean(&self, column: &str) -> Result<ResultHandle<f64>> {
        self.book::<Mean>(&single(column))
    }

    /// Minimum of a column; an empty name selects the first default column
    pub fn min(&self, column: &str) -> Result<ResultHandle<f64>> {
        self.book::<Min>(&single(column))
    }

    /// Maximum of a column; an empty name selects the first default column
    pub fn max(&self, column: &str) -> Result<ResultHandle<f64>> {
        self.book::<Max>(&single(column))
    }

    /// Book an action of type `A` on `columns`
    ///
    /// The action is registered with the `Jit`'s type registry, the call
    /// booking it is generated and handed to the interpreter.
    pub fn book<A: ActionImpl>(&self, columns: &[String]) -> Result<ResultHandle<A::Result>> {
        let jit = Arc::clone(self.manager.jit());
        let types = jit.types();
        let catalog = self.catalog();
        let columns = get_validated_column_names(
            self.manager.default_columns(),
            A::N_COLUMNS,
            columns,
            &catalog,
        )?;

        types.register_action::<A>();
        let result_type = TypeId::of::<A::Result>();
        let result_type_name = types.type_name(result_type).ok_or_else(|| {
            Error::TypeResolution(
                "An error occurred while inferring the result type of an operation.".to_string(),
            )
        })?;

        let slot = Arc::new(ResultSlot::<A::Result>::new());
        let mut bindings = Bindings::new();
        let node_id = bindings.bind_node(self.node.clone(), Arc::clone(&self.manager));
        let storage: Arc<dyn Any + Send + Sync> = Arc::clone(&slot) as Arc<dyn Any + Send + Sync>;
        let result_id = bindings.bind_result(storage, result_type_name);

        let code = jit_build_and_book(
            &columns,
            &self.node.type_name(),
            node_id,
            result_type,
            TypeId::of::<A>(),
            result_id,
            self.manager.n_slots(),
            &catalog,
            types,
        )?;
        jit.process_line(&code, &bindings)?;
        self.define_data_source_columns(&columns, &catalog)?;

        Ok(ResultHandle::new(slot, Arc::clone(&self.manager)))
    }

    /// Pass/all statistics of the named filters up to this node
    ///
    /// On the root, every named filter of the graph is reported. The event
    /// loop runs first if it never ran, if actions are waiting or if a named
    /// filter was added since the last run.
    pub fn report(&self) -> Result<Report> {
        if self.manager.run_count() == 0
            || self.manager.has_pending_actions()
            || self.manager.has_uncounted_filters()
        {
            self.manager.run()?;
        }

        let filters = match &self.node {
            NodeHandle::Root(_) => self.manager.filters(),
            node => {
                let mut chain = Vec::new();
                let mut current = node.clone();
                loop {
                    let parent = match &current {
                        NodeHandle::Filter(filter) => {
                            chain.push(Arc::clone(filter));
                            filter.parent().clone()
                        }
                        NodeHandle::Define(define) => define.parent().clone(),
                        NodeHandle::Range(range) => range.parent().clone(),
                        NodeHandle::Root(_) => break,
                    };
                    current = parent;
                }
                chain.reverse();
                chain
            }
        };

        let entries = filters
            .iter()
            .filter(|filter| filter.is_named())
            .map(|filter| {
                let counts = filter.counts();
                FilterReport {
                    name: filter.name().to_string(),
                    pass: counts.pass,
                    all: counts.all,
                }
            })
            .collect();
        Ok(Report { entries })
    }

    /// Materialize the data-source columns among `columns` as custom
    /// columns; returns the custom columns visible downstream
    fn define_data_source_columns(
        &self,
        columns: &[String],
        catalog: &ColumnCatalog,
    ) -> Result<Vec<String>> {
        let mut valid_columns = self.valid_columns.clone();
        let Some(source) = self.manager.data_source() else {
            return Ok(valid_columns);
        };

        let requested: Vec<String> = columns
            .iter()
            .filter(|name| catalog.is_data_source_column(name))
            .cloned()
            .collect();
        let defined = self.manager.custom_column_names();
        let undefined = find_undefined_ds_columns(&requested, &defined);

        for (name, undefined) in requested.into_iter().zip(undefined) {
            if undefined {
                let ty = source.column_type(&name).ok_or_else(|| {
                    Error::TypeResolution(format!(
                        "The type of column {} could not be guessed. Please specify one.",
                        name
                    ))
                })?;
                self.manager
                    .register_custom_column(CustomColumn::data_source(name.clone(), ty))?;
                log::debug!("materialized data-source column {}", name);
            }
            if !valid_columns.contains(&name) {
                valid_columns.push(name);
            }
        }
        Ok(valid_columns)
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("node", &self.node)
            .field("valid_columns", &self.valid_columns)
            .finish_non_exhaustive()
    }
}

fn owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

fn single(column: &str) -> Vec<String> {
    if column.is_empty() {
        Vec::new()
    } else {
        vec![column.to_string()]
    }
}

/// Statistics of one named filter
#[derive(Debug, Clone, PartialEq)]
pub struct FilterReport {
    /// Filter name
    pub name: String,
    /// Entries that passed
    pub pass: u64,
    /// Entries that reached the filter
    pub all: u64,
}

impl FilterReport {
    /// Percentage of entries that passed
    pub fn efficiency(&self) -> f64 {
        if self.all == 0 {
            0.0
        } else {
            self.pass as f64 / self.all as f64 * 100.0
        }
    }
}

/// Statistics of a chain of named filters
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Report {
    entries: Vec<FilterReport>,
}

impl Report {
    /// Reported filters, upstream first
    pub fn entries(&self) -> &[FilterReport] {
        &self.entries
    }

    /// Statistics of the filter called `name`
    pub fn get(&self, name: &str) -> Option<&FilterReport> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first_all = self.entries.first().map_or(0, |entry| entry.all);
        for entry in &self.entries {
            let cumulative = if first_all == 0 {
                0.0
            } else {
                entry.pass as f64 / first_all as f64 * 100.0
            };
            writeln!(
                f,
                "{:<10}: pass={:<10} all={:<10} -- eff={:.2} % cumulative eff={:.2} %",
                entry.name,
                entry.pass,
                entry.all,
                entry.efficiency(),
                cumulative
            )?;
        }
        Ok(())
    }
}

/// Builds the root [`Interface`] of a new graph
#[derive(Default)]
pub struct DataFrameBuilder {
    dataset: Option<Arc<dyn Dataset>>,
    data_source: Option<Arc<dyn DataSource>>,
    entries: Option<usize>,
    default_columns: Option<Vec<String>>,
    slots: Option<usize>,
    jit: Option<Arc<Jit>>,
    config: Option<Config>,
}

impl DataFrameBuilder {
    /// A builder with nothing set
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder reading a polars `DataFrame`
    pub fn from_dataframe(df: DataFrame) -> Self {
        Self::new().dataset(DataFrameDataset::new(df))
    }

    /// Read dataset-native columns from `dataset`
    #[must_use]
    pub fn dataset(mut self, dataset: impl Dataset + 'static) -> Self {
        self.dataset = Some(Arc::new(dataset));
        self
    }

    /// Read pluggable columns from `source`
    #[must_use]
    pub fn data_source(mut self, source: impl DataSource + 'static) -> Self {
        self.data_source = Some(Arc::new(source));
        self
    }

    /// Number of entries; required when neither a dataset nor a data source is set
    #[must_use]
    pub fn entries(mut self, entries: usize) -> Self {
        self.entries = Some(entries);
        self
    }

    /// Columns used by operations that are given none
    #[must_use]
    pub fn default_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Number of parallel slots; 0 uses the rayon thread count
    #[must_use]
    pub fn slots(mut self, slots: usize) -> Self {
        self.slots = Some(slots);
        self
    }

    /// Compile expressions with `jit` instead of the shared one
    #[must_use]
    pub fn jit(mut self, jit: Arc<Jit>) -> Self {
        self.jit = Some(jit);
        self
    }

    /// Take slots, default columns and code generation settings from `config`
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Create the graph and return its root interface
    pub fn build(self) -> Result<Interface> {
        let available = match (&self.dataset, &self.data_source) {
            (Some(dataset), Some(source)) => {
                if dataset.entries() != source.entries() {
                    return Err(Error::unsupported(format!(
                        "The dataset has {} entries but the data source has {}",
                        dataset.entries(),
                        source.entries()
                    )));
                }
                Some(dataset.entries())
            }
            (Some(dataset), None) => Some(dataset.entries()),
            (None, Some(source)) => Some(source.entries()),
            (None, None) => None,
        };
        let n_entries = match (available, self.entries) {
            (Some(available), Some(requested)) if requested > available => {
                return Err(Error::unsupported(format!(
                    "{} entries were requested but only {} are available",
                    requested, available
                )));
            }
            (_, Some(requested)) => requested,
            (Some(available), None) => available,
            (None, None) => 0,
        };

        let jit = match (self.jit, &self.config) {
            (Some(jit), _) => jit,
            (None, Some(config)) => Arc::new(Jit::new(&config.jit)),
            (None, None) => Jit::shared(),
        };
        let config = self.config.unwrap_or_default();
        let n_slots = match self.slots.unwrap_or(config.execution.slots) {
            0 => rayon::current_num_threads(),
            slots => slots,
        };
        let default_columns = self
            .default_columns
            .unwrap_or(config.execution.default_columns);

        let manager = Arc::new(LoopManager::new(
            self.dataset,
            self.data_source,
            n_entries,
            n_slots,
            default_columns,
            jit,
        ));
        let root = Arc::new(RootNode::new(manager.next_node_id()));
        log::debug!("created graph: {} entries, {} slots", n_entries, n_slots);
        Ok(Interface::new(upcast_root(root), manager, Vec::new()))
    }
}
