//! Owner of a graph and its event loop

use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use dfjit_shared::Value;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;

use super::{BookedAction, CustomColumn, EntryContext, FilterCounts, FilterNode, RangeNode};
use crate::error::{Error, Result};
use crate::jit::Jit;
use crate::source::{DataSource, Dataset};

/// Root owner of a processing graph
///
/// Holds the dataset and data source, the registry of custom columns, the
/// filters that take part in reports and the actions waiting for the next
/// run.
pub struct LoopManager {
    dataset: Option<Arc<dyn Dataset>>,
    data_source: Option<Arc<dyn DataSource>>,
    n_entries: usize,
    n_slots: usize,
    default_columns: Vec<String>,
    jit: Arc<Jit>,
    custom_columns: RwLock<IndexMap<String, Arc<CustomColumn>>>,
    filters: Mutex<Vec<Arc<FilterNode>>>,
    ranges: Mutex<Vec<Arc<RangeNode>>>,
    actions: Mutex<Vec<Arc<dyn BookedAction>>>,
    next_id: AtomicUsize,
    runs: AtomicUsize,
    filters_changed: AtomicBool,
}

/// Split `n_entries` into `n_slots` contiguous ranges of near-equal size
pub fn slot_ranges(n_entries: usize, n_slots: usize) -> Vec<Range<usize>> {
    let n_slots = n_slots.max(1);
    let base = n_entries / n_slots;
    let extra = n_entries % n_slots;
    let mut start = 0;
    (0..n_slots)
        .map(|slot| {
            let len = base + usize::from(slot < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

impl LoopManager {
    pub(crate) fn new(
        dataset: Option<Arc<dyn Dataset>>,
        data_source: Option<Arc<dyn DataSource>>,
        n_entries: usize,
        n_slots: usize,
        default_columns: Vec<String>,
        jit: Arc<Jit>,
    ) -> Self {
        Self {
            dataset,
            data_source,
            n_entries,
            n_slots: n_slots.max(1),
            default_columns,
            jit,
            custom_columns: RwLock::new(IndexMap::new()),
            filters: Mutex::new(Vec::new()),
            ranges: Mutex::new(Vec::new()),
            actions: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
            filters_changed: AtomicBool::new(false),
        }
    }

    /// Number of parallel execution slots
    pub fn n_slots(&self) -> usize {
        self.n_slots
    }

    /// Number of entries the event loop processes
    pub fn entries(&self) -> usize {
        self.n_entries
    }

    /// Columns used when an operation is given none
    pub fn default_columns(&self) -> &[String] {
        &self.default_columns
    }

    /// The bridge used to compile expressions for this graph
    pub fn jit(&self) -> &Arc<Jit> {
        &self.jit
    }

    /// The dataset, if any
    pub fn dataset(&self) -> Option<&Arc<dyn Dataset>> {
        self.dataset.as_ref()
    }

    /// The data source, if any
    pub fn data_source(&self) -> Option<&Arc<dyn DataSource>> {
        self.data_source.as_ref()
    }

    /// Number of completed event loops
    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Whether actions are waiting for the next run
    pub fn has_pending_actions(&self) -> bool {
        !self.actions.lock().is_empty()
    }

    /// Whether a named filter was added since the last run
    pub fn has_uncounted_filters(&self) -> bool {
        self.filters_changed.load(Ordering::SeqCst)
    }

    pub(crate) fn next_node_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// A registered custom column
    pub fn custom_column(&self, name: &str) -> Option<Arc<CustomColumn>> {
        self.custom_columns.read().get(name).cloned()
    }

    /// Names of all registered custom columns, in registration order
    pub fn custom_column_names(&self) -> Vec<String> {
        self.custom_columns.read().keys().cloned().collect()
    }

    pub(crate) fn register_custom_column(&self, column: CustomColumn) -> Result<Arc<CustomColumn>> {
        let mut columns = self.custom_columns.write();
        if columns.contains_key(column.name()) {
            return Err(Error::Redefinition(column.name().to_string()));
        }
        let column = Arc::new(column);
        columns.insert(column.name().to_string(), Arc::clone(&column));
        Ok(column)
    }

    pub(crate) fn register_filter(&self, filter: Arc<FilterNode>) {
        if filter.is_named() {
            self.filters_changed.store(true, Ordering::SeqCst);
        }
        self.filters.lock().push(filter);
    }

    pub(crate) fn register_range(&self, range: Arc<RangeNode>) {
        self.ranges.lock().push(range);
    }

    /// Filters in creation order
    pub fn filters(&self) -> Vec<Arc<FilterNode>> {
        self.filters.lock().clone()
    }

    pub(crate) fn book(&self, action: Arc<dyn BookedAction>) {
        self.actions.lock().push(action);
    }

    pub(crate) fn read_native(&self, name: &str, entry: usize) -> Result<Value> {
        if let Some(dataset) = &self.dataset {
            if dataset.has_column(name) {
                return dataset.value(name, entry);
            }
        }
        self.read_data_source(name, entry)
    }

    pub(crate) fn read_data_source(&self, name: &str, entry: usize) -> Result<Value> {
        match &self.data_source {
            Some(source) => source.value(name, entry),
            None => Err(Error::UnknownColumn(vec![name.to_string()])),
        }
    }

    /// Run the event loop
    ///
    /// Entries are split into one contiguous range per slot and the slots
    /// run in parallel. Every action booked since the previous run is
    /// executed and finalized, and every named filter is checked on every
    /// entry whether or not an action depends on it. Filter statistics are
    /// reset at the start of the run and hold the counts of this run
    /// afterwards.
    pub fn run(&self) -> Result<()> {
        let actions = std::mem::take(&mut *self.actions.lock());
        self.filters_changed.store(false, Ordering::SeqCst);
        let filters = self.filters();
        let named: Vec<&Arc<FilterNode>> = filters.iter().filter(|f| f.is_named()).collect();
        for filter in &filters {
            filter.reset_counts();
        }
        for range in self.ranges.lock().iter() {
            range.reset();
        }

        let ranges = slot_ranges(self.n_entries, self.n_slots);
        log::debug!(
            "starting event loop: {} entries, {} slots, {} actions",
            self.n_entries,
            ranges.len(),
            actions.len()
        );

        let outcomes: Vec<Result<HashMap<usize, FilterCounts>>> = ranges
            .into_par_iter()
            .enumerate()
            .map(|(slot, entries)| {
                let mut ctx = EntryContext::new(self, slot);
                for entry in entries {
                    ctx.begin_entry(entry);
                    for action in &actions {
                        action.exec(&mut ctx)?;
                    }
                    for filter in &named {
                        filter.check(&mut ctx)?;
                    }
                }
                Ok(ctx.into_counts())
            })
            .collect();

        let mut merged: HashMap<usize, FilterCounts> = HashMap::new();
        for outcome in outcomes {
            for (node, counts) in outcome? {
                merged.entry(node).or_default().merge(counts);
            }
        }
        for filter in &filters {
            if let Some(counts) = merged.get(&filter.id()) {
                filter.merge_counts(*counts);
            }
        }
        for action in &actions {
            action.finalize();
        }

        self.runs.fetch_add(1, Ordering::SeqCst);
        log::debug!("event loop finished");
        Ok(())
    }
}
