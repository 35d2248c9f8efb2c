//! Code generation for text expressions and action booking
//!
//! The [`Jit`] turns a filter predicate or a derived-column formula into
//! generated fragments and submits them to an [`Interpreter`]:
//!
//! 1. the columns the expression mentions are resolved and typed,
//! 2. a fresh scope declares one placeholder per column,
//! 3. the expression is checked inside that scope,
//! 4. a callable is synthesized and passed to the `Filter` or `Define`
//!    transformation of the bound interface.
//!
//! Nothing is added to the graph before the last step succeeds.
//! [`jit_build_and_book`] generates the call that books an action.

use std::any::TypeId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dfjit_shared::constants::{CHECK_BINDING, DEFAULT_SCOPE_PREFIX};
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::columns::{column_type_name, find_used_column_names, ColumnCatalog};
use crate::config::{Config, JitConfig};
use crate::error::{Error, Result};
use crate::interface::Interface;

mod callable;
mod interpreter;
mod registry;

pub use callable::{type_of, Builtin, Callable, CompiledExpr, FnCallable};
pub use interpreter::{Binding, Bindings, ExprInterpreter, Interpreter};
pub use registry::{ActionFactory, BookRequest, TypeRegistry};

static SHARED: Lazy<Arc<Jit>> = Lazy::new(|| {
    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("Failed to load configuration, using defaults: {}", e);
        Config::default()
    });
    Arc::new(Jit::new(&config.jit))
});

/// Bridge between text expressions and the interpreter
///
/// The interpreter is used by one request at a time. Scope names are
/// numbered by a counter owned by the `Jit`, so two `Jit`s never share
/// declarations.
pub struct Jit {
    scope_counter: AtomicUsize,
    scope_prefix: String,
    log_code: bool,
    interpreter: Mutex<Box<dyn Interpreter + Send>>,
    types: Arc<TypeRegistry>,
}

impl Jit {
    /// A `Jit` backed by an [`ExprInterpreter`] and the builtin registry
    pub fn new(config: &JitConfig) -> Self {
        let types = Arc::new(TypeRegistry::new());
        let interpreter = Box::new(ExprInterpreter::new(Arc::clone(&types)));
        Self::with_interpreter(config, types, interpreter)
    }

    /// A `Jit` backed by a custom interpreter
    pub fn with_interpreter(
        config: &JitConfig,
        types: Arc<TypeRegistry>,
        interpreter: Box<dyn Interpreter + Send>,
    ) -> Self {
        let scope_prefix = if config.scope_prefix.is_empty() {
            DEFAULT_SCOPE_PREFIX.to_string()
        } else {
            config.scope_prefix.clone()
        };
        Self {
            scope_counter: AtomicUsize::new(0),
            scope_prefix,
            log_code: config.log_generated_code,
            interpreter: Mutex::new(interpreter),
            types,
        }
    }

    /// The process-wide default `Jit`, configured from the environment
    pub fn shared() -> Arc<Jit> {
        Arc::clone(&SHARED)
    }

    /// Registry of type names and actions
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// A scope name never handed out before by this `Jit`
    pub fn next_scope(&self) -> String {
        let n = self.scope_counter.fetch_add(1, Ordering::SeqCst);
        format!("{}{}", self.scope_prefix, n)
    }

    fn log_fragment(&self, code: &str) {
        if self.log_code {
            log::info!("Generated code: {}", code);
        } else {
            log::debug!("Generated code: {}", code);
        }
    }

    fn declare(&self, step: &str, code: &str) -> Result<()> {
        self.log_fragment(code);
        self.interpreter
            .lock()
            .declare(code)
            .map_err(|e| Error::compilation(step, code, format!("{:#}", e)))
    }

    /// Add a `Filter` or a `Define` to `this` from a text expression
    ///
    /// `return_type_name` is the interface type the generated invocation
    /// declares for its result, `Interface<FilterBase>` or
    /// `Interface<DefineBase>`.
    pub fn jit_transformation(
        &self,
        this: &Interface,
        method_name: &str,
        name: &str,
        expression: &str,
        return_type_name: &str,
    ) -> Result<Interface> {
        if method_name != "Filter" && method_name != "Define" {
            return Err(Error::unsupported(format!(
                "Cannot jit the {} transformation",
                method_name
            )));
        }

        let catalog = this.catalog();
        let used = find_used_column_names(
            expression,
            &catalog.custom_names(),
            &catalog.dataset_names(),
            &catalog.data_source_names(),
        );
        let types = used
            .iter()
            .map(|column| column_type_name(column, &catalog))
            .collect::<Result<Vec<_>>>()?;

        let scope = self.next_scope();
        let declarations: String = used
            .iter()
            .zip(&types)
            .map(|(column, ty)| format!("{}: {}; ", column, ty))
            .collect();
        self.declare(
            "Cannot declare these variables",
            &format!("scope {} {{ {}}}", scope, declarations),
        )?;
        let binding = check_binding(&used);
        self.declare(
            "Cannot interpret this expression",
            &format!("scope {} {{ {} = {}; }}", scope, binding, expression),
        )?;

        let params = used
            .iter()
            .zip(&types)
            .map(|(column, ty)| format!("{}: &{}", column, ty))
            .collect::<Vec<_>>()
            .join(", ");
        let callable = format!("|{}| {}", params, expression);
        let columns = column_list(&used);
        let args = if method_name == "Filter" {
            format!("{}, {}, {}", callable, columns, quote(name))
        } else {
            format!("{}, {}, {}", quote(name), callable, columns)
        };

        let mut bindings = Bindings::new();
        let this_id = bindings.bind_interface(this.clone());
        let call = format!(
            "{}(this::<{}>({}).{}({}))",
            return_type_name,
            this.type_name(),
            this_id,
            method_name,
            args
        );
        self.log_fragment(&call);

        let step = format!("Cannot interpret the invocation to {}", method_name);
        let produced = self
            .interpreter
            .lock()
            .calc(&call, &bindings)
            .map_err(|e| match e.downcast::<Error>() {
                Ok(inner) => inner,
                Err(e) => Error::compilation(&step, &call, format!("{:#}", e)),
            })?;
        produced.ok_or_else(|| {
            Error::Evaluation(format!("{}: no interface was produced\n{}", step, call))
        })
    }

    /// Execute a generated action-builder call
    pub fn process_line(&self, code: &str, bindings: &Bindings) -> Result<()> {
        self.log_fragment(code);
        self.interpreter
            .lock()
            .process_line(code, bindings)
            .map_err(|e| match e.downcast::<Error>() {
                Ok(inner) => inner,
                Err(e) => Error::compilation("Cannot book the action", code, format!("{:#}", e)),
            })
    }
}

impl Default for Jit {
    fn default() -> Self {
        Self::new(&JitConfig::default())
    }
}

/// Name the checked expression is assigned to; never one of `columns`
fn check_binding(columns: &[String]) -> String {
    let mut binding = CHECK_BINDING.to_string();
    while columns.contains(&binding) {
        binding.insert(0, '_');
    }
    binding
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn column_list<S: AsRef<str>>(columns: &[S]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| quote(c.as_ref())).collect();
    format!("[{}]", quoted.join(", "))
}

/// Generate the call that books an action on a node
///
/// `prev_node` and `result` are the ids the node and the result storage are
/// bound under. The action and result types are looked up in `types`.
#[allow(clippy::too_many_arguments)]
pub fn jit_build_and_book(
    columns: &[String],
    prev_node_type_name: &str,
    prev_node: usize,
    result_type: TypeId,
    action_type: TypeId,
    result: usize,
    n_slots: usize,
    catalog: &ColumnCatalog,
    types: &TypeRegistry,
) -> Result<String> {
    let column_types = columns
        .iter()
        .map(|column| column_type_name(column, catalog))
        .collect::<Result<Vec<_>>>()?;
    let result_type_name = types.type_name(result_type).ok_or_else(|| {
        Error::TypeResolution(
            "An error occurred while inferring the result type of an operation.".to_string(),
        )
    })?;
    let action_type_name = types.type_name(action_type).ok_or_else(|| {
        Error::TypeResolution(
            "An error occurred while inferring the action type of the operation.".to_string(),
        )
    })?;

    let mut generics = vec![action_type_name];
    generics.extend(column_types);
    Ok(format!(
        "build_and_book::<{}>(node::<{}>({}), {}, {}, result::<{}>({}))",
        generics.join(", "),
        prev_node_type_name,
        prev_node,
        column_list(columns),
        n_slots,
        result_type_name,
        result
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfjit_shared::ColumnType;
    use pretty_assertions::assert_eq;

    struct HistoAction;
    struct Th1d;

    fn registry() -> TypeRegistry {
        let registry = TypeRegistry::empty();
        registry.register_type::<HistoAction>("HistoAction");
        registry.register_type::<Th1d>("TH1D");
        registry
    }

    fn catalog() -> ColumnCatalog {
        ColumnCatalog::new()
            .with_dataset("pt", Some(ColumnType::Float64))
            .with_dataset("eta", Some(ColumnType::Float64))
            .with_dataset("blob", None)
    }

    #[test]
    fn test_build_and_book_code() {
        let code = jit_build_and_book(
            &["pt".to_string(), "eta".to_string()],
            "FilterNode_7",
            0,
            TypeId::of::<Th1d>(),
            TypeId::of::<HistoAction>(),
            0,
            4,
            &catalog(),
            &registry(),
        )
        .unwrap();
        assert_eq!(
            code,
            "build_and_book::<HistoAction, double, double>(node::<FilterNode_7>(0), [\"pt\", \"eta\"], 4, result::<TH1D>(0))"
        );
    }

    #[test]
    fn test_build_and_book_without_columns() {
        let code = jit_build_and_book(
            &[],
            "RootNode_0",
            2,
            TypeId::of::<Th1d>(),
            TypeId::of::<HistoAction>(),
            3,
            1,
            &catalog(),
            &registry(),
        )
        .unwrap();
        assert_eq!(
            code,
            "build_and_book::<HistoAction>(node::<RootNode_0>(2), [], 1, result::<TH1D>(3))"
        );
    }

    #[test]
    fn test_build_and_book_unresolved_types() {
        let registry = registry();
        let err = jit_build_and_book(
            &[],
            "RootNode_0",
            0,
            TypeId::of::<Vec<u8>>(),
            TypeId::of::<HistoAction>(),
            1,
            1,
            &catalog(),
            &registry,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "An error occurred while inferring the result type of an operation."
        );

        let err = jit_build_and_book(
            &[],
            "RootNode_0",
            0,
            TypeId::of::<Th1d>(),
            TypeId::of::<Vec<u8>>(),
            1,
            1,
            &catalog(),
            &registry,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "An error occurred while inferring the action type of the operation."
        );

        let err = jit_build_and_book(
            &["blob".to_string()],
            "RootNode_0",
            0,
            TypeId::of::<Th1d>(),
            TypeId::of::<HistoAction>(),
            1,
            1,
            &catalog(),
            &registry,
        )
        .unwrap_err();
        assert!(matches!(err, Error::TypeResolution(_)));
    }

    #[test]
    fn test_scope_names_are_unique() {
        let jit = Jit::new(&JitConfig {
            scope_prefix: "__test_".to_string(),
            log_generated_code: false,
        });
        assert_eq!(jit.next_scope(), "__test_0");
        assert_eq!(jit.next_scope(), "__test_1");

        let jit = Jit::default();
        assert_eq!(jit.next_scope(), "__dfjit_0");
    }

    #[test]
    fn test_check_binding_avoids_columns() {
        assert_eq!(check_binding(&["x".to_string()]), "res");
        assert_eq!(
            check_binding(&["res".to_string(), "_res".to_string()]),
            "__res"
        );
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\"b\\c"), "\"a\\\"b\\\\c\"");
        assert_eq!(column_list(&["x", "y"]), "[\"x\", \"y\"]");
        assert_eq!(column_list::<&str>(&[]), "[]");
    }
}
