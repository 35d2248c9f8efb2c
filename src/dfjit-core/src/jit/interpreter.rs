//! Runtime evaluation of generated code
//!
//! The [`Interpreter`] trait is the seam through which generated fragments
//! are compiled and executed. [`ExprInterpreter`] implements it for the
//! fragments this crate generates:
//!
//! ```text
//! scope __dfjit_0 { x: double; y: double; }
//! scope __dfjit_0 { res = x + y > 1; }
//! Interface<FilterBase>(this::<Interface<RootNode_0>>(0).Filter(|x: &double, y: &double| x + y > 1, ["x", "y"], "cut"))
//! build_and_book::<SumAction, double>(node::<FilterNode_3>(0), ["x"], 4, result::<double>(1))
//! ```
//!
//! Generated code never embeds addresses: objects are referred to by their
//! index in a [`Bindings`] table passed along with the fragment.

use std::any::Any;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use dfjit_parser::{parse_expression, parse_identifier, parse_string_literal, ws, Expr, ParseError};
use dfjit_shared::ColumnType;
use indexmap::IndexMap;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::{char, digit1, multispace1},
    combinator::{all_consuming, map, map_res, opt},
    multi::{many0, separated_list0},
    sequence::{delimited, preceded, terminated},
    IResult, Parser,
};

use super::callable::{type_of, Callable, CompiledExpr};
use super::registry::{BookRequest, TypeRegistry};
use crate::graph::{LoopManager, NodeHandle};
use crate::interface::Interface;

/// Compiles and executes generated code
pub trait Interpreter {
    /// Compile a declaration fragment (`scope NAME { ... }`)
    fn declare(&mut self, code: &str) -> anyhow::Result<()>;

    /// Evaluate a transformation call and return the interface it produces
    fn calc(&mut self, code: &str, bindings: &Bindings) -> anyhow::Result<Option<Interface>>;

    /// Execute an action-builder call
    fn process_line(&mut self, code: &str, bindings: &Bindings) -> anyhow::Result<()>;
}

/// An object generated code can refer to
#[derive(Clone)]
pub enum Binding {
    /// A builder interface (`this::<T>(id)`)
    Interface(Interface),
    /// A graph node and its manager (`node::<T>(id)`)
    Node {
        /// The node
        node: NodeHandle,
        /// The manager owning the node's graph
        manager: Arc<LoopManager>,
    },
    /// Result storage (`result::<T>(id)`)
    Result {
        /// A `ResultSlot` of the named type
        slot: Arc<dyn Any + Send + Sync>,
        /// Generatable name of the result type
        type_name: String,
    },
}

/// Objects bound for one generated fragment, addressed by index
#[derive(Clone, Default)]
pub struct Bindings {
    entries: Vec<Binding>,
}

impl Bindings {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn bind(&mut self, binding: Binding) -> usize {
        self.entries.push(binding);
        self.entries.len() - 1
    }

    /// Bind an interface, returning its id
    pub fn bind_interface(&mut self, interface: Interface) -> usize {
        self.bind(Binding::Interface(interface))
    }

    /// Bind a node, returning its id
    pub fn bind_node(&mut self, node: NodeHandle, manager: Arc<LoopManager>) -> usize {
        self.bind(Binding::Node { node, manager })
    }

    /// Bind result storage, returning its id
    pub fn bind_result(&mut self, slot: Arc<dyn Any + Send + Sync>, type_name: impl Into<String>) -> usize {
        self.bind(Binding::Result {
            slot,
            type_name: type_name.into(),
        })
    }

    /// The binding with the given id
    pub fn get(&self, id: usize) -> Option<&Binding> {
        self.entries.get(id)
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is bound
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

enum ScopeItem {
    Variable(String, String),
    Assignment(String, Expr),
}

struct Invocation {
    return_type: String,
    this_type: String,
    this_id: usize,
    method: String,
    name: String,
    params: Vec<(String, String)>,
    body: Expr,
    columns: Vec<String>,
}

struct BuilderCall {
    action: String,
    column_types: Vec<String>,
    node_type: String,
    node_id: usize,
    columns: Vec<String>,
    n_slots: usize,
    result_type: String,
    result_id: usize,
}

fn id(input: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse::<usize>).parse(input)
}

fn type_text(input: &str) -> IResult<&str, String> {
    map(take_while1(|c: char| !matches!(c, ';' | '}' | ',' | '|')), |t: &str| {
        t.split_whitespace().collect::<Vec<_>>().join(" ")
    })
    .parse(input)
}

fn scope_item(input: &str) -> IResult<&str, ScopeItem> {
    alt((
        map(
            (parse_identifier, ws, char(':'), ws, type_text, char(';')),
            |(name, _, _, _, ty, _)| ScopeItem::Variable(name, ty),
        ),
        map(
            (parse_identifier, ws, char('='), parse_expression, char(';')),
            |(name, _, _, expr, _)| ScopeItem::Assignment(name, expr),
        ),
    ))
    .parse(input)
}

fn scope_fragment(input: &str) -> IResult<&str, (String, Vec<ScopeItem>)> {
    map(
        (
            ws,
            tag("scope"),
            multispace1,
            parse_identifier,
            ws,
            char('{'),
            many0(preceded(ws, scope_item)),
            ws,
            char('}'),
            ws,
        ),
        |(_, _, _, name, _, _, items, _, _, _)| (name, items),
    )
    .parse(input)
}

fn column_list(input: &str) -> IResult<&str, Vec<String>> {
    delimited(
        (char('['), ws),
        separated_list0(delimited(ws, char(','), ws), parse_string_literal),
        (ws, char(']')),
    )
    .parse(input)
}

fn param(input: &str) -> IResult<&str, (String, String)> {
    map(
        (parse_identifier, ws, char(':'), ws, char('&'), ws, type_text),
        |(name, _, _, _, _, _, ty)| (name, ty),
    )
    .parse(input)
}

fn callable(input: &str) -> IResult<&str, (Vec<(String, String)>, Expr)> {
    map(
        (
            char('|'),
            ws,
            separated_list0(delimited(ws, char(','), ws), param),
            ws,
            char('|'),
            parse_expression,
        ),
        |(_, _, params, _, _, body)| (params, body),
    )
    .parse(input)
}

fn comma(input: &str) -> IResult<&str, char> {
    delimited(ws, char(','), ws).parse(input)
}

/// `Ret(this::<This>(id).Method(`
fn invocation_head(input: &str) -> IResult<&str, (String, String, usize, String)> {
    map(
        (
            ws,
            take_until("("),
            char('('),
            ws,
            tag("this::<"),
            take_until(">("),
            tag(">("),
            id,
            char(')'),
            char('.'),
            parse_identifier,
            char('('),
        ),
        |(_, ret, _, _, _, this, _, this_id, _, _, method, _)| {
            (ret.trim().to_string(), this.trim().to_string(), this_id, method)
        },
    )
    .parse(input)
}

type TransformationArgs = (String, (Vec<(String, String)>, Expr), Vec<String>);

fn define_args(input: &str) -> IResult<&str, TransformationArgs> {
    map(
        (ws, parse_string_literal, comma, callable, comma, column_list, ws),
        |(_, name, _, callable, _, columns, _)| (name, callable, columns),
    )
    .parse(input)
}

fn filter_args(input: &str) -> IResult<&str, TransformationArgs> {
    map(
        (ws, callable, comma, column_list, comma, parse_string_literal, ws),
        |(_, callable, _, columns, _, name, _)| (name, callable, columns),
    )
    .parse(input)
}

fn invocation_tail(input: &str) -> IResult<&str, ()> {
    map((char(')'), ws, char(')'), ws, opt(char(';')), ws), |_| ()).parse(input)
}

fn generic_call<'a>(
    function: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, (String, usize)> {
    move |input: &'a str| {
        map(
            (
                tag(function),
                tag("::<"),
                take_until(">("),
                tag(">("),
                delimited(ws, id, ws),
                char(')'),
            ),
            |(_, _, ty, _, id, _)| (ty.trim().to_string(), id),
        )
        .parse(input)
    }
}

fn builder_call(input: &str) -> IResult<&str, BuilderCall> {
    map(
        (
            preceded(ws, tag("build_and_book::<")),
            take_until(">("),
            tag(">("),
            preceded(ws, generic_call("node")),
            comma,
            column_list,
            comma,
            id,
            comma,
            generic_call("result"),
            terminated(preceded(ws, char(')')), (ws, opt(char(';')), ws)),
        ),
        |(_, generics, _, (node_type, node_id), _, columns, _, n_slots, _, (result_type, result_id), _)| {
            let mut generics = generics.split(',').map(|g| g.split_whitespace().collect::<Vec<_>>().join(" "));
            let action = generics.next().unwrap_or_default();
            BuilderCall {
                action,
                column_types: generics.collect(),
                node_type,
                node_id,
                columns,
                n_slots,
                result_type,
                result_id,
            }
        },
    )
    .parse(input)
}

fn syntax_error(code: &str, err: nom::Err<nom::error::Error<&str>>) -> anyhow::Error {
    anyhow!(ParseError::from_nom(code, err))
}

/// Interpreter for the fragments generated by this crate
///
/// Declared scopes are kept for the lifetime of the interpreter, the way a
/// compiler keeps the declarations it has seen.
pub struct ExprInterpreter {
    types: Arc<TypeRegistry>,
    scopes: HashMap<String, IndexMap<String, ColumnType>>,
}

impl ExprInterpreter {
    /// Create an interpreter that books actions through `types`
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        Self {
            types,
            scopes: HashMap::new(),
        }
    }

    /// Declared names of a scope
    pub fn scope(&self, name: &str) -> Option<&IndexMap<String, ColumnType>> {
        self.scopes.get(name)
    }
}

impl Interpreter for ExprInterpreter {
    fn declare(&mut self, code: &str) -> anyhow::Result<()> {
        let (_, (name, items)) = all_consuming(scope_fragment)
            .parse(code)
            .map_err(|e| syntax_error(code, e))?;

        let mut scope = self.scopes.get(&name).cloned().unwrap_or_default();
        for item in items {
            let (var, ty) = match item {
                ScopeItem::Variable(var, ty) => {
                    let ty = ColumnType::from_str(&ty)?;
                    (var, ty)
                }
                ScopeItem::Assignment(var, expr) => {
                    let ty = type_of(&expr, &|ident: &str| scope.get(ident).copied())?;
                    (var, ty)
                }
            };
            match scope.get(&var) {
                Some(existing) if *existing != ty => {
                    bail!("redefinition of '{}' with a different type: '{}' vs '{}'", var, ty, existing)
                }
                _ => {
                    scope.insert(var, ty);
                }
            }
        }
        self.scopes.insert(name, scope);
        Ok(())
    }

    fn calc(&mut self, code: &str, bindings: &Bindings) -> anyhow::Result<Option<Interface>> {
        let (rest, (return_type, this_type, this_id, method)) =
            invocation_head(code).map_err(|e| syntax_error(code, e))?;
        let base = match method.as_str() {
            "Filter" => "FilterBase",
            "Define" => "DefineBase",
            other => bail!("no member named '{}' in '{}'", other, this_type),
        };
        let args = if method == "Filter" { filter_args } else { define_args };
        let (_, ((name, (params, body), columns), _)) = all_consuming((args, invocation_tail))
            .parse(rest)
            .map_err(|e| syntax_error(code, e))?;
        let invocation = Invocation {
            return_type,
            this_type,
            this_id,
            method,
            name,
            params,
            body,
            columns,
        };

        let this = match bindings.get(invocation.this_id) {
            Some(Binding::Interface(interface)) => interface,
            _ => bail!("no interface is bound to id {}", invocation.this_id),
        };
        if this.type_name() != invocation.this_type {
            bail!("cannot convert '{}' to '{}'", this.type_name(), invocation.this_type);
        }
        let produced = format!("Interface<{}>", base);
        if produced != invocation.return_type {
            bail!("cannot convert '{}' to '{}'", produced, invocation.return_type);
        }
        if invocation.params.len() != invocation.columns.len() {
            bail!(
                "the callable takes {} arguments but {} columns were given",
                invocation.params.len(),
                invocation.columns.len()
            );
        }

        let params = invocation
            .params
            .into_iter()
            .map(|(name, ty)| Ok((name, ColumnType::from_str(&ty)?)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let compiled = CompiledExpr::compile(&invocation.body, params)?;

        let interface = if invocation.method == "Filter" {
            if !compiled.return_type().is_numeric() {
                bail!(
                    "value of type '{}' is not contextually convertible to 'bool'",
                    compiled.return_type()
                );
            }
            this.filter_callable(Arc::new(compiled), &invocation.columns, &invocation.name)?
        } else {
            this.define_callable(&invocation.name, Arc::new(compiled), &invocation.columns)?
        };
        Ok(Some(interface))
    }

    fn process_line(&mut self, code: &str, bindings: &Bindings) -> anyhow::Result<()> {
        let (_, call) = all_consuming(builder_call)
            .parse(code)
            .map_err(|e| syntax_error(code, e))?;

        let factory = self
            .types
            .action_factory(&call.action)
            .ok_or_else(|| anyhow!("unknown action type '{}'", call.action))?;
        let (node, manager) = match bindings.get(call.node_id) {
            Some(Binding::Node { node, manager }) => (node.clone(), Arc::clone(manager)),
            _ => bail!("no node is bound to id {}", call.node_id),
        };
        if node.type_name() != call.node_type {
            bail!("cannot convert '{}' to '{}'", node.type_name(), call.node_type);
        }
        let slot = match bindings.get(call.result_id) {
            Some(Binding::Result { slot, type_name }) => {
                if *type_name != call.result_type {
                    bail!("cannot convert '{}' to '{}'", type_name, call.result_type);
                }
                Arc::clone(slot)
            }
            _ => bail!("no result is bound to id {}", call.result_id),
        };
        if call.column_types.len() != call.columns.len() {
            bail!(
                "{} column types were given for {} columns",
                call.column_types.len(),
                call.columns.len()
            );
        }
        let types = call
            .column_types
            .iter()
            .map(|ty| ColumnType::from_str(ty))
            .collect::<anyhow::Result<Vec<_>>>()?;

        factory(BookRequest {
            manager: &manager,
            prev: node,
            columns: call.columns,
            types,
            n_slots: call.n_slots,
            result: slot,
        })
        .with_context(|| format!("while booking {}", call.action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn interpreter() -> ExprInterpreter {
        ExprInterpreter::new(Arc::new(TypeRegistry::new()))
    }

    #[test]
    fn test_declare_scope() {
        let mut interp = interpreter();
        interp
            .declare("scope __dfjit_0 { x: double; n: unsigned   long; }")
            .unwrap();
        interp.declare("scope __dfjit_0 { res = x * n > 2; }").unwrap();
        let scope = interp.scope("__dfjit_0").unwrap();
        assert_eq!(scope.get("n"), Some(&ColumnType::UInt64));
        assert_eq!(scope.get("res"), Some(&ColumnType::Bool));
    }

    #[test]
    fn test_declare_empty_scope() {
        let mut interp = interpreter();
        interp.declare("scope __dfjit_1 { }").unwrap();
        interp.declare("scope __dfjit_1 { res = 1 + 2; }").unwrap();
        assert_eq!(
            interp.scope("__dfjit_1").unwrap().get("res"),
            Some(&ColumnType::Int32)
        );
    }

    #[test]
    fn test_declare_rejects_bad_fragments() {
        let mut interp = interpreter();
        let err = interp
            .declare("scope __dfjit_2 { p: TLorentzVector; }")
            .unwrap_err();
        assert!(err.to_string().contains("unknown type name 'TLorentzVector'"));

        interp.declare("scope __dfjit_3 { x: int; }").unwrap();
        let err = interp.declare("scope __dfjit_3 { res = x + y; }").unwrap_err();
        assert_eq!(err.to_string(), "use of undeclared identifier 'y'");

        assert!(interp.declare("scope __dfjit_3 { res = x +; }").is_err());
        assert!(interp.declare("scope __dfjit_3 { res = x; } y").is_err());
        assert!(interp.declare("scope __dfjit_3 { x: double; }").is_err());
    }

    #[test]
    fn test_parse_invocation() {
        let code = "Interface<DefineBase>(this::<Interface<FilterNode_7>>(3).Define(\"z\", |x: &double, y: &unsigned int| max(x, y), [\"x\", \"y\"]))";
        let (rest, (ret, this, id, method)) = invocation_head(code).unwrap();
        assert_eq!(ret, "Interface<DefineBase>");
        assert_eq!(this, "Interface<FilterNode_7>");
        assert_eq!(id, 3);
        assert_eq!(method, "Define");
        let (_, ((name, (params, body), columns), _)) =
            all_consuming((define_args, invocation_tail)).parse(rest).unwrap();
        assert_eq!(name, "z");
        assert_eq!(
            params,
            vec![
                ("x".to_string(), "double".to_string()),
                ("y".to_string(), "unsigned int".to_string())
            ]
        );
        assert_eq!(body.to_string(), "max(x, y)");
        assert_eq!(columns, vec!["x", "y"]);
    }

    #[test]
    fn test_parse_filter_args_without_columns() {
        let (_, (name, (params, body), columns)) =
            filter_args("|| true, [], \"all\"").unwrap();
        assert_eq!(name, "all");
        assert!(params.is_empty());
        assert!(columns.is_empty());
        assert_eq!(body.to_string(), "true");
    }

    #[test]
    fn test_parse_builder_call() {
        let code = "build_and_book::<HistoAction, double, double>(node::<FilterNode_7>(0), [\"pt\", \"eta\"], 4, result::<TH1D>(1))";
        let (_, call) = builder_call(code).unwrap();
        assert_eq!(call.action, "HistoAction");
        assert_eq!(call.column_types, vec!["double", "double"]);
        assert_eq!(call.node_type, "FilterNode_7");
        assert_eq!(call.node_id, 0);
        assert_eq!(call.columns, vec!["pt", "eta"]);
        assert_eq!(call.n_slots, 4);
        assert_eq!(call.result_type, "TH1D");
        assert_eq!(call.result_id, 1);
    }

    #[test]
    fn test_process_line_unknown_action() {
        let mut interp = interpreter();
        let code = "build_and_book::<HistoAction, double>(node::<RootNode_0>(0), [\"pt\"], 1, result::<TH1D>(1))";
        let err = interp.process_line(code, &Bindings::new()).unwrap_err();
        assert_eq!(err.to_string(), "unknown action type 'HistoAction'");
    }

    #[test]
    fn test_calc_requires_bound_interface() {
        let mut interp = interpreter();
        let code = "Interface<FilterBase>(this::<Interface<RootNode_0>>(0).Filter(|| true, [], \"\"))";
        let err = interp.calc(code, &Bindings::new()).unwrap_err();
        assert_eq!(err.to_string(), "no interface is bound to id 0");

        let code = "Interface<FilterBase>(this::<Interface<RootNode_0>>(0).Snapshot(|| true, [], \"\"))";
        let err = interp.calc(code, &Bindings::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "no member named 'Snapshot' in 'Interface<RootNode_0>'"
        );
    }
}
