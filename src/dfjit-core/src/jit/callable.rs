//! Callables bound to graph nodes
//!
//! Filters and derived columns call a [`Callable`] with the values of their
//! input columns. Callables are either Rust closures ([`FnCallable`]) or
//! expressions compiled against typed placeholders ([`CompiledExpr`]).

use std::fmt;

use anyhow::{anyhow, bail};
use dfjit_parser::{BinaryOperator, Expr, Literal, UnaryOperator};
use dfjit_shared::ops::{self, ArithOp, CmpOp};
use dfjit_shared::{is_truthy, ColumnType, Value};

/// A function of a fixed number of column values
pub trait Callable: Send + Sync {
    /// Number of arguments
    fn arity(&self) -> usize;

    /// Type of the returned value
    fn return_type(&self) -> ColumnType;

    /// Invoke with one value per argument
    fn call(&self, args: &[Value]) -> anyhow::Result<Value>;
}

/// A Rust closure with a declared arity and return type
pub struct FnCallable<F> {
    arity: usize,
    return_type: ColumnType,
    f: F,
}

impl<F> FnCallable<F>
where
    F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync,
{
    /// Wrap a closure
    pub fn new(arity: usize, return_type: ColumnType, f: F) -> Self {
        Self {
            arity,
            return_type,
            f,
        }
    }
}

impl<F> Callable for FnCallable<F>
where
    F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync,
{
    fn arity(&self) -> usize {
        self.arity
    }

    fn return_type(&self) -> ColumnType {
        self.return_type
    }

    fn call(&self, args: &[Value]) -> anyhow::Result<Value> {
        if args.len() != self.arity {
            bail!("expected {} arguments, got {}", self.arity, args.len());
        }
        (self.f)(args)
    }
}

/// Builtin math functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `abs(x)`
    Abs,
    /// `sqrt(x)`
    Sqrt,
    /// `exp(x)`
    Exp,
    /// `log(x)`
    Log,
    /// `log10(x)`
    Log10,
    /// `pow(x, y)`
    Pow,
    /// `sin(x)`
    Sin,
    /// `cos(x)`
    Cos,
    /// `tan(x)`
    Tan,
    /// `floor(x)`
    Floor,
    /// `ceil(x)`
    Ceil,
    /// `round(x)`
    Round,
    /// `min(a, b)`
    Min,
    /// `max(a, b)`
    Max,
}

impl Builtin {
    /// Look a builtin up by name
    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "abs" => Builtin::Abs,
            "sqrt" => Builtin::Sqrt,
            "exp" => Builtin::Exp,
            "log" => Builtin::Log,
            "log10" => Builtin::Log10,
            "pow" => Builtin::Pow,
            "sin" => Builtin::Sin,
            "cos" => Builtin::Cos,
            "tan" => Builtin::Tan,
            "floor" => Builtin::Floor,
            "ceil" => Builtin::Ceil,
            "round" => Builtin::Round,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            _ => return None,
        };
        Some(builtin)
    }

    /// Number of arguments
    pub fn arity(self) -> usize {
        match self {
            Builtin::Pow | Builtin::Min | Builtin::Max => 2,
            _ => 1,
        }
    }

    fn unary_math(self, x: f64) -> f64 {
        match self {
            Builtin::Sqrt => x.sqrt(),
            Builtin::Exp => x.exp(),
            Builtin::Log => x.ln(),
            Builtin::Log10 => x.log10(),
            Builtin::Sin => x.sin(),
            Builtin::Cos => x.cos(),
            Builtin::Tan => x.tan(),
            Builtin::Floor => x.floor(),
            Builtin::Ceil => x.ceil(),
            Builtin::Round => x.round(),
            _ => x.abs(),
        }
    }
}

#[derive(Debug, Clone)]
enum Op {
    Const(Value),
    Param(usize),
    Call(Builtin, Vec<Op>),
    Neg(Box<Op>),
    Not(Box<Op>),
    Arith(ArithOp, Box<Op>, Box<Op>),
    Cmp(CmpOp, Box<Op>, Box<Op>),
    And(Box<Op>, Box<Op>),
    Or(Box<Op>, Box<Op>),
    Cond(Box<Op>, Box<Op>, Box<Op>),
    Cast(ColumnType, Box<Op>),
}

fn cast(ty: ColumnType, op: Op) -> Op {
    Op::Cast(ty, Box::new(op))
}

fn literal_type(lit: &Literal) -> (Value, ColumnType) {
    match lit {
        Literal::Int(i) => {
            let ty = if i32::try_from(*i).is_ok() {
                ColumnType::Int32
            } else {
                ColumnType::Int64
            };
            (Value::Int(*i), ty)
        }
        Literal::Float(f) => (Value::Float(*f), ColumnType::Float64),
        Literal::String(s) => (Value::String(s.clone()), ColumnType::String),
        Literal::Bool(b) => (Value::Bool(*b), ColumnType::Bool),
    }
}

fn require_numeric(ty: ColumnType, what: &str) -> anyhow::Result<()> {
    if ty.is_numeric() {
        Ok(())
    } else {
        bail!("invalid operand of type '{}' to {}", ty, what)
    }
}

/// Lower a parsed expression into an evaluable tree and compute its type
///
/// `resolve` maps an identifier to its argument index and declared type.
fn lower(
    expr: &Expr,
    resolve: &dyn Fn(&str) -> Option<(usize, ColumnType)>,
) -> anyhow::Result<(Op, ColumnType)> {
    match expr {
        Expr::Literal(lit) => {
            let (value, ty) = literal_type(lit);
            Ok((Op::Const(value), ty))
        }
        Expr::Identifier(name) => {
            let (index, ty) =
                resolve(name).ok_or_else(|| anyhow!("use of undeclared identifier '{}'", name))?;
            Ok((Op::Param(index), ty))
        }
        Expr::Paren(inner) => lower(inner, resolve),
        Expr::Unary { op, expr } => {
            let (operand, ty) = lower(expr, resolve)?;
            match op {
                UnaryOperator::Neg => {
                    require_numeric(ty, "unary expression '-'")?;
                    let result = ty
                        .promote(ColumnType::Int32)
                        .ok_or_else(|| anyhow!("invalid operand of type '{}' to unary '-'", ty))?;
                    Ok((cast(result, Op::Neg(Box::new(operand))), result))
                }
                UnaryOperator::Not => {
                    require_numeric(ty, "unary expression '!'")?;
                    Ok((Op::Not(Box::new(operand)), ColumnType::Bool))
                }
            }
        }
        Expr::Binary { left, op, right } => {
            let (l, lty) = lower(left, resolve)?;
            let (r, rty) = lower(right, resolve)?;
            lower_binary(*op, l, lty, r, rty)
        }
        Expr::Ternary {
            condition,
            then_branch,
            else_branch,
        } => {
            let (c, cty) = lower(condition, resolve)?;
            require_numeric(cty, "conditional expression")?;
            let (t, tty) = lower(then_branch, resolve)?;
            let (e, ety) = lower(else_branch, resolve)?;
            let ty = if tty == ety {
                tty
            } else {
                tty.promote(ety).ok_or_else(|| {
                    anyhow!("incompatible operand types ('{}' and '{}')", tty, ety)
                })?
            };
            Ok((
                Op::Cond(Box::new(c), Box::new(cast(ty, t)), Box::new(cast(ty, e))),
                ty,
            ))
        }
        Expr::Call { name, args } => {
            let builtin =
                Builtin::from_name(name).ok_or_else(|| anyhow!("unknown function '{}'", name))?;
            if args.len() != builtin.arity() {
                bail!(
                    "function '{}' takes {} argument(s) but {} were given",
                    name,
                    builtin.arity(),
                    args.len()
                );
            }
            let mut lowered = Vec::with_capacity(args.len());
            let mut types = Vec::with_capacity(args.len());
            for arg in args {
                let (op, ty) = lower(arg, resolve)?;
                require_numeric(ty, &format!("function '{}'", name))?;
                lowered.push(op);
                types.push(ty);
            }
            let ty = match builtin {
                Builtin::Abs => types[0].promote(ColumnType::Int32).unwrap_or(ColumnType::Float64),
                Builtin::Min | Builtin::Max => {
                    types[0].promote(types[1]).unwrap_or(ColumnType::Float64)
                }
                Builtin::Pow => ColumnType::Float64,
                _ if types[0] == ColumnType::Float32 => ColumnType::Float32,
                _ => ColumnType::Float64,
            };
            Ok((cast(ty, Op::Call(builtin, lowered)), ty))
        }
    }
}

fn lower_binary(
    op: BinaryOperator,
    l: Op,
    lty: ColumnType,
    r: Op,
    rty: ColumnType,
) -> anyhow::Result<(Op, ColumnType)> {
    let invalid = || {
        anyhow!(
            "invalid operands to binary expression ('{}' {} '{}')",
            lty,
            op,
            rty
        )
    };
    let (l, r) = (Box::new(l), Box::new(r));
    match op {
        BinaryOperator::And | BinaryOperator::Or => {
            if !lty.is_numeric() || !rty.is_numeric() {
                return Err(invalid());
            }
            let op = if op == BinaryOperator::And {
                Op::And(l, r)
            } else {
                Op::Or(l, r)
            };
            Ok((op, ColumnType::Bool))
        }
        _ if op.is_comparison() => {
            let comparable = (lty.is_numeric() && rty.is_numeric())
                || (lty == ColumnType::String && rty == ColumnType::String);
            if !comparable {
                return Err(invalid());
            }
            let cmp = match op {
                BinaryOperator::Eq => CmpOp::Eq,
                BinaryOperator::Ne => CmpOp::Ne,
                BinaryOperator::Lt => CmpOp::Lt,
                BinaryOperator::Le => CmpOp::Le,
                BinaryOperator::Gt => CmpOp::Gt,
                _ => CmpOp::Ge,
            };
            Ok((Op::Cmp(cmp, l, r), ColumnType::Bool))
        }
        _ => {
            let ty = lty.promote(rty).ok_or_else(invalid)?;
            let arith = match op {
                BinaryOperator::Add => ArithOp::Add,
                BinaryOperator::Sub => ArithOp::Sub,
                BinaryOperator::Mul => ArithOp::Mul,
                BinaryOperator::Div => ArithOp::Div,
                _ => {
                    if !lty.is_integer() || !rty.is_integer() {
                        return Err(invalid());
                    }
                    ArithOp::Rem
                }
            };
            Ok((cast(ty, Op::Arith(arith, l, r)), ty))
        }
    }
}

/// Type of `expr` given the declared types of the identifiers it may use
pub fn type_of(
    expr: &Expr,
    lookup: &dyn Fn(&str) -> Option<ColumnType>,
) -> anyhow::Result<ColumnType> {
    lower(expr, &|name| lookup(name).map(|ty| (0, ty))).map(|(_, ty)| ty)
}

fn eval(op: &Op, args: &[Value]) -> anyhow::Result<Value> {
    match op {
        Op::Const(value) => Ok(value.clone()),
        Op::Param(index) => args
            .get(*index)
            .cloned()
            .ok_or_else(|| anyhow!("missing argument {}", index)),
        Op::Cast(ty, inner) => ty.coerce(eval(inner, args)?),
        Op::Neg(inner) => ops::negate(&eval(inner, args)?),
        Op::Not(inner) => Ok(ops::not(&eval(inner, args)?)),
        Op::Arith(op, l, r) => ops::arith(*op, &eval(l, args)?, &eval(r, args)?),
        Op::Cmp(op, l, r) => ops::compare(*op, &eval(l, args)?, &eval(r, args)?),
        Op::And(l, r) => {
            let pass = is_truthy(&eval(l, args)?) && is_truthy(&eval(r, args)?);
            Ok(Value::Bool(pass))
        }
        Op::Or(l, r) => {
            let pass = is_truthy(&eval(l, args)?) || is_truthy(&eval(r, args)?);
            Ok(Value::Bool(pass))
        }
        Op::Cond(c, t, e) => {
            if is_truthy(&eval(c, args)?) {
                eval(t, args)
            } else {
                eval(e, args)
            }
        }
        Op::Call(builtin, call_args) => {
            let values = call_args
                .iter()
                .map(|arg| eval(arg, args))
                .collect::<anyhow::Result<Vec<_>>>()?;
            if values.iter().any(Value::is_null) {
                return Ok(Value::Null);
            }
            call_builtin(*builtin, &values)
        }
    }
}

fn call_builtin(builtin: Builtin, values: &[Value]) -> anyhow::Result<Value> {
    let as_f64 = |v: &Value| {
        v.as_f64()
            .ok_or_else(|| anyhow!("expected a number, got {}", v.type_name()))
    };
    match builtin {
        Builtin::Abs => match &values[0] {
            Value::Int(i) => Ok(Value::Int(i.wrapping_abs())),
            Value::UInt(u) => Ok(Value::UInt(*u)),
            Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
            other => Ok(Value::Float(as_f64(other)?.abs())),
        },
        Builtin::Pow => Ok(Value::Float(as_f64(&values[0])?.powf(as_f64(&values[1])?))),
        Builtin::Min | Builtin::Max => {
            let ordering = ops::compare_values(&values[0], &values[1])?;
            let take_first = match builtin {
                Builtin::Min => ordering.is_le(),
                _ => ordering.is_ge(),
            };
            Ok(if take_first {
                values[0].clone()
            } else {
                values[1].clone()
            })
        }
        _ => Ok(Value::Float(builtin.unary_math(as_f64(&values[0])?))),
    }
}

/// An expression compiled against typed placeholders
#[derive(Clone)]
pub struct CompiledExpr {
    source: String,
    params: Vec<(String, ColumnType)>,
    root: Op,
    ty: ColumnType,
}

impl CompiledExpr {
    /// Type-check `expr` with one placeholder per parameter
    pub fn compile(expr: &Expr, params: Vec<(String, ColumnType)>) -> anyhow::Result<Self> {
        let resolve = |name: &str| {
            params
                .iter()
                .position(|(param, _)| param == name)
                .map(|index| (index, params[index].1))
        };
        let (root, ty) = lower(expr, &resolve)?;
        Ok(Self {
            source: expr.to_string(),
            params,
            root,
            ty,
        })
    }

    /// Parameter names and types, in argument order
    pub fn params(&self) -> &[(String, ColumnType)] {
        &self.params
    }

    /// The expression this was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Callable for CompiledExpr {
    fn arity(&self) -> usize {
        self.params.len()
    }

    fn return_type(&self) -> ColumnType {
        self.ty
    }

    fn call(&self, args: &[Value]) -> anyhow::Result<Value> {
        if args.len() != self.params.len() {
            bail!("expected {} arguments, got {}", self.params.len(), args.len());
        }
        eval(&self.root, args)
    }
}

impl fmt::Debug for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpr")
            .field("source", &self.source)
            .field("params", &self.params)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}
