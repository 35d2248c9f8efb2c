//! Abstract Syntax Tree (AST) definitions for column expressions
//!
//! This module defines the AST nodes that represent the parsed structure
//! of a filter predicate or a derived-column formula.

use std::fmt;

/// Core expression types
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    Literal(Literal),

    /// Identifier (a column placeholder or a bound name)
    Identifier(String),

    /// Function call (func(args...))
    Call {
        /// Function name
        name: String,
        /// Arguments
        args: Vec<Expr>,
    },

    /// Unary operation (op expr)
    Unary {
        /// Operator
        op: UnaryOperator,
        /// Operand
        expr: Box<Expr>,
    },

    /// Binary operation (left op right)
    Binary {
        /// Left operand
        left: Box<Expr>,
        /// Operator
        op: BinaryOperator,
        /// Right operand
        right: Box<Expr>,
    },

    /// Conditional expression (condition ? then : else)
    Ternary {
        /// Condition expression
        condition: Box<Expr>,
        /// Value when the condition holds
        then_branch: Box<Expr>,
        /// Value otherwise
        else_branch: Box<Expr>,
    },

    /// Parenthesized expression
    Paren(Box<Expr>),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// Addition (+)
    Add,
    /// Subtraction (-)
    Sub,
    /// Multiplication (*)
    Mul,
    /// Division (/)
    Div,
    /// Remainder (%)
    Rem,
    /// Greater than (>)
    Gt,
    /// Less than (<)
    Lt,
    /// Equal (==)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Greater than or equal (>=)
    Ge,
    /// Less than or equal (<=)
    Le,
    /// Logical AND (&&)
    And,
    /// Logical OR (||)
    Or,
}

impl BinaryOperator {
    /// Whether the operator is one of `+ - * / %`
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Sub
                | BinaryOperator::Mul
                | BinaryOperator::Div
                | BinaryOperator::Rem
        )
    }

    /// Whether the operator is a comparison
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Gt
                | BinaryOperator::Lt
                | BinaryOperator::Eq
                | BinaryOperator::Ne
                | BinaryOperator::Ge
                | BinaryOperator::Le
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Arithmetic negation (-)
    Neg,
    /// Logical NOT (!)
    Not,
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Bool(bool),
}

impl Expr {
    /// Identifiers referenced by the expression, in order of first
    /// appearance and without duplicates. Function names are not included.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_identifiers(&mut names);
        names
    }

    fn collect_identifiers<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Identifier(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_identifiers(names);
                }
            }
            Expr::Unary { expr, .. } | Expr::Paren(expr) => expr.collect_identifiers(names),
            Expr::Binary { left, right, .. } => {
                left.collect_identifiers(names);
                right.collect_identifiers(names);
            }
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.collect_identifiers(names);
                then_branch.collect_identifiers(names);
                else_branch.collect_identifiers(names);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::Identifier(name) => write!(f, "{}", name),
            Expr::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Unary { op, expr } => write!(f, "{}{}", op, expr),
            Expr::Binary { left, op, right } => write!(f, "{} {} {}", left, op, right),
            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => write!(f, "{} ? {} : {}", condition, then_branch, else_branch),
            Expr::Paren(expr) => write!(f, "({})", expr),
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Sub => write!(f, "-"),
            BinaryOperator::Mul => write!(f, "*"),
            BinaryOperator::Div => write!(f, "/"),
            BinaryOperator::Rem => write!(f, "%"),
            BinaryOperator::Gt => write!(f, ">"),
            BinaryOperator::Lt => write!(f, "<"),
            BinaryOperator::Eq => write!(f, "=="),
            BinaryOperator::Ne => write!(f, "!="),
            BinaryOperator::Ge => write!(f, ">="),
            BinaryOperator::Le => write!(f, "<="),
            BinaryOperator::And => write!(f, "&&"),
            BinaryOperator::Or => write!(f, "||"),
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Neg => write!(f, "-"),
            UnaryOperator::Not => write!(f, "!"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(fl) => write!(f, "{:?}", fl),
            Literal::String(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Literal::Bool(b) => write!(f, "{}", b),
        }
    }
}
