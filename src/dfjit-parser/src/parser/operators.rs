//! Operator expression parsing
//!
//! One function per precedence level, lowest first: conditional, `||`,
//! `&&`, equality, relational, additive, multiplicative, unary.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{map, opt},
    multi::many0,
    sequence::{delimited, preceded},
    IResult, Parser,
};

use crate::ast::{BinaryOperator, Expr, UnaryOperator};

use super::expressions::parse_primary;
use super::utils::{keyword, ws};

fn fold_binary(first: Expr, rest: Vec<(BinaryOperator, Expr)>) -> Expr {
    rest.into_iter().fold(first, |left, (op, right)| Expr::Binary {
        left: Box::new(left),
        op,
        right: Box::new(right),
    })
}

/// Parse conditional expressions (`cond ? a : b`, right associative)
pub(crate) fn parse_ternary(input: &str) -> IResult<&str, Expr> {
    map(
        (
            parse_or_expr,
            opt((
                delimited(ws, char('?'), ws),
                parse_ternary,
                delimited(ws, char(':'), ws),
                parse_ternary,
            )),
        ),
        |(condition, branches)| match branches {
            Some((_, then_branch, _, else_branch)) => Expr::Ternary {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            None => condition,
        },
    )
    .parse(input)
}

/// Parse logical OR expressions
pub(crate) fn parse_or_expr(input: &str) -> IResult<&str, Expr> {
    map(
        (
            parse_and_expr,
            many0(map(
                preceded(
                    delimited(ws, alt((tag("||"), keyword("or"))), ws),
                    parse_and_expr,
                ),
                |right| (BinaryOperator::Or, right),
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
    .parse(input)
}

/// Parse logical AND expressions
pub(crate) fn parse_and_expr(input: &str) -> IResult<&str, Expr> {
    map(
        (
            parse_equality_expr,
            many0(map(
                preceded(
                    delimited(ws, alt((tag("&&"), keyword("and"))), ws),
                    parse_equality_expr,
                ),
                |right| (BinaryOperator::And, right),
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
    .parse(input)
}

fn parse_equality_expr(input: &str) -> IResult<&str, Expr> {
    map(
        (
            parse_relational_expr,
            many0((
                delimited(
                    ws,
                    alt((
                        map(tag("=="), |_| BinaryOperator::Eq),
                        map(tag("!="), |_| BinaryOperator::Ne),
                    )),
                    ws,
                ),
                parse_relational_expr,
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
    .parse(input)
}

fn parse_relational_expr(input: &str) -> IResult<&str, Expr> {
    map(
        (
            parse_additive_expr,
            many0((
                delimited(
                    ws,
                    alt((
                        map(tag(">="), |_| BinaryOperator::Ge),
                        map(tag("<="), |_| BinaryOperator::Le),
                        map(tag(">"), |_| BinaryOperator::Gt),
                        map(tag("<"), |_| BinaryOperator::Lt),
                    )),
                    ws,
                ),
                parse_additive_expr,
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
    .parse(input)
}

fn parse_additive_expr(input: &str) -> IResult<&str, Expr> {
    map(
        (
            parse_multiplicative_expr,
            many0((
                delimited(
                    ws,
                    alt((
                        map(char('+'), |_| BinaryOperator::Add),
                        map(char('-'), |_| BinaryOperator::Sub),
                    )),
                    ws,
                ),
                parse_multiplicative_expr,
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
    .parse(input)
}

fn parse_multiplicative_expr(input: &str) -> IResult<&str, Expr> {
    map(
        (
            parse_unary_expr,
            many0((
                delimited(
                    ws,
                    alt((
                        map(char('*'), |_| BinaryOperator::Mul),
                        map(char('/'), |_| BinaryOperator::Div),
                        map(char('%'), |_| BinaryOperator::Rem),
                    )),
                    ws,
                ),
                parse_unary_expr,
            )),
        ),
        |(first, rest)| fold_binary(first, rest),
    )
    .parse(input)
}

/// Parse unary expressions (`-x`, `!x`, `not x`)
pub(crate) fn parse_unary_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded((char('-'), ws), parse_unary_expr), |expr| {
            Expr::Unary {
                op: UnaryOperator::Neg,
                expr: Box::new(expr),
            }
        }),
        map(
            preceded((alt((tag("!"), keyword("not"))), ws), parse_unary_expr),
            |expr| Expr::Unary {
                op: UnaryOperator::Not,
                expr: Box::new(expr),
            },
        ),
        parse_primary,
    ))
    .parse(input)
}
