//! Primary expression parsing
//!
//! Parenthesized expressions, function calls, literals and identifiers.

use nom::{
    branch::alt,
    character::complete::char,
    combinator::map,
    multi::separated_list0,
    sequence::delimited,
    IResult, Parser,
};

use crate::ast::Expr;

use super::identifiers::parse_identifier;
use super::literals::parse_literal;
use super::operators::parse_ternary;
use super::utils::ws;

/// Parse a complete expression, surrounding whitespace included
///
/// This is the entry point for embedding expressions inside larger
/// grammars, it does not require the input to be fully consumed.
pub fn parse_expression(input: &str) -> IResult<&str, Expr> {
    delimited(ws, parse_ternary, ws).parse(input)
}

pub(crate) fn parse_primary(input: &str) -> IResult<&str, Expr> {
    alt((
        parse_paren,
        parse_call,
        map(parse_literal, Expr::Literal),
        map(parse_identifier, Expr::Identifier),
    ))
    .parse(input)
}

fn parse_paren(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(char('('), parse_expression, char(')')),
        |expr| Expr::Paren(Box::new(expr)),
    )
    .parse(input)
}

fn parse_call(input: &str) -> IResult<&str, Expr> {
    map(
        (
            parse_identifier,
            ws,
            delimited(
                (char('('), ws),
                separated_list0(delimited(ws, char(','), ws), parse_expression),
                (ws, char(')')),
            ),
        ),
        |(name, _, args)| Expr::Call { name, args },
    )
    .parse(input)
}
