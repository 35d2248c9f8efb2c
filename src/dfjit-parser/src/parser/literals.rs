//! Literal parsing

use nom::{
    branch::alt,
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map, map_res, opt, recognize, value},
    error::{Error, ErrorKind},
    IResult, Parser,
};

use crate::ast::Literal;

use super::utils::keyword;

/// Parse any literal
pub(crate) fn parse_literal(input: &str) -> IResult<&str, Literal> {
    alt((
        parse_number,
        map(parse_string_literal, Literal::String),
        value(Literal::Bool(true), keyword("true")),
        value(Literal::Bool(false), keyword("false")),
    ))
    .parse(input)
}

/// Parse a numeric literal
///
/// Integers without a fraction or exponent become [`Literal::Int`], anything
/// else becomes [`Literal::Float`].
pub(crate) fn parse_number(input: &str) -> IResult<&str, Literal> {
    let exponent = || (one_of("eE"), opt(one_of("+-")), digit1);
    map_res(
        alt((
            recognize((digit1, opt((char('.'), digit0)), opt(exponent()))),
            recognize((char('.'), digit1, opt(exponent()))),
        )),
        |text: &str| {
            if text.contains(['.', 'e', 'E']) {
                text.parse::<f64>().map(Literal::Float).map_err(|_| ())
            } else {
                text.parse::<i64>().map(Literal::Int).map_err(|_| ())
            }
        },
    )
    .parse(input)
}

/// Parse a string literal in double or single quotes
///
/// Backslash escapes `\n`, `\t`, `\r`, `\0` are translated; any other
/// escaped character stands for itself.
pub fn parse_string_literal(input: &str) -> IResult<&str, String> {
    match input.chars().next() {
        Some(quote @ ('"' | '\'')) => quoted(input, quote),
        _ => Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    }
}

fn quoted(input: &str, quote: char) -> IResult<&str, String> {
    let mut chars = input[quote.len_utf8()..].chars();
    let mut out = String::new();
    loop {
        match chars.next() {
            None => return Err(nom::Err::Failure(Error::new(input, ErrorKind::Char))),
            Some(c) if c == quote => return Ok((chars.as_str(), out)),
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                None => return Err(nom::Err::Failure(Error::new(input, ErrorKind::Char))),
            },
            Some(c) => out.push(c),
        }
    }
}
