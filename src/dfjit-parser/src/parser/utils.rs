//! Shared combinators for the expression parser

use nom::{
    bytes::complete::tag,
    character::complete::{multispace0, satisfy},
    combinator::not,
    sequence::terminated,
    IResult, Parser,
};

/// Words that can never be used as identifiers
pub(crate) const KEYWORDS: &[&str] = &["true", "false", "and", "or", "not"];

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parse optional whitespace
pub fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

/// Parse a keyword that is not immediately followed by an identifier character
///
/// `keyword("or")` matches `or` in `a or b` but not the prefix of `order`.
pub fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| terminated(tag(kw), not(satisfy(is_ident_char))).parse(input)
}
