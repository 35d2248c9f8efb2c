//! Identifier parsing

use nom::{
    bytes::complete::take_while,
    character::complete::satisfy,
    combinator::recognize,
    error::{Error, ErrorKind},
    IResult, Parser,
};

use super::utils::{is_ident_char, KEYWORDS};

/// Parse an identifier: `[A-Za-z_][A-Za-z0-9_]*`, excluding keywords
pub fn parse_identifier(input: &str) -> IResult<&str, String> {
    let (rest, ident) = recognize((
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))
    .parse(input)?;

    if KEYWORDS.contains(&ident) {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
    }
    Ok((rest, ident.to_string()))
}
