//! Error types for the expression parser

use std::fmt;

/// Errors that can occur during parsing
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Unexpected token encountered
    UnexpectedToken {
        /// The unexpected token
        found: String,
        /// Position in the input
        position: usize,
    },

    /// Invalid syntax
    InvalidSyntax {
        /// Description of the syntax error
        message: String,
        /// Position in the input
        position: usize,
    },

    /// Unterminated string literal
    UnterminatedString {
        /// Position where the string starts
        position: usize,
    },

    /// Invalid number literal
    InvalidNumber {
        /// The invalid number string
        number: String,
        /// Position in the input
        position: usize,
    },

    /// Empty input
    EmptyInput,

    /// General parsing error
    General {
        /// Error message
        message: String,
    },
}

impl ParseError {
    /// Position of the error in the input, when known
    pub fn position(&self) -> Option<usize> {
        match self {
            ParseError::UnexpectedToken { position, .. }
            | ParseError::InvalidSyntax { position, .. }
            | ParseError::UnterminatedString { position }
            | ParseError::InvalidNumber { position, .. } => Some(*position),
            ParseError::EmptyInput | ParseError::General { .. } => None,
        }
    }

    /// Build an error from a nom failure on `input`, locating the offending
    /// text by the remaining input nom reports.
    pub fn from_nom(input: &str, err: nom::Err<nom::error::Error<&str>>) -> Self {
        match err {
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                let position = input.len().saturating_sub(e.input.len());
                let rest = e.input.trim_start();
                if rest.is_empty() {
                    return ParseError::InvalidSyntax {
                        message: "unexpected end of expression".to_string(),
                        position,
                    };
                }
                if rest.starts_with('"') || rest.starts_with('\'') {
                    let quote = rest.chars().next().unwrap_or('"');
                    if !rest[1..].contains(quote) {
                        return ParseError::UnterminatedString {
                            position: input.len() - rest.len(),
                        };
                    }
                }
                let found: String = rest
                    .chars()
                    .take_while(|c| !c.is_whitespace())
                    .take(16)
                    .collect();
                if rest.starts_with(|c: char| c.is_ascii_digit()) {
                    return ParseError::InvalidNumber {
                        number: found,
                        position: input.len() - rest.len(),
                    };
                }
                ParseError::UnexpectedToken {
                    found,
                    position: input.len() - rest.len(),
                }
            }
            nom::Err::Incomplete(_) => ParseError::General {
                message: "Incomplete input".to_string(),
            },
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedToken { found, position } => {
                write!(f, "Unexpected token '{}' at position {}", found, position)
            }
            ParseError::InvalidSyntax { message, position } => {
                write!(f, "Invalid syntax at position {}: {}", position, message)
            }
            ParseError::UnterminatedString { position } => {
                write!(
                    f,
                    "Unterminated string literal starting at position {}",
                    position
                )
            }
            ParseError::InvalidNumber { number, position } => {
                write!(f, "Invalid number '{}' at position {}", number, position)
            }
            ParseError::EmptyInput => write!(f, "Empty input"),
            ParseError::General { message } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for ParseError {}

/// Result type for parsing operations
pub type Result<T> = std::result::Result<T, ParseError>;
