//! Identifier tokenizer
//!
//! Column detection works on raw expression text rather than on a parsed
//! tree, so expressions the parser would reject still report the columns
//! they mention. A token is a maximal run of `[A-Za-z0-9_]` that does not
//! start with a digit. The contents of quoted string literals are skipped.

/// Iterator over the identifier tokens of an expression
#[derive(Debug, Clone)]
pub struct IdentifierTokens<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for IdentifierTokens<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() {
            let b = bytes[self.pos];
            if b == b'"' || b == b'\'' {
                self.skip_string(b);
                continue;
            }
            if !is_word_byte(b) {
                self.pos += 1;
                continue;
            }
            let start = self.pos;
            while self.pos < bytes.len() && is_word_byte(bytes[self.pos]) {
                self.pos += 1;
            }
            if !b.is_ascii_digit() {
                return Some(&self.text[start..self.pos]);
            }
        }
        None
    }
}

impl IdentifierTokens<'_> {
    fn skip_string(&mut self, quote: u8) {
        let bytes = self.text.as_bytes();
        self.pos += 1;
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'\\' => self.pos += 2,
                b if b == quote => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Iterate the identifier tokens of `expression` in order of appearance
///
/// Tokens are not deduplicated.
pub fn identifier_tokens(expression: &str) -> IdentifierTokens<'_> {
    IdentifierTokens {
        text: expression,
        pos: 0,
    }
}

/// Whether `name` appears in `expression` as a whole identifier token
pub fn contains_token(expression: &str, name: &str) -> bool {
    identifier_tokens(expression).any(|token| token == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tokens_whole_words_only() {
        assert!(contains_token("x + 1", "x"));
        assert!(!contains_token("xx + 1", "x"));
        assert!(!contains_token("x_1 > 0", "x"));
        assert!(contains_token("(x)", "x"));
    }

    #[test]
    fn test_tokens_skip_numbers_and_strings() {
        let tokens: Vec<&str> = identifier_tokens("a*2.5e3 + b == 'a \\' b' || c").collect();
        assert_eq!(tokens, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_tokens_keep_duplicates() {
        let tokens: Vec<&str> = identifier_tokens("x*x+y").collect();
        assert_eq!(tokens, vec!["x", "x", "y"]);
    }

    #[test]
    fn test_unterminated_string_stops() {
        let tokens: Vec<&str> = identifier_tokens("a == \"b c").collect();
        assert_eq!(tokens, vec!["a"]);
    }
}
