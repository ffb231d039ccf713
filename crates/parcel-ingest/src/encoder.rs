//! Value encoder
//!
//! Maps parsed tokens to store values. An empty token or a lone NUL byte is
//! SQL `NULL`; anything else is passed through as text. Type checking is
//! left entirely to the store.

use std::fmt;

/// The token the extracts use for "no value" besides the empty string
const NUL_TOKEN: &str = "\0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    Null,
    Text(String),
}

impl ColumnValue {
    pub fn encode(token: String) -> Self {
        if token.is_empty() || token == NUL_TOKEN {
            ColumnValue::Null
        } else {
            ColumnValue::Text(token)
        }
    }

    /// Bind form: `None` for `NULL`
    pub fn as_option(&self) -> Option<&str> {
        match self {
            ColumnValue::Null => None,
            ColumnValue::Text(s) => Some(s),
        }
    }
}

/// SQL literal form: `null` or the text in single quotes
impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => f.write_str("null"),
            ColumnValue::Text(s) => write!(f, "'{s}'"),
        }
    }
}

/// Encode a token list, keeping its order
pub fn encode_tokens(tokens: Vec<String>) -> Vec<ColumnValue> {
    tokens.into_iter().map(ColumnValue::encode).collect()
}

/// Comma-joined literal value list, e.g. `'2',null,'c'`
pub fn render_values(values: &[ColumnValue]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;

    #[test]
    fn test_null_tokens() {
        assert_eq!(ColumnValue::encode(String::new()), ColumnValue::Null);
        assert_eq!(ColumnValue::encode("\0".to_string()), ColumnValue::Null);
        assert_eq!(ColumnValue::Null.to_string(), "null");
        assert_eq!(ColumnValue::Null.as_option(), None);
    }

    #[test]
    fn test_text_tokens_are_quoted() {
        let value = ColumnValue::encode("abc".to_string());
        assert_eq!(value.to_string(), "'abc'");
        assert_eq!(value.as_option(), Some("abc"));
    }

    #[test]
    fn test_whitespace_and_nul_inside_text_are_not_null() {
        assert_eq!(ColumnValue::encode(" ".to_string()), ColumnValue::Text(" ".to_string()));
        assert_eq!(
            ColumnValue::encode("\0\0".to_string()),
            ColumnValue::Text("\0\0".to_string())
        );
    }

    #[test]
    fn test_render_from_parsed_line() {
        let values = encode_tokens(parse_line("2||c"));
        assert_eq!(render_values(&values), "'2',null,'c'");
    }

    #[test]
    fn test_quotes_removed_before_encoding() {
        let values = encode_tokens(parse_line("1|D'ANGELO|x"));
        assert_eq!(render_values(&values), "'1','DANGELO','x'");
    }
}
