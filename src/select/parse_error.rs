use thiserror::Error;

use crate::select::SelectParser;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("ParseError: {message}\n  at [{start}:{end}] -> '{text}'")]
pub struct ParseError {
    pub message: String,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl ParseError {
    pub fn new(message: &str, pivot: usize, parser: &SelectParser) -> Self {
        Self {
            message: message.to_string(),
            text: parser.text_from_range(pivot, parser.position + 1),
            start: pivot,
            end: parser.position,
        }
    }

    /// Error over a plain text fragment, used by parsers that work on split
    /// tokens instead of a character cursor.
    pub fn in_text(message: &str, text: &str, start: usize) -> Self {
        Self {
            message: message.to_string(),
            text: text.to_string(),
            start,
            end: start + text.chars().count(),
        }
    }

    pub fn err<T>(self) -> Result<T, ParseError> {
        Err(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::select::{ParseError, SelectParser};

    #[test]
    pub fn test_parse_error_display() {
        let mut parser = SelectParser::new("id,(");
        parser.jump(3);

        let err = ParseError::new("Empty field", 3, &parser);

        assert_eq!(err.text, "(");
        assert_eq!(err.to_string(), "ParseError: Empty field\n  at [3:3] -> '('");
    }

    #[test]
    pub fn test_parse_error_in_text() {
        let err = ParseError::in_text("Unknown operator", "foo", 4);

        assert_eq!(err.start, 4);
        assert_eq!(err.end, 7);
    }
}
