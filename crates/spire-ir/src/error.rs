//! Error types for the Spire IL.

/// Errors produced while reading the ShaderLib text format.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShaderLibError {
    #[error("line {line}: expected {expected}, found '{found}'")]
    Expected {
        line: u32,
        expected: String,
        found: String,
    },

    #[error("unexpected end of input, expected {0}")]
    UnexpectedEnd(String),

    #[error("line {line}: unknown section '{name}'")]
    UnknownSection { line: u32, name: String },

    #[error("line {line}: unknown type '{name}'")]
    UnknownType { line: u32, name: String },

    #[error("line {line}: integer '{text}' is out of range")]
    IntegerOutOfRange { line: u32, text: String },

    #[error("line {line}: invalid {what} value {value}")]
    InvalidValue {
        line: u32,
        what: &'static str,
        value: i64,
    },

    #[error("line {line}: unterminated text block")]
    UnterminatedText { line: u32 },
}
