use thiserror::Error;

/// Everything that can go wrong between source text and a result value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TallyError {
    #[error("Syntax error: {message} at offset {offset}")]
    ParseError { message: String, offset: usize },

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("No matching method: {0}")]
    NoMatchingMethod(String),

    #[error("Void value: {0}")]
    VoidValue(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl TallyError {
    pub fn parse(message: impl Into<String>, offset: usize) -> Self {
        TallyError::ParseError {
            message: message.into(),
            offset,
        }
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;
