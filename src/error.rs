use std::fmt;

/// Errors surfaced while parsing or executing a query.
///
/// Every variant ultimately renders as an `ERROR <message>` response; the
/// distinction matters to callers that want to react to a specific failure
/// class (conversion failures during load, parse failures from the wire).
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Tokenization or grammar failure.
    Parse(String),
    /// Structurally valid but semantically invalid query.
    InvalidQuery(String),
    /// A cell could not be converted to the requested type.
    InvalidConversion(String),
    /// Invariant violation inside the engine.
    Internal(String),
}

impl QueryError {
    pub fn parse(message: impl Into<String>) -> Self {
        QueryError::Parse(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        QueryError::InvalidQuery(message.into())
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        QueryError::InvalidConversion(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        QueryError::Internal(message.into())
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Parse(msg) => write!(f, "parse error: {}", msg),
            QueryError::InvalidQuery(msg) => write!(f, "{}", msg),
            QueryError::InvalidConversion(msg) => write!(f, "invalid conversion: {}", msg),
            QueryError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for QueryError {}

impl From<std::io::Error> for QueryError {
    fn from(err: std::io::Error) -> Self {
        QueryError::Internal(format!("io error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
