use thiserror::Error;

/// Errors raised while compiling or running a selector query.
///
/// Every variant surfaces synchronously to the caller of the facade
/// operation. Nothing is caught or retried internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The selector violates the extended grammar (unbalanced parameters,
    /// missing or unparsable pseudo-class arguments, empty input).
    #[error("malformed query '{selector}': {message}")]
    MalformedQuery { selector: String, message: String },

    /// A declared facade operation that has no implementation.
    #[error("operation not supported: {operation}")]
    NotSupported { operation: &'static str },

    /// The rewritten base selector was refused by the native selector engine.
    #[error("native selector engine rejected '{selector}': {message}{}", suggestion_suffix(.suggestion))]
    NativeSelectorRejected {
        selector: String,
        message: String,
        suggestion: Option<String>,
    },
}

impl QueryError {
    pub(crate) fn malformed(selector: &str, message: impl Into<String>) -> Self {
        QueryError::MalformedQuery {
            selector: selector.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn not_supported(operation: &'static str) -> Self {
        QueryError::NotSupported { operation }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, QueryError::MalformedQuery { .. })
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, QueryError::NotSupported { .. })
    }

    pub fn is_native_rejection(&self) -> bool {
        matches!(self, QueryError::NativeSelectorRejected { .. })
    }
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(" (did you mean '{name}'?)"),
        None => String::new(),
    }
}
