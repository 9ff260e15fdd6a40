//! Evaluation error model.
//!
//! The arity and missing-context messages are part of the observable
//! contract: pipeline authors debugging expressions see them verbatim.

use edgetide_types::FieldError;

/// Message for record-scoped functions invoked without a bound record.
pub const RECORD_CONTEXT_MSG: &str = "record context is not set";

/// Errors produced by expression evaluation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ElError {
    /// A function was called with fewer arguments than it requires.
    #[error("The function '{function}' requires {required} arguments but was passed {passed}")]
    Arity {
        function: String,
        required: usize,
        passed: usize,
    },

    /// A function group requires a context binding that is absent.
    #[error("{0}")]
    MissingContext(&'static str),

    /// The expression does not match the supported grammar.
    #[error("invalid expression '{expression}' for configuration '{config_name}': {reason}")]
    Parse {
        expression: String,
        config_name: String,
        reason: String,
    },

    /// No function is registered under the given `namespace:name`.
    #[error("the function '{0}' is not defined")]
    UnknownFunction(String),

    /// Underlying field-path failure from the bound record.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Function-internal failure.
    #[error("{0}")]
    Evaluation(String),
}

impl ElError {
    /// The missing-record-context error, with its contractual message.
    #[must_use]
    pub fn record_context() -> Self {
        Self::MissingContext(RECORD_CONTEXT_MSG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_message_format_is_exact() {
        let err = ElError::Arity {
            function: "record:valueOrDefault".to_string(),
            required: 2,
            passed: 0,
        };
        assert_eq!(
            err.to_string(),
            "The function 'record:valueOrDefault' requires 2 arguments but was passed 0"
        );
    }

    #[test]
    fn record_context_message_is_exact() {
        assert_eq!(ElError::record_context().to_string(), "record context is not set");
    }

    #[test]
    fn field_error_passes_through() {
        let err: ElError = FieldError::InvalidPath("/inValid".to_string()).into();
        assert_eq!(err.to_string(), "invalid fieldPath '/inValid'");
    }
}
