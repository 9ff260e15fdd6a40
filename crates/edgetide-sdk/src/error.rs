//! Stage-level error model.

use edgetide_el::ElError;
use edgetide_types::FieldError;

/// Errors returned by stage lifecycle and processing calls.
///
/// A stage that wants to fail a single record instead of the whole call
/// routes it through [`StageContext::to_error`](crate::StageContext::to_error)
/// and returns `Ok`.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Invalid or missing stage configuration; aborts pipeline start.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Expression evaluation failure.
    #[error(transparent)]
    El(#[from] ElError),

    /// Record field access failure.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// A record was emitted onto a lane the stage does not declare.
    #[error("record added to undeclared output lane '{lane}'")]
    UnknownLane { lane: String },

    /// A record was emitted with no lane by a stage with no output lanes.
    #[error("stage declares no output lanes")]
    NoOutputLanes,

    /// I/O failure talking to the external system.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other stage-internal failure.
    #[error("{0}")]
    Runtime(String),
}

impl StageError {
    /// Shorthand for a configuration error with a formatted message.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
