//! Record/field access errors.

/// Errors produced by path-addressed record access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// The path is malformed, traverses a non-container field, or an
    /// intermediate container is absent. A present parent container with
    /// a missing leaf is NOT an error (see [`Record::get`](crate::Record::get)).
    #[error("invalid fieldPath '{0}'")]
    InvalidPath(String),

    /// Mutation attempted on a read-only record view.
    #[error("unsupported operation on read-only record")]
    Unsupported,
}
