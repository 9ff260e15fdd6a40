//! Built-in EL function groups.

pub mod pipeline;
pub mod record;
pub mod runtime;

use serde_json::Value;

use crate::error::ElError;

/// Extract a field-path argument (all `record:*` functions take one first).
pub(crate) fn path_arg(args: &[Value]) -> Result<&str, ElError> {
    args[0]
        .as_str()
        .ok_or_else(|| ElError::Evaluation("field path argument must be a string".to_string()))
}
