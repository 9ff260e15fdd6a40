//! Typed evaluation context.

use std::collections::HashMap;

use edgetide_types::Record;
use serde_json::Value;

use crate::error::ElError;

/// Everything an expression may read during one evaluation.
///
/// All bindings are optional; function groups that require one fail with
/// a missing-context error instead of a null fault. Built with chained
/// `with_*` calls:
///
/// ```ignore
/// let ctx = ElContext::new()
///     .with_record(&record)
///     .with_parameters(&params)
///     .with_pipeline("p1", "Edge pipeline");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ElContext<'a> {
    record: Option<&'a Record>,
    constants: Option<&'a HashMap<String, Value>>,
    parameters: Option<&'a HashMap<String, Value>>,
    pipeline_id: Option<&'a str>,
    pipeline_title: Option<&'a str>,
}

impl<'a> ElContext<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a record for the `record:*` function group.
    #[must_use]
    pub fn with_record(mut self, record: &'a Record) -> Self {
        self.record = Some(record);
        self
    }

    /// Bind pipeline constants (lowest-precedence name lookups).
    #[must_use]
    pub fn with_constants(mut self, constants: &'a HashMap<String, Value>) -> Self {
        self.constants = Some(constants);
        self
    }

    /// Bind runtime parameters (override constants by name).
    #[must_use]
    pub fn with_parameters(mut self, parameters: &'a HashMap<String, Value>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Bind pipeline metadata for the `pipeline:*` function group.
    #[must_use]
    pub fn with_pipeline(mut self, id: &'a str, title: &'a str) -> Self {
        self.pipeline_id = Some(id);
        self.pipeline_title = Some(title);
        self
    }

    /// The bound record, or the contractual missing-context error.
    pub(crate) fn record(&self) -> Result<&'a Record, ElError> {
        self.record.ok_or_else(ElError::record_context)
    }

    /// Resolve a bare `${name}`: runtime parameters first, then constants.
    pub(crate) fn lookup_name(&self, name: &str) -> Option<&'a Value> {
        self.parameters
            .and_then(|p| p.get(name))
            .or_else(|| self.constants.and_then(|c| c.get(name)))
    }

    /// Resolve a runtime parameter only (for `runtime:conf`).
    pub(crate) fn parameter(&self, name: &str) -> Option<&'a Value> {
        self.parameters.and_then(|p| p.get(name))
    }

    pub(crate) fn pipeline_id(&self) -> &'a str {
        self.pipeline_id.unwrap_or("")
    }

    pub(crate) fn pipeline_title(&self) -> &'a str {
        self.pipeline_title.unwrap_or("")
    }
}
