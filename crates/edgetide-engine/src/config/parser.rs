//! Pipeline JSON parsing.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::types::PipelineConfiguration;

/// Parse a pipeline JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is invalid or does not match the
/// configuration schema.
pub fn parse_pipeline_str(json_str: &str) -> Result<PipelineConfiguration> {
    let config: PipelineConfiguration =
        serde_json::from_str(json_str).context("Failed to parse pipeline JSON")?;
    Ok(config)
}

/// Parse a pipeline JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is invalid.
pub fn parse_pipeline(path: &Path) -> Result<PipelineConfiguration> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;
    parse_pipeline_str(&content)
}
