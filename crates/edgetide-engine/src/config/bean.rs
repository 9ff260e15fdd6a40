//! Typed binding of pipeline-level configuration.
//!
//! Converts the ordered `{name, value}` list into a typed bean, one
//! explicit fallible conversion per field. Mistyped values are
//! configuration errors; names unknown to the bean are skipped.

use std::collections::HashMap;

use edgetide_types::ConfigValue;
use serde_json::Value;

use crate::config::types::PipelineConfiguration;
use crate::errors::PipelineError;

/// Pipeline-level settings consumed by the runner and the engine.
#[derive(Debug, Clone)]
pub struct PipelineConfigBean {
    pub should_retry: bool,
    /// −1 means unlimited retry attempts.
    pub retry_attempts: i64,
    pub delivery_guarantee: String,
    /// EL constants, resolvable as `${NAME}`.
    pub constants: HashMap<String, Value>,
    /// Status names the runner announces to external subscribers.
    pub notify_on_states: Vec<String>,
    pub rate_limit: f64,
}

impl Default for PipelineConfigBean {
    fn default() -> Self {
        Self {
            should_retry: true,
            retry_attempts: -1,
            delivery_guarantee: "AT_LEAST_ONCE".to_string(),
            constants: HashMap::new(),
            notify_on_states: vec![
                "RUN_ERROR".to_string(),
                "STOPPED".to_string(),
                "FINISHED".to_string(),
            ],
            rate_limit: 0.0,
        }
    }
}

impl PipelineConfigBean {
    /// Bind the pipeline's configuration list over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] naming the offending key
    /// when a value has the wrong type.
    pub fn from_configuration(config: &PipelineConfiguration) -> Result<Self, PipelineError> {
        let mut bean = Self::default();
        for entry in &config.configuration {
            if entry.value.is_null() {
                continue;
            }
            match entry.name.as_str() {
                "shouldRetry" => {
                    bean.should_retry = expect_bool(&entry.name, &entry.value)?;
                }
                "retryAttempts" => {
                    bean.retry_attempts = expect_number(&entry.name, &entry.value)? as i64;
                }
                "deliveryGuarantee" => {
                    bean.delivery_guarantee = expect_string(&entry.name, &entry.value)?;
                }
                "constants" => {
                    bean.constants = parse_constants(&entry.value)?;
                }
                "notifyOnStates" => {
                    bean.notify_on_states = expect_string_list(&entry.name, &entry.value)?;
                }
                "rateLimit" => {
                    bean.rate_limit = expect_number(&entry.name, &entry.value)?;
                }
                // names unknown to this bean belong to other consumers
                _ => {}
            }
        }
        Ok(bean)
    }
}

fn type_error(name: &str, expected: &str, value: &ConfigValue) -> PipelineError {
    PipelineError::Configuration(format!(
        "pipeline configuration '{name}' expects a {expected}, got {}",
        value.type_name()
    ))
}

fn expect_bool(name: &str, value: &ConfigValue) -> Result<bool, PipelineError> {
    value.as_bool().ok_or_else(|| type_error(name, "boolean", value))
}

fn expect_number(name: &str, value: &ConfigValue) -> Result<f64, PipelineError> {
    value.as_f64().ok_or_else(|| type_error(name, "number", value))
}

fn expect_string(name: &str, value: &ConfigValue) -> Result<String, PipelineError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| type_error(name, "string", value))
}

fn expect_string_list(name: &str, value: &ConfigValue) -> Result<Vec<String>, PipelineError> {
    let items = value
        .as_list()
        .ok_or_else(|| type_error(name, "list", value))?;
    items
        .iter()
        .map(|item| expect_string(name, item))
        .collect()
}

/// Constants arrive as a list of `{key, value}` maps.
fn parse_constants(value: &ConfigValue) -> Result<HashMap<String, Value>, PipelineError> {
    let items = value
        .as_list()
        .ok_or_else(|| type_error("constants", "list", value))?;
    let mut constants = HashMap::new();
    for item in items {
        let entry = item.as_map().ok_or_else(|| {
            PipelineError::Configuration(
                "pipeline configuration 'constants' entries must be {key, value} maps".to_string(),
            )
        })?;
        let key = entry
            .get("key")
            .and_then(ConfigValue::as_str)
            .ok_or_else(|| {
                PipelineError::Configuration(
                    "pipeline configuration 'constants' entry is missing a string 'key'"
                        .to_string(),
                )
            })?;
        let val = entry.get("value").cloned().unwrap_or_default();
        constants.insert(key.to_string(), val.to_json());
    }
    Ok(constants)
}
