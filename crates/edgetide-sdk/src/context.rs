//! Per-stage execution context.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use edgetide_el::{ElContext, ElError, Evaluator};
use edgetide_types::{ConfigValue, Field, Record};
use serde_json::Value;

/// Shared sink for records redirected via [`StageContext::to_error`].
///
/// One sink per pipeline, shared by every stage context; the engine
/// drains it at the end of each cycle and delivers the records to the
/// error-handling destination.
pub type ErrorSink = Arc<Mutex<Vec<Record>>>;

/// Everything a stage sees from its surroundings: identity, declared
/// lanes, resolved configuration, expression evaluation, and the
/// error-record side channel.
#[derive(Debug, Clone)]
pub struct StageContext {
    instance_name: String,
    output_lanes: Vec<String>,
    configs: HashMap<String, ConfigValue>,
    constants: HashMap<String, Value>,
    parameters: HashMap<String, Value>,
    pipeline_id: String,
    pipeline_title: String,
    evaluator: Arc<Evaluator>,
    error_sink: ErrorSink,
}

impl StageContext {
    /// Start building a context. Only the instance name is required.
    #[must_use]
    pub fn builder() -> StageContextBuilder {
        StageContextBuilder::default()
    }

    /// Instance name of this stage in the pipeline configuration.
    #[must_use]
    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// Output lanes declared for this stage, in configuration order.
    #[must_use]
    pub fn output_lanes(&self) -> &[String] {
        &self.output_lanes
    }

    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// A configuration value by name.
    #[must_use]
    pub fn config(&self, name: &str) -> Option<&ConfigValue> {
        self.configs.get(name)
    }

    /// A required string configuration value, with the configuration
    /// error a stage should fail `init` with when it is absent.
    pub fn required_string_config(&self, name: &str) -> Result<String, crate::StageError> {
        match self.config(name) {
            Some(value) => value.as_str().map(str::to_string).ok_or_else(|| {
                crate::StageError::config(format!(
                    "stage '{}' configuration '{name}' expects a string, got {}",
                    self.instance_name,
                    value.type_name()
                ))
            }),
            None => Err(crate::StageError::config(format!(
                "stage '{}' is missing required configuration '{name}'",
                self.instance_name
            ))),
        }
    }

    /// Evaluate a configuration string, optionally binding a record.
    ///
    /// Non-EL strings pass through verbatim; constants, runtime
    /// parameters, and pipeline metadata are always bound.
    ///
    /// # Errors
    ///
    /// Propagates [`ElError`] from the evaluator.
    pub fn evaluate(
        &self,
        expression: &str,
        config_name: &str,
        record: Option<&Record>,
    ) -> Result<Value, ElError> {
        let mut ctx = ElContext::new()
            .with_constants(&self.constants)
            .with_parameters(&self.parameters)
            .with_pipeline(&self.pipeline_id, &self.pipeline_title);
        if let Some(record) = record {
            ctx = ctx.with_record(record);
        }
        self.evaluator.evaluate(expression, config_name, &ctx)
    }

    /// Redirect a record to the pipeline's error-handling destination.
    ///
    /// The only record-routing side channel outside normal lanes. Never
    /// aborts the cycle: the record is tagged with the failure and
    /// delivered at cycle end.
    pub fn to_error<E: std::fmt::Display>(&self, err: E, mut record: Record) {
        let message = err.to_string();
        tracing::warn!(
            stage = self.instance_name,
            error = message,
            record = record.header().source_id,
            "Redirecting record to error destination"
        );
        record.set_error(self.instance_name.as_str(), message);
        if let Ok(mut sink) = self.error_sink.lock() {
            sink.push(record);
        }
    }

    /// Create a record owned by this stage, with a unique id derived from
    /// the origin-assigned source id.
    #[must_use]
    pub fn create_record(&self, source_id: &str, root: Field) -> Record {
        Record::new(self.instance_name.as_str(), source_id, root)
    }

    /// The shared error sink (engine-side drain point).
    #[must_use]
    pub fn error_sink(&self) -> &ErrorSink {
        &self.error_sink
    }
}

/// Builder for [`StageContext`].
#[derive(Debug, Default)]
pub struct StageContextBuilder {
    instance_name: String,
    output_lanes: Vec<String>,
    configs: HashMap<String, ConfigValue>,
    constants: HashMap<String, Value>,
    parameters: HashMap<String, Value>,
    pipeline_id: String,
    pipeline_title: String,
    evaluator: Option<Arc<Evaluator>>,
    error_sink: Option<ErrorSink>,
}

impl StageContextBuilder {
    #[must_use]
    pub fn instance_name(mut self, name: impl Into<String>) -> Self {
        self.instance_name = name.into();
        self
    }

    #[must_use]
    pub fn output_lanes(mut self, lanes: Vec<String>) -> Self {
        self.output_lanes = lanes;
        self
    }

    #[must_use]
    pub fn configs(mut self, configs: HashMap<String, ConfigValue>) -> Self {
        self.configs = configs;
        self
    }

    #[must_use]
    pub fn constants(mut self, constants: HashMap<String, Value>) -> Self {
        self.constants = constants;
        self
    }

    #[must_use]
    pub fn parameters(mut self, parameters: HashMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    #[must_use]
    pub fn pipeline(mut self, id: impl Into<String>, title: impl Into<String>) -> Self {
        self.pipeline_id = id.into();
        self.pipeline_title = title.into();
        self
    }

    #[must_use]
    pub fn evaluator(mut self, evaluator: Arc<Evaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    #[must_use]
    pub fn error_sink(mut self, sink: ErrorSink) -> Self {
        self.error_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn build(self) -> StageContext {
        StageContext {
            instance_name: self.instance_name,
            output_lanes: self.output_lanes,
            configs: self.configs,
            constants: self.constants,
            parameters: self.parameters,
            pipeline_id: self.pipeline_id,
            pipeline_title: self.pipeline_title,
            evaluator: self
                .evaluator
                .unwrap_or_else(|| Arc::new(Evaluator::with_defaults())),
            error_sink: self.error_sink.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_string_config_errors_name_the_stage_and_key() {
        let ctx = StageContext::builder().instance_name("origin-1").build();
        let err = ctx.required_string_config("rawData").unwrap_err();
        assert!(err.to_string().contains("origin-1"));
        assert!(err.to_string().contains("rawData"));

        let ctx = StageContext::builder()
            .instance_name("origin-1")
            .configs(HashMap::from([(
                "rawData".to_string(),
                ConfigValue::Bool(true),
            )]))
            .build();
        let err = ctx.required_string_config("rawData").unwrap_err();
        assert!(err.to_string().contains("expects a string, got boolean"));
    }

    #[test]
    fn evaluate_binds_constants_and_record() {
        let ctx = StageContext::builder()
            .instance_name("proc-1")
            .constants(HashMap::from([("K".to_string(), Value::from(9))]))
            .build();
        assert_eq!(ctx.evaluate("${K}", "c", None).unwrap(), Value::from(9));

        let record = Record::new("o", "s::0", Field::map([("text", Field::string("hi"))]));
        assert_eq!(
            ctx.evaluate("${record:value('/text')}", "c", Some(&record))
                .unwrap(),
            Value::from("hi")
        );
        // without the record bound, the record group must fail
        let err = ctx
            .evaluate("${record:value('/text')}", "c", None)
            .unwrap_err();
        assert_eq!(err.to_string(), "record context is not set");
    }

    #[test]
    fn to_error_tags_and_collects_the_record() {
        let ctx = StageContext::builder().instance_name("dest-1").build();
        let record = ctx.create_record("src::0", Field::map([("x", Field::Integer(1))]));
        ctx.to_error("write refused", record);

        let sink = ctx.error_sink().lock().unwrap();
        assert_eq!(sink.len(), 1);
        let errored = &sink[0];
        assert_eq!(errored.header().error_stage.as_deref(), Some("dest-1"));
        assert_eq!(errored.header().error_message.as_deref(), Some("write refused"));
        assert_eq!(errored.header().stage_creator, "dest-1");
    }
}
