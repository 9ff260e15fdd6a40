//! The `runtime:*` function group.

use serde_json::Value;

use crate::context::ElContext;
use crate::error::ElError;
use crate::evaluator::ElFunction;

pub(crate) fn definitions() -> Vec<ElFunction> {
    vec![ElFunction {
        name: "runtime:conf",
        min_args: 1,
        handler: runtime_conf,
    }]
}

/// `runtime:conf(name)`: resolve a runtime parameter; undefined names
/// are evaluation errors, not nulls.
fn runtime_conf(ctx: &ElContext<'_>, args: &[Value]) -> Result<Value, ElError> {
    let name = args[0]
        .as_str()
        .ok_or_else(|| ElError::Evaluation("runtime configuration name must be a string".to_string()))?;
    ctx.parameter(name).cloned().ok_or_else(|| {
        ElError::Evaluation(format!("runtime configuration '{name}' is not defined"))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::evaluator::Evaluator;

    #[test]
    fn resolves_runtime_parameters() {
        let parameters = HashMap::from([("pollInterval".to_string(), Value::from(30))]);
        let ctx = ElContext::new().with_parameters(&parameters);
        let value = Evaluator::with_defaults()
            .evaluate("${runtime:conf('pollInterval')}", "c", &ctx)
            .unwrap();
        assert_eq!(value, Value::from(30));
    }

    #[test]
    fn undefined_parameter_is_an_error() {
        let err = Evaluator::with_defaults()
            .evaluate("${runtime:conf('missing')}", "c", &ElContext::new())
            .unwrap_err();
        assert!(err.to_string().contains("'missing' is not defined"));
    }
}
