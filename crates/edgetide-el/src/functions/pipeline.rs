//! The `pipeline:*` function group.

use serde_json::Value;

use crate::context::ElContext;
use crate::error::ElError;
use crate::evaluator::ElFunction;

pub(crate) fn definitions() -> Vec<ElFunction> {
    vec![
        ElFunction {
            name: "pipeline:id",
            min_args: 0,
            handler: pipeline_id,
        },
        ElFunction {
            name: "pipeline:title",
            min_args: 0,
            handler: pipeline_title,
        },
    ]
}

fn pipeline_id(ctx: &ElContext<'_>, _args: &[Value]) -> Result<Value, ElError> {
    Ok(Value::String(ctx.pipeline_id().to_string()))
}

fn pipeline_title(ctx: &ElContext<'_>, _args: &[Value]) -> Result<Value, ElError> {
    Ok(Value::String(ctx.pipeline_title().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Evaluator;

    #[test]
    fn pipeline_metadata_from_context() {
        let evaluator = Evaluator::with_defaults();
        let ctx = ElContext::new().with_pipeline("pipe-1", "Edge readings");
        assert_eq!(
            evaluator.evaluate("${pipeline:id()}", "c", &ctx).unwrap(),
            Value::from("pipe-1")
        );
        assert_eq!(
            evaluator.evaluate("${pipeline:title()}", "c", &ctx).unwrap(),
            Value::from("Edge readings")
        );
    }

    #[test]
    fn unbound_pipeline_metadata_is_empty() {
        let evaluator = Evaluator::with_defaults();
        let ctx = ElContext::new();
        assert_eq!(
            evaluator.evaluate("${pipeline:id()}", "c", &ctx).unwrap(),
            Value::from("")
        );
    }
}
