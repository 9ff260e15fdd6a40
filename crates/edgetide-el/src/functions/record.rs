//! The `record:*` function group.
//!
//! Requires a record bound into the evaluation context; every function
//! fails with the missing-context error otherwise.
//!
//! `valueOrDefault` preserves the three-way path semantics: a present
//! field wins, a legitimately absent leaf falls back to the default, and
//! an invalid path is an error that must not be swallowed.

use serde_json::Value;

use crate::context::ElContext;
use crate::error::ElError;
use crate::evaluator::ElFunction;
use crate::functions::path_arg;

pub(crate) fn definitions() -> Vec<ElFunction> {
    vec![
        ElFunction {
            name: "record:type",
            min_args: 1,
            handler: record_type,
        },
        ElFunction {
            name: "record:value",
            min_args: 1,
            handler: record_value,
        },
        ElFunction {
            name: "record:valueOrDefault",
            min_args: 2,
            handler: record_value_or_default,
        },
        ElFunction {
            name: "record:exists",
            min_args: 1,
            handler: record_exists,
        },
    ]
}

/// `record:type(path)`: type name of the field at `path`; null for an
/// absent leaf; the underlying path error otherwise.
fn record_type(ctx: &ElContext<'_>, args: &[Value]) -> Result<Value, ElError> {
    let record = ctx.record()?;
    match record.get(path_arg(args)?)? {
        Some(field) => Ok(Value::String(field.type_name().to_string())),
        None => Ok(Value::Null),
    }
}

/// `record:value(path)`: raw value at `path`; null for an absent leaf;
/// the underlying path error otherwise.
fn record_value(ctx: &ElContext<'_>, args: &[Value]) -> Result<Value, ElError> {
    let record = ctx.record()?;
    match record.get(path_arg(args)?)? {
        Some(field) => Ok(field.to_json()),
        None => Ok(Value::Null),
    }
}

/// `record:valueOrDefault(path, default)`: value at `path` when present,
/// `default` when the leaf is legitimately absent, and the path error
/// when resolution itself fails.
fn record_value_or_default(ctx: &ElContext<'_>, args: &[Value]) -> Result<Value, ElError> {
    let record = ctx.record()?;
    match record.get(path_arg(args)?)? {
        Some(field) => Ok(field.to_json()),
        None => Ok(args[1].clone()),
    }
}

/// `record:exists(path)`: true only when the path resolves and the field
/// is present; never fails for a missing or invalid path.
fn record_exists(ctx: &ElContext<'_>, args: &[Value]) -> Result<Value, ElError> {
    let record = ctx.record()?;
    Ok(Value::Bool(matches!(
        record.get(path_arg(args)?),
        Ok(Some(_))
    )))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use edgetide_types::{Field, Record};

    use super::*;
    use crate::evaluator::Evaluator;

    /// Record shaped like the reference evaluation fixtures:
    /// `/a` is a map, `/a/b` a string leaf.
    fn sample_record() -> Record {
        Record::new(
            "test-origin",
            "source::0",
            Field::Map(BTreeMap::from([(
                "a".to_string(),
                Field::map([("b", Field::string("Test Value"))]),
            )])),
        )
    }

    fn evaluate(expression: &str, record: &Record) -> Result<Value, ElError> {
        let ctx = ElContext::new().with_record(record);
        Evaluator::with_defaults().evaluate(expression, "predicate", &ctx)
    }

    #[test]
    fn type_of_present_map() {
        let record = sample_record();
        assert_eq!(evaluate("${record:type('/a')}", &record).unwrap(), Value::from("MAP"));
        assert_eq!(
            evaluate("${record:type('/a/b')}", &record).unwrap(),
            Value::from("STRING")
        );
    }

    #[test]
    fn type_arity_error_message() {
        let record = sample_record();
        let err = evaluate("${record:type()}", &record).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The function 'record:type' requires 1 arguments but was passed 0"
        );
    }

    #[test]
    fn type_propagates_path_error() {
        let record = sample_record();
        let err = evaluate("${record:type('/inValid/x')}", &record).unwrap_err();
        assert_eq!(err.to_string(), "invalid fieldPath '/inValid/x'");
    }

    #[test]
    fn value_of_present_leaf() {
        let record = sample_record();
        assert_eq!(
            evaluate("${record:value('/a/b')}", &record).unwrap(),
            Value::from("Test Value")
        );
    }

    #[test]
    fn value_arity_error_message() {
        let record = sample_record();
        let err = evaluate("${record:value()}", &record).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The function 'record:value' requires 1 arguments but was passed 0"
        );
    }

    #[test]
    fn value_matches_direct_get_for_all_present_paths() {
        let record = sample_record();
        for path in record.field_paths() {
            let direct = record.get(&path).unwrap().unwrap().to_json();
            let via_el = evaluate(&format!("${{record:value('{path}')}}"), &record).unwrap();
            assert_eq!(direct, via_el, "mismatch at {path}");
            assert_eq!(
                evaluate(&format!("${{record:exists('{path}')}}"), &record).unwrap(),
                Value::Bool(true)
            );
        }
    }

    #[test]
    fn value_or_default_prefers_present_value() {
        let record = sample_record();
        assert_eq!(
            evaluate(
                "${record:valueOrDefault('/a/b', 'test default value')}",
                &record
            )
            .unwrap(),
            Value::from("Test Value")
        );
    }

    #[test]
    fn value_or_default_falls_back_for_absent_leaf() {
        let record = sample_record();
        assert_eq!(
            evaluate(
                "${record:valueOrDefault('/a/missing', 'test default value')}",
                &record
            )
            .unwrap(),
            Value::from("test default value")
        );
    }

    #[test]
    fn value_or_default_does_not_swallow_path_errors() {
        let record = sample_record();
        let err = evaluate(
            "${record:valueOrDefault('/inValid/x', 'fallback')}",
            &record,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "invalid fieldPath '/inValid/x'");
    }

    #[test]
    fn value_or_default_arity_error_message() {
        let record = sample_record();
        let err = evaluate("${record:valueOrDefault()}", &record).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The function 'record:valueOrDefault' requires 2 arguments but was passed 0"
        );
    }

    #[test]
    fn exists_is_true_only_for_present_fields() {
        let record = sample_record();
        assert_eq!(
            evaluate("${record:exists('/a/b')}", &record).unwrap(),
            Value::Bool(true)
        );
        // absent leaf under a scalar
        assert_eq!(
            evaluate("${record:exists('/a/b/c')}", &record).unwrap(),
            Value::Bool(false)
        );
        // invalid path: still false, never an error
        assert_eq!(
            evaluate("${record:exists('/inValid/x')}", &record).unwrap(),
            Value::Bool(false)
        );
        // absent leaf under a present container
        assert_eq!(
            evaluate("${record:exists('/a/missing')}", &record).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn exists_arity_error_message() {
        let record = sample_record();
        let err = evaluate("${record:exists()}", &record).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The function 'record:exists' requires 1 arguments but was passed 0"
        );
    }

    #[test]
    fn every_record_function_requires_the_record_binding() {
        let evaluator = Evaluator::with_defaults();
        let ctx = ElContext::new();
        for expression in [
            "${record:type('/a')}",
            "${record:value('/a')}",
            "${record:valueOrDefault('/a', 'defaultValue')}",
            "${record:exists('/a')}",
        ] {
            let err = evaluator.evaluate(expression, "predicate", &ctx).unwrap_err();
            assert_eq!(err.to_string(), "record context is not set", "for {expression}");
        }
    }
}
