//! Expression parsing and function dispatch.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::context::ElContext;
use crate::error::ElError;
use crate::functions;

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{\s*([A-Za-z][A-Za-z0-9]*):([A-Za-z][A-Za-z0-9]*)\((.*)\)\s*\}$")
        .expect("valid function expression regex")
});

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}$").expect("valid name expression regex")
});

/// Whether a configuration string is an EL expression at all.
///
/// Non-EL strings pass through evaluation verbatim.
#[must_use]
pub fn is_el_string(value: &str) -> bool {
    value.starts_with("${") && value.ends_with('}')
}

/// Signature of a registered EL function.
pub type Handler = fn(&ElContext<'_>, &[Value]) -> Result<Value, ElError>;

/// One registered EL function with its arity contract.
#[derive(Clone, Copy)]
pub struct ElFunction {
    /// Fully-qualified name, `namespace:function`.
    pub name: &'static str,
    /// Minimum number of arguments; fewer is an arity error.
    pub min_args: usize,
    pub handler: Handler,
}

impl std::fmt::Debug for ElFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElFunction")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .finish_non_exhaustive()
    }
}

/// Namespace-table expression evaluator.
///
/// Stateless between calls and side-effect-free on the environment: it
/// may read but never mutates the bound record.
#[derive(Debug, Default)]
pub struct Evaluator {
    functions: HashMap<&'static str, ElFunction>,
}

impl Evaluator {
    /// An evaluator with no registered functions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An evaluator with the `record:*`, `pipeline:*`, and `runtime:*`
    /// groups registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut evaluator = Self::new();
        for group in [
            functions::record::definitions(),
            functions::pipeline::definitions(),
            functions::runtime::definitions(),
        ] {
            for function in group {
                evaluator.register(function);
            }
        }
        evaluator
    }

    /// Register (or replace) a function under its qualified name.
    pub fn register(&mut self, function: ElFunction) {
        self.functions.insert(function.name, function);
    }

    /// Evaluate one configuration string.
    ///
    /// Literals (no `${}`) pass through as string values; `${NAME}`
    /// resolves parameters/constants; `${ns:fn(args...)}` dispatches
    /// through the function table with the arity check applied first.
    ///
    /// # Errors
    ///
    /// Returns [`ElError`] on malformed expressions, unknown names or
    /// functions, arity violations, and function-internal failures.
    pub fn evaluate(
        &self,
        expression: &str,
        config_name: &str,
        ctx: &ElContext<'_>,
    ) -> Result<Value, ElError> {
        if !is_el_string(expression) {
            return Ok(Value::String(expression.to_string()));
        }

        if let Some(captures) = NAME_RE.captures(expression) {
            let name = &captures[1];
            return ctx.lookup_name(name).cloned().ok_or_else(|| {
                ElError::Evaluation(format!("'{name}' is not a defined constant or parameter"))
            });
        }

        if let Some(captures) = FUNCTION_RE.captures(expression) {
            let qualified = format!("{}:{}", &captures[1], &captures[2]);
            let args = parse_args(&captures[3], expression, config_name)?;
            let function = self
                .functions
                .get(qualified.as_str())
                .ok_or_else(|| ElError::UnknownFunction(qualified.clone()))?;
            if args.len() < function.min_args {
                return Err(ElError::Arity {
                    function: qualified,
                    required: function.min_args,
                    passed: args.len(),
                });
            }
            return (function.handler)(ctx, &args);
        }

        Err(ElError::Parse {
            expression: expression.to_string(),
            config_name: config_name.to_string(),
            reason: "expected '${NAME}' or '${namespace:function(...)}'".to_string(),
        })
    }
}

/// Split and parse a raw argument list.
///
/// Arguments are literals: quoted strings (single or double), booleans,
/// or numbers. Commas inside quotes do not split.
fn parse_args(raw: &str, expression: &str, config_name: &str) -> Result<Vec<Value>, ElError> {
    let parse_err = |reason: String| ElError::Parse {
        expression: expression.to_string(),
        config_name: config_name.to_string(),
        reason,
    };

    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in raw.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '\'' || ch == '"' => quote = Some(ch),
            None if ch == ',' => {
                tokens.push(std::mem::take(&mut current));
                continue;
            }
            None => {}
        }
        current.push(ch);
    }
    if quote.is_some() {
        return Err(parse_err("unterminated string literal".to_string()));
    }
    tokens.push(current);

    tokens
        .into_iter()
        .map(|token| {
            let token = token.trim();
            if (token.starts_with('\'') && token.ends_with('\'') && token.len() >= 2)
                || (token.starts_with('"') && token.ends_with('"') && token.len() >= 2)
            {
                return Ok(Value::String(token[1..token.len() - 1].to_string()));
            }
            if token == "true" {
                return Ok(Value::Bool(true));
            }
            if token == "false" {
                return Ok(Value::Bool(false));
            }
            if let Ok(int) = token.parse::<i64>() {
                return Ok(Value::from(int));
            }
            if let Ok(float) = token.parse::<f64>() {
                return Ok(Value::from(float));
            }
            Err(parse_err(format!("invalid argument '{token}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluate(expression: &str) -> Result<Value, ElError> {
        Evaluator::with_defaults().evaluate(expression, "testConfig", &ElContext::new())
    }

    #[test]
    fn literals_pass_through_unchanged() {
        assert_eq!(evaluate("plain text").unwrap(), Value::from("plain text"));
        assert_eq!(evaluate("").unwrap(), Value::from(""));
        // a `${` without closing brace is not EL
        assert_eq!(evaluate("${oops").unwrap(), Value::from("${oops"));
    }

    #[test]
    fn bare_name_resolves_constants() {
        let constants =
            std::collections::HashMap::from([("HOST".to_string(), Value::from("edge-1"))]);
        let ctx = ElContext::new().with_constants(&constants);
        let value = Evaluator::with_defaults()
            .evaluate("${HOST}", "resourceUrl", &ctx)
            .unwrap();
        assert_eq!(value, Value::from("edge-1"));
    }

    #[test]
    fn undefined_name_is_an_evaluation_error() {
        let err = evaluate("${MISSING}").unwrap_err();
        assert!(matches!(err, ElError::Evaluation(_)));
        assert!(err.to_string().contains("MISSING"));
    }

    #[test]
    fn unknown_function_is_reported_by_qualified_name() {
        let err = evaluate("${math:abs(1)}").unwrap_err();
        assert_eq!(err, ElError::UnknownFunction("math:abs".to_string()));
    }

    #[test]
    fn malformed_expression_is_a_parse_error() {
        let err = evaluate("${not a function}").unwrap_err();
        assert!(matches!(err, ElError::Parse { .. }));
    }

    #[test]
    fn arg_tokenizer_handles_quotes_and_commas() {
        let args = parse_args("'/a/b', 'with, comma', 7, true, 1.5", "${x:y(...)}", "c").unwrap();
        assert_eq!(
            args,
            vec![
                Value::from("/a/b"),
                Value::from("with, comma"),
                Value::from(7),
                Value::from(true),
                Value::from(1.5),
            ]
        );
    }

    #[test]
    fn arg_tokenizer_rejects_bare_words_and_open_quotes() {
        assert!(parse_args("bareword", "${x:y(...)}", "c").is_err());
        assert!(parse_args("'open", "${x:y(...)}", "c").is_err());
    }

    #[test]
    fn empty_args_are_allowed_by_the_parser() {
        assert!(parse_args("", "${x:y()}", "c").unwrap().is_empty());
        assert!(parse_args("   ", "${x:y()}", "c").unwrap().is_empty());
    }
}
