//! Deterministic assertion evaluation.
//!
//! [`evaluate`] is total: malformed bodies, non-numeric literals and bad paths
//! all produce a failed outcome whose `actual` text starts with `"Error: "`.
//! A failure in one assertion never affects its siblings.
//!
//! Unrecognised operators evaluate as satisfied. This permissive default is
//! intentional and covered by tests; producers that emit unknown operators
//! get no enforcement from them.

use crate::json_path;
use crate::text::truncate_with_ellipsis;
use apiprobe_proto::{Assertion, AssertionKind, ExecutionResult, Operator};
use serde_json::Value;

/// How much of a response body is echoed back in `actual` descriptions.
const BODY_EXCERPT_CHARS: usize = 200;

/// Result of evaluating one assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionOutcome {
    pub passed: bool,
    /// Human-readable description of the observed value.
    pub actual: String,
}

impl AssertionOutcome {
    fn fail(actual: impl Into<String>) -> Self {
        Self {
            passed: false,
            actual: actual.into(),
        }
    }

    fn error(message: impl AsRef<str>) -> Self {
        Self::fail(format!("Error: {}", message.as_ref()))
    }

    fn verdict(passed: bool, actual: impl Into<String>) -> Self {
        Self {
            passed,
            actual: actual.into(),
        }
    }
}

/// Evaluates `assertion` against `result`.
pub fn evaluate(assertion: &Assertion, result: &ExecutionResult) -> AssertionOutcome {
    match &assertion.kind {
        AssertionKind::StatusCode => eval_status_code(assertion, result),
        AssertionKind::BodyContains => eval_body_contains(assertion, result),
        AssertionKind::ResponseTime => eval_response_time(assertion, result),
        AssertionKind::JsonPath => eval_json_path(assertion, result),
        AssertionKind::Unknown(kind) => {
            AssertionOutcome::error(format!("unsupported assertion type '{kind}'"))
        }
    }
}

fn eval_status_code(assertion: &Assertion, result: &ExecutionResult) -> AssertionOutcome {
    let actual = result.status_code.to_string();
    if assertion.operator == Operator::Equals {
        return match assertion.expected.trim().parse::<i32>() {
            Ok(expected) => AssertionOutcome::verdict(result.status_code == expected, actual),
            Err(_) => AssertionOutcome::error(format!(
                "expected status code '{}' is not an integer",
                assertion.expected
            )),
        };
    }
    match compare(&actual, &assertion.operator, &assertion.expected) {
        Ok(passed) => AssertionOutcome::verdict(passed, actual),
        Err(message) => AssertionOutcome::error(message),
    }
}

fn eval_body_contains(assertion: &Assertion, result: &ExecutionResult) -> AssertionOutcome {
    let Some(body) = result.response_body.as_deref() else {
        return AssertionOutcome::fail("<no response body>");
    };
    let found = body.contains(assertion.expected.as_str());
    let passed = match assertion.operator {
        Operator::NotContains => !found,
        _ => found,
    };
    AssertionOutcome::verdict(passed, truncate_with_ellipsis(body, BODY_EXCERPT_CHARS))
}

fn eval_response_time(assertion: &Assertion, result: &ExecutionResult) -> AssertionOutcome {
    let actual = format!("{}ms", result.duration_ms);
    match parse_number(&assertion.expected) {
        Some(limit) => AssertionOutcome::verdict((result.duration_ms as f64) < limit, actual),
        None => AssertionOutcome::error(format!(
            "expected response time '{}' is not a number",
            assertion.expected
        )),
    }
}

fn eval_json_path(assertion: &Assertion, result: &ExecutionResult) -> AssertionOutcome {
    let expression = assertion.expression.as_deref().unwrap_or("$");
    let Some(body) = result.response_body.as_deref() else {
        return AssertionOutcome::fail("<no response body>");
    };
    let doc: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => return AssertionOutcome::error(format!("response body is not JSON ({e})")),
    };
    let leaf = match json_path::resolve(&doc, expression) {
        Ok(Some(v)) => v,
        Ok(None) => return AssertionOutcome::fail(format!("{expression} not found")),
        Err(e) => return AssertionOutcome::error(format!("bad path '{expression}': {e}")),
    };
    let actual = leaf_text(leaf);
    match compare(&actual, &assertion.operator, &assertion.expected) {
        Ok(passed) => AssertionOutcome::verdict(passed, actual),
        Err(message) => AssertionOutcome::error(message),
    }
}

/// Applies a text or numeric operator. `Err` carries a parse failure message.
fn compare(actual: &str, operator: &Operator, expected: &str) -> Result<bool, String> {
    match operator {
        Operator::Equals => Ok(actual == expected),
        Operator::Contains => Ok(actual.contains(expected)),
        Operator::NotContains => Ok(!actual.contains(expected)),
        Operator::GreaterThan | Operator::LessThan => {
            let (Some(a), Some(e)) = (parse_number(actual), parse_number(expected)) else {
                return Err(format!(
                    "cannot compare '{actual}' {operator} '{expected}' numerically"
                ));
            };
            Ok(if *operator == Operator::GreaterThan {
                a > e
            } else {
                a < e
            })
        }
        Operator::Other(_) => Ok(true),
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| !n.is_nan())
}

fn leaf_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
