//! Local verification of executed cases.
//!
//! The verifier produces the final `success` verdict of an [`ExecutionResult`].
//! Rules are checked in priority order and the first match wins:
//!
//! 1. interface flagged abnormal: fail
//! 2. case replaced by an adjusted case: fail
//! 3. no assertions: pass iff the status is 2xx
//! 4. otherwise: pass iff every assertion passes

use crate::evaluator::evaluate;
use apiprobe_proto::{ExecutionResult, TestCase, is_2xx};

pub const ALL_ASSERTIONS_PASSED: &str = "All assertions passed";

/// Applies the verification rules and records the verdict on `result`.
///
/// Total and idempotent: it reads only `case.assertions` and the response
/// fields of `result`, and writes only the verdict fields.
pub fn verify(case: &TestCase, result: &mut ExecutionResult) {
    let (passed, reason) = judge(case, result);
    result.success = passed;
    result.verification_passed = passed;
    result.verification_reason = reason;
}

fn judge(case: &TestCase, result: &ExecutionResult) -> (bool, String) {
    if result.interface_abnormal {
        return (false, or_default(&result.abnormal_description, "Interface marked abnormal"));
    }
    if result.case_adjusted {
        return (
            false,
            or_default(&result.adjustment_note, "Case was adjusted and re-executed"),
        );
    }
    if case.assertions.is_empty() {
        let passed = is_2xx(result.status_code);
        let verdict = if passed { "passed" } else { "failed" };
        return (
            passed,
            format!(
                "No assertions; default 2xx check {verdict} (status {})",
                result.status_code
            ),
        );
    }

    let failures: Vec<String> = case
        .assertions
        .iter()
        .filter_map(|assertion| {
            let outcome = evaluate(assertion, result);
            if outcome.passed {
                return None;
            }
            let message = or_default(
                &assertion.failure_message,
                &format!("{} assertion failed", assertion.kind),
            );
            Some(format!(
                "{message} (expected: {}, actual: {})",
                assertion.expected, outcome.actual
            ))
        })
        .collect();

    if failures.is_empty() {
        (true, ALL_ASSERTIONS_PASSED.to_string())
    } else {
        (false, failures.join("; "))
    }
}

fn or_default(text: &str, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text.to_string()
    }
}
