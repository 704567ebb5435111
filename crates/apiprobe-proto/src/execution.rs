//! Outcome records of executed test cases.

use crate::assertion::Assertion;
use crate::scenario::QualityScenario;
use serde::{Deserialize, Serialize};

/// Status code recorded when the request never produced an HTTP response.
pub const TRANSPORT_FAILURE_STATUS: i32 = -1;

/// Terminal state of the conformance decision for one executed case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionOutcome {
    /// The oracle judged the response conforming and supplied assertions.
    Accepted,
    /// The case was replaced by an adjusted case.
    Adjusted,
    /// The interface was flagged as behaving abnormally.
    Abnormal,
    /// No decision was reached within the retry budget.
    Exhausted,
}

/// The outcome of running one test case.
///
/// `success` starts as the transport-level verdict and is overwritten exactly
/// once by the local verifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub case_name: String,
    pub method: String,
    pub url: String,
    /// Equivalent curl invocation, for reproducing the request by hand.
    #[serde(default)]
    pub curl_command: String,
    /// HTTP status, or [`TRANSPORT_FAILURE_STATUS`].
    pub status_code: i32,
    #[serde(default)]
    pub response_body: Option<String>,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<QualityScenario>,
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub verification_passed: bool,
    #[serde(default)]
    pub verification_reason: String,
    #[serde(default)]
    pub interface_abnormal: bool,
    #[serde(default)]
    pub abnormal_description: String,
    #[serde(default)]
    pub case_adjusted: bool,
    #[serde(default)]
    pub adjustment_note: String,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    #[serde(default)]
    pub assertion_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionOutcome>,
}

impl ExecutionResult {
    /// A result for a request that received an HTTP response.
    pub fn response(
        case_name: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
        status_code: i32,
        response_body: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            case_name: case_name.into(),
            method: method.into(),
            url: url.into(),
            status_code,
            response_body: Some(response_body.into()),
            duration_ms,
            success: is_2xx(status_code),
            ..Self::default()
        }
    }

    /// A result for a request that failed before any response arrived.
    pub fn transport_failure(
        case_name: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
        duration_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            case_name: case_name.into(),
            method: method.into(),
            url: url.into(),
            status_code: TRANSPORT_FAILURE_STATUS,
            response_body: None,
            duration_ms,
            success: false,
            error_message: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        self.status_code == TRANSPORT_FAILURE_STATUS
    }
}

/// True for `200 <= code < 300`.
pub fn is_2xx(code: i32) -> bool {
    (200..300).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_sets_transport_verdict() {
        let ok = ExecutionResult::response("c", "GET", "http://x/a", 204, "", 5);
        assert!(ok.success);
        let bad = ExecutionResult::response("c", "GET", "http://x/a", 404, "nope", 5);
        assert!(!bad.success);
    }

    #[test]
    fn test_transport_failure_has_no_body() {
        let r = ExecutionResult::transport_failure("c", "GET", "http://x", 3, "connection refused");
        assert!(r.is_transport_failure());
        assert!(r.response_body.is_none());
        assert_eq!(r.error_message.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let r = ExecutionResult::response("c", "GET", "http://x", 200, "{}", 12);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["caseName"], "c");
        assert_eq!(v["statusCode"], 200);
        assert_eq!(v["durationMs"], 12);
        assert!(v.get("decision").is_none());
    }
}
