//! Response assertions attached to test cases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What part of an execution an assertion inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssertionKind {
    /// HTTP status code.
    StatusCode,
    /// Substring presence in the raw response body.
    BodyContains,
    /// A value addressed by a JSON path inside the response body.
    JsonPath,
    /// Wall-clock duration of the request.
    ResponseTime,
    /// Anything the producer emitted that this crate does not know.
    Unknown(String),
}

impl AssertionKind {
    pub fn as_str(&self) -> &str {
        match self {
            AssertionKind::StatusCode => "statusCode",
            AssertionKind::BodyContains => "bodyContains",
            AssertionKind::JsonPath => "jsonPath",
            AssertionKind::ResponseTime => "responseTime",
            AssertionKind::Unknown(s) => s,
        }
    }
}

impl From<String> for AssertionKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "statusCode" => AssertionKind::StatusCode,
            "bodyContains" => AssertionKind::BodyContains,
            "jsonPath" => AssertionKind::JsonPath,
            "responseTime" => AssertionKind::ResponseTime,
            _ => AssertionKind::Unknown(s),
        }
    }
}

impl From<AssertionKind> for String {
    fn from(kind: AssertionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison applied between the observed and the expected value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    #[default]
    Equals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    /// Unrecognised operator. Evaluation treats it as satisfied.
    Other(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Operator::Equals => "equals",
            Operator::Contains => "contains",
            Operator::NotContains => "notContains",
            Operator::GreaterThan => "greaterThan",
            Operator::LessThan => "lessThan",
            Operator::Other(s) => s,
        }
    }
}

impl From<String> for Operator {
    fn from(s: String) -> Self {
        match s.as_str() {
            "equals" => Operator::Equals,
            "contains" => Operator::Contains,
            "notContains" => Operator::NotContains,
            "greaterThan" => Operator::GreaterThan,
            "lessThan" => Operator::LessThan,
            _ => Operator::Other(s),
        }
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single check against an execution outcome.
///
/// `expected` is always carried as text; numeric operators parse it at
/// evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    #[serde(rename = "type")]
    pub kind: AssertionKind,
    /// JSON path expression; only meaningful for [`AssertionKind::JsonPath`].
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::lenient::optional_string"
    )]
    pub expression: Option<String>,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default, deserialize_with = "crate::lenient::string")]
    pub expected: String,
    #[serde(default, deserialize_with = "crate::lenient::string")]
    pub success_message: String,
    #[serde(default, deserialize_with = "crate::lenient::string")]
    pub failure_message: String,
}

impl Assertion {
    /// Builds an assertion with empty messages.
    pub fn new(kind: AssertionKind, operator: Operator, expected: impl Into<String>) -> Self {
        Self {
            kind,
            expression: None,
            operator,
            expected: expected.into(),
            success_message: String::new(),
            failure_message: String::new(),
        }
    }

    /// `statusCode equals <code>`.
    pub fn status_equals(code: i32) -> Self {
        Self::new(AssertionKind::StatusCode, Operator::Equals, code.to_string())
    }

    /// `jsonPath <expression> <operator> <expected>`.
    pub fn json_path(
        expression: impl Into<String>,
        operator: Operator,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            expression: Some(expression.into()),
            ..Self::new(AssertionKind::JsonPath, operator, expected)
        }
    }

    pub fn with_messages(
        mut self,
        success_message: impl Into<String>,
        failure_message: impl Into<String>,
    ) -> Self {
        self.success_message = success_message.into();
        self.failure_message = failure_message.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assertion_wire_format() {
        let json = r#"{
            "type": "jsonPath",
            "expression": "$.code",
            "operator": "equals",
            "expected": 200,
            "successMessage": "business code ok",
            "failureMessage": "business code wrong"
        }"#;
        let a: Assertion = serde_json::from_str(json).unwrap();
        assert_eq!(a.kind, AssertionKind::JsonPath);
        assert_eq!(a.expression.as_deref(), Some("$.code"));
        assert_eq!(a.operator, Operator::Equals);
        assert_eq!(a.expected, "200");
        assert_eq!(a.failure_message, "business code wrong");
    }

    #[test]
    fn test_unknown_kind_and_operator_survive_parsing() {
        let json = r#"{"type": "header", "operator": "matches", "expected": "x"}"#;
        let a: Assertion = serde_json::from_str(json).unwrap();
        assert_eq!(a.kind, AssertionKind::Unknown("header".to_string()));
        assert_eq!(a.operator, Operator::Other("matches".to_string()));

        let back = serde_json::to_value(&a).unwrap();
        assert_eq!(back["type"], "header");
        assert_eq!(back["operator"], "matches");
    }

    #[test]
    fn test_missing_operator_defaults_to_equals() {
        let a: Assertion = serde_json::from_str(r#"{"type": "statusCode", "expected": "201"}"#).unwrap();
        assert_eq!(a.operator, Operator::Equals);
        assert!(a.expression.is_none());
    }
}
