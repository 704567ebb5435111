//! Structured verdicts returned by a decision oracle.

use crate::assertion::Assertion;
use crate::case::TestCase;
use serde::{Deserialize, Serialize};

/// What the oracle wants done with a non-conforming execution.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DecisionAction {
    #[default]
    None,
    AdjustCase,
    MarkAbnormal,
    /// Anything else; treated as an inconclusive answer.
    Unrecognized(String),
}

impl DecisionAction {
    pub fn as_str(&self) -> &str {
        match self {
            DecisionAction::None => "none",
            DecisionAction::AdjustCase => "adjust_case",
            DecisionAction::MarkAbnormal => "mark_abnormal",
            DecisionAction::Unrecognized(s) => s,
        }
    }
}

impl From<String> for DecisionAction {
    fn from(s: String) -> Self {
        match s.trim() {
            "" | "none" => DecisionAction::None,
            "adjust_case" => DecisionAction::AdjustCase,
            "mark_abnormal" => DecisionAction::MarkAbnormal,
            _ => DecisionAction::Unrecognized(s),
        }
    }
}

impl From<DecisionAction> for String {
    fn from(action: DecisionAction) -> Self {
        action.as_str().to_string()
    }
}

/// A conformance verdict for one (case, execution) pair.
///
/// Which optional field is meaningful depends on `conforms` and `action`:
/// `assertions` when conforming, `adjusted_case` for
/// [`DecisionAction::AdjustCase`], `abnormal_description` for
/// [`DecisionAction::MarkAbnormal`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    #[serde(default)]
    pub conforms: bool,
    #[serde(default, deserialize_with = "crate::lenient::string")]
    pub reason: String,
    #[serde(default)]
    pub action: DecisionAction,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjusted_case: Option<TestCase>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::lenient::optional_string"
    )]
    pub abnormal_description: Option<String>,
}

impl Decision {
    /// A conforming verdict carrying assertions.
    pub fn accept(reason: impl Into<String>, assertions: Vec<Assertion>) -> Self {
        Self {
            conforms: true,
            reason: reason.into(),
            assertions,
            ..Self::default()
        }
    }

    /// A non-conforming verdict that proposes a replacement case.
    pub fn adjust(reason: impl Into<String>, adjusted: TestCase) -> Self {
        Self {
            conforms: false,
            reason: reason.into(),
            action: DecisionAction::AdjustCase,
            adjusted_case: Some(adjusted),
            ..Self::default()
        }
    }

    /// A non-conforming verdict that flags the interface.
    pub fn abnormal(reason: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            conforms: false,
            reason: reason.into(),
            action: DecisionAction::MarkAbnormal,
            abnormal_description: Some(description.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_adjust_case_decision() {
        let json = r#"{
            "conforms": false,
            "reason": "id 0 does not exist",
            "action": "adjust_case",
            "adjustedCase": {
                "name": "get user 1",
                "method": "GET",
                "path": "/users/{id}",
                "pathParams": {"id": 1}
            }
        }"#;
        let d: Decision = serde_json::from_str(json).unwrap();
        assert!(!d.conforms);
        assert_eq!(d.action, DecisionAction::AdjustCase);
        let adjusted = d.adjusted_case.unwrap();
        assert_eq!(adjusted.path_params["id"], "1");
    }

    #[test]
    fn test_unknown_action_is_preserved() {
        let d: Decision =
            serde_json::from_str(r#"{"conforms": false, "action": "retry_later"}"#).unwrap();
        assert_eq!(d.action, DecisionAction::Unrecognized("retry_later".to_string()));
    }

    #[test]
    fn test_missing_fields_default() {
        let d: Decision = serde_json::from_str("{}").unwrap();
        assert!(!d.conforms);
        assert_eq!(d.action, DecisionAction::None);
        assert!(d.assertions.is_empty());
        assert!(d.adjusted_case.is_none());
    }
}
