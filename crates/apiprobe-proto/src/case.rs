//! Test case request templates.

use crate::assertion::Assertion;
use crate::scenario::QualityScenario;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Insertion-ordered string mapping used for headers and parameters.
pub type ParamMap = IndexMap<String, String>;

/// A request template under test.
///
/// Cases are immutable once executed, except for `assertions`, which the
/// decision loop (or the assertion fallback) populates exactly once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(default, deserialize_with = "crate::lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "crate::lenient::string")]
    pub method: String,
    #[serde(default, deserialize_with = "crate::lenient::string")]
    pub path: String,
    /// Raw request body, possibly empty.
    #[serde(default, deserialize_with = "crate::lenient::string")]
    pub body: String,
    #[serde(default, deserialize_with = "crate::lenient::string_map")]
    pub headers: ParamMap,
    #[serde(default, deserialize_with = "crate::lenient::string_map")]
    pub query_params: ParamMap,
    #[serde(default, deserialize_with = "crate::lenient::string_map")]
    pub path_params: ParamMap,
    /// Free-text intent of the case.
    #[serde(default, deserialize_with = "crate::lenient::string")]
    pub goal: String,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    #[serde(default, deserialize_with = "crate::lenient::string_list")]
    pub tags: Vec<String>,
    /// Scenario the case was generated for; set by the pipeline.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::lenient::optional_or_none"
    )]
    pub scenario: Option<QualityScenario>,
}

impl TestCase {
    pub fn new(
        name: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    pub fn with_path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn with_assertions(mut self, assertions: Vec<Assertion>) -> Self {
        self.assertions = assertions;
        self
    }

    /// Looks up a header case-insensitively.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_parses_generator_output() {
        let json = r#"{
            "name": "create user",
            "method": "POST",
            "path": "/users",
            "headers": {"Content-Type": "application/json"},
            "queryParams": {"dryRun": false},
            "pathParams": {},
            "body": {"name": "alice"},
            "goal": "user is created"
        }"#;
        let tc: TestCase = serde_json::from_str(json).unwrap();
        assert_eq!(tc.method, "POST");
        assert_eq!(tc.body, r#"{"name":"alice"}"#);
        assert_eq!(tc.query_params["dryRun"], "false");
        assert!(tc.assertions.is_empty());
        assert!(tc.tags.is_empty());
    }

    #[test]
    fn test_param_order_survives_value_round_trip() {
        let value: serde_json::Value = serde_json::from_str(
            r#"{"name":"page","queryParams":{"page":"2","limit":"20","after":"c9"}}"#,
        )
        .unwrap();
        let tc: TestCase = serde_json::from_value(value).unwrap();
        let keys: Vec<&str> = tc.query_params.keys().map(String::as_str).collect();
        assert_eq!(keys, ["page", "limit", "after"]);

        let stored = serde_json::to_string(&tc).unwrap();
        let reloaded: TestCase = serde_json::from_str(&stored).unwrap();
        assert_eq!(reloaded.query_params, tc.query_params);
        let keys: Vec<&str> = reloaded.query_params.keys().map(String::as_str).collect();
        assert_eq!(keys, ["page", "limit", "after"]);
    }

    #[test]
    fn test_unknown_scenario_is_ignored() {
        let tc: TestCase =
            serde_json::from_str(r#"{"name":"a","scenario":"SOMETHING_ELSE"}"#).unwrap();
        assert_eq!(tc.scenario, None);

        let tc: TestCase =
            serde_json::from_str(r#"{"name":"a","scenario":"ABNORMAL_INPUT"}"#).unwrap();
        assert_eq!(tc.scenario, Some(QualityScenario::AbnormalInput));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let tc = TestCase::new("n", "GET", "/").with_header("Authorization", "Bearer x");
        assert_eq!(tc.header("authorization"), Some("Bearer x"));
        assert_eq!(tc.header("accept"), None);
    }
}
