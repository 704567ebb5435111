//! API description types consumed by the pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One operation of the API under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Upper-cased HTTP method.
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Operation definition plus the schemas it references. Passed verbatim
    /// to generators and oracles as the endpoint context.
    #[serde(default)]
    pub definition: Value,
}

impl Endpoint {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            path: path.into(),
            summary: String::new(),
            tags: Vec::new(),
            definition: Value::Null,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_definition(mut self, definition: Value) -> Self {
        self.definition = definition;
        self
    }

    /// `METHOD path`, used as a log and prompt label.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// True when no filter is given or the endpoint carries any filter tag.
    pub fn matches_tags(&self, filter: &[String]) -> bool {
        filter.is_empty() || self.tags.iter().any(|t| filter.contains(t))
    }

    /// Pretty-printed definition, or empty when none is known.
    pub fn context_json(&self) -> String {
        if self.definition.is_null() {
            return String::new();
        }
        serde_json::to_string_pretty(&self.definition).unwrap_or_default()
    }
}

/// A loaded API description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDocument {
    /// Base URL derived from the document, if any.
    pub base_url: Option<String>,
    pub endpoints: Vec<Endpoint>,
    /// One `METHOD path - summary` line per endpoint.
    pub outline: String,
    /// Leading slice of the raw document text.
    pub raw_preview: String,
}

/// Program-wide context shared with generators and analysts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramContext {
    pub program_name: String,
    /// Free-text additional testing requirements.
    pub extra_requirements: String,
    /// Understanding text produced for the API, if any.
    pub api_understanding: String,
}
