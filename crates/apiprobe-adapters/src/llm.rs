//! Collaborators backed by a [`ChatModel`].
//!
//! Replies are stripped of markdown fences and parsed leniently: a list may
//! arrive bare or wrapped in an object, and field types are coerced by the
//! proto crate's lenient deserializers.

use crate::llm_client::ChatModel;
use crate::prompts;
use apiprobe_core::{strip_code_fences, truncate_with_ellipsis};
use apiprobe_proto::{
    Analyst, ApiDocument, Assertion, AssertionGenerator, CaseGenerator, CollaboratorError,
    Decision, DecisionOracle, Endpoint, ExecutionResult, ProgramContext, QualityScenario,
    TestCase,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

fn parse_reply(reply: &str) -> Result<Value, CollaboratorError> {
    let cleaned = strip_code_fences(reply);
    serde_json::from_str(cleaned).map_err(|e| {
        CollaboratorError::Parse(format!(
            "{e}; reply started with: {}",
            truncate_with_ellipsis(cleaned, 120)
        ))
    })
}

/// Items of a reply that is either a bare array or an object holding the
/// array under `key`. Items that fail to decode are dropped with a warning.
fn parse_list<T: DeserializeOwned>(reply: &str, key: &str) -> Result<Vec<T>, CollaboratorError> {
    let items = match parse_reply(reply)? {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(CollaboratorError::Parse(format!("'{key}' is not an array")));
            }
        },
        _ => {
            return Err(CollaboratorError::Parse(format!(
                "expected an array or an object with '{key}'"
            )));
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(key, error = %e, "Dropping undecodable item from LLM reply");
                None
            }
        })
        .collect())
}

/// Decodes generated cases and fills in missing names and goals.
pub fn parse_cases(
    reply: &str,
    endpoint: &Endpoint,
    scenario: QualityScenario,
) -> Result<Vec<TestCase>, CollaboratorError> {
    let mut cases: Vec<TestCase> = parse_list(reply, "cases")?;
    for case in &mut cases {
        if case.name.trim().is_empty() {
            case.name = format!("{} {} - {}", endpoint.method, endpoint.path, scenario);
        }
        if case.goal.trim().is_empty() {
            case.goal = scenario.description().to_string();
        }
    }
    Ok(cases)
}

pub fn parse_assertions(reply: &str) -> Result<Vec<Assertion>, CollaboratorError> {
    parse_list(reply, "assertions")
}

pub fn parse_decision(reply: &str) -> Result<Decision, CollaboratorError> {
    let value = parse_reply(reply)?;
    if !value.is_object() {
        return Err(CollaboratorError::Parse(
            "decision reply is not a JSON object".to_string(),
        ));
    }
    Ok(serde_json::from_value(value)?)
}

pub struct LlmCaseGenerator {
    model: Arc<dyn ChatModel>,
}

impl LlmCaseGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl CaseGenerator for LlmCaseGenerator {
    async fn generate_cases(
        &self,
        program: &ProgramContext,
        endpoint: &Endpoint,
        scenario: QualityScenario,
    ) -> Result<Vec<TestCase>, CollaboratorError> {
        let prompt = prompts::case_prompt(program, endpoint, scenario);
        let reply = self.model.chat(prompts::CASE_SYSTEM, &prompt).await?;
        let cases = parse_cases(&reply, endpoint, scenario)?;
        debug!(endpoint = %endpoint.label(), %scenario, cases = cases.len(), "Generated cases");
        Ok(cases)
    }
}

pub struct LlmDecisionOracle {
    model: Arc<dyn ChatModel>,
}

impl LlmDecisionOracle {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl DecisionOracle for LlmDecisionOracle {
    async fn decide(
        &self,
        case: &TestCase,
        result: &ExecutionResult,
        endpoint: &Endpoint,
    ) -> Result<Decision, CollaboratorError> {
        let prompt = prompts::decision_prompt(case, result, endpoint);
        let reply = self.model.chat(prompts::DECISION_SYSTEM, &prompt).await?;
        parse_decision(&reply)
    }
}

pub struct LlmAssertionGenerator {
    model: Arc<dyn ChatModel>,
}

impl LlmAssertionGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl AssertionGenerator for LlmAssertionGenerator {
    async fn generate_assertions(
        &self,
        case: &TestCase,
        result: &ExecutionResult,
        endpoint: &Endpoint,
    ) -> Result<Vec<Assertion>, CollaboratorError> {
        let prompt = prompts::assertion_prompt(case, result, endpoint);
        let reply = self.model.chat(prompts::ASSERTION_SYSTEM, &prompt).await?;
        parse_assertions(&reply)
    }
}

pub struct LlmAnalyst {
    model: Arc<dyn ChatModel>,
}

impl LlmAnalyst {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Analyst for LlmAnalyst {
    async fn describe_api(
        &self,
        program: &ProgramContext,
        document: &ApiDocument,
    ) -> Result<String, CollaboratorError> {
        let prompt = prompts::understanding_prompt(program, document);
        let text = self.model.chat(prompts::UNDERSTANDING_SYSTEM, &prompt).await?;
        Ok(text.trim().to_string())
    }

    async fn analyze_run(
        &self,
        program: &ProgramContext,
        digest: &str,
    ) -> Result<String, CollaboratorError> {
        let prompt = prompts::analysis_prompt(program, digest);
        let text = self.model.chat(prompts::ANALYSIS_SYSTEM, &prompt).await?;
        Ok(text.trim().to_string())
    }
}
