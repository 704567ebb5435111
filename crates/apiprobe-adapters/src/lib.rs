//! # apiprobe-adapters
//!
//! Concrete collaborators for the apiprobe pipeline:
//! - [`HttpExecutor`]: sends test cases with reqwest
//! - [`OpenApiLoader`]: fetches and parses OpenAPI 3 / Swagger 2 documents
//! - [`ChatClient`]: OpenAI-compatible and Gemini chat completion
//! - LLM-backed case generator, decision oracle, assertion generator and analyst
//!
//! [`build_collaborators`] wires all of them from a [`ProbeConfig`].

mod http_executor;
mod llm;
mod llm_client;
mod openapi;
pub mod prompts;

pub use http_executor::{HttpExecutor, build_url, curl_command};
pub use llm::{
    LlmAnalyst, LlmAssertionGenerator, LlmCaseGenerator, LlmDecisionOracle, parse_assertions,
    parse_cases, parse_decision,
};
pub use llm_client::{ChatClient, ChatModel, WireFormat};
pub use openapi::{OpenApiLoader, RAW_PREVIEW_CHARS, endpoint_definition, parse_document};

use apiprobe_core::{Collaborators, ProbeConfig};
use apiprobe_proto::CollaboratorError;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Collaborators sharing one chat model, built from `config`.
pub fn build_collaborators(config: &ProbeConfig) -> Result<Collaborators, CollaboratorError> {
    let model: Arc<dyn ChatModel> = Arc::new(ChatClient::from_config(&config.llm)?);
    let connect = Duration::from_secs(config.http.connect_timeout_secs);
    let request = Duration::from_secs(config.http.request_timeout_secs);
    info!(
        provider = %config.llm.provider,
        model = config.llm.effective_model(),
        "Using LLM provider"
    );
    collaborators_with_model(model, connect, request)
}

/// Collaborators backed by `model` and real HTTP adapters.
pub fn collaborators_with_model(
    model: Arc<dyn ChatModel>,
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<Collaborators, CollaboratorError> {
    Ok(Collaborators {
        loader: Arc::new(OpenApiLoader::new(request_timeout)?),
        analyst: Arc::new(LlmAnalyst::new(Arc::clone(&model))),
        generator: Arc::new(LlmCaseGenerator::new(Arc::clone(&model))),
        oracle: Arc::new(LlmDecisionOracle::new(Arc::clone(&model))),
        fallback: Arc::new(LlmAssertionGenerator::new(model)),
        executor: Arc::new(HttpExecutor::new(connect_timeout, request_timeout)?),
    })
}
