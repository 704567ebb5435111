//! Traits for the services the pipeline consumes.
//!
//! Each trait is a plain request/response contract. Implementations may be
//! remote models, deterministic rule engines, or scripted fakes; the pipeline
//! imposes its own timeouts around every call.

use crate::assertion::Assertion;
use crate::case::TestCase;
use crate::decision::Decision;
use crate::document::{ApiDocument, Endpoint, ProgramContext};
use crate::error::CollaboratorError;
use crate::execution::ExecutionResult;
use crate::scenario::QualityScenario;
use async_trait::async_trait;

/// Retrieves and parses an API description.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<ApiDocument, CollaboratorError>;
}

/// Produces test cases for one (endpoint, scenario) pair.
///
/// An empty list is a deliberate skip, e.g. a happy-path case that would need
/// a resource id nobody can know in advance.
#[async_trait]
pub trait CaseGenerator: Send + Sync {
    async fn generate_cases(
        &self,
        program: &ProgramContext,
        endpoint: &Endpoint,
        scenario: QualityScenario,
    ) -> Result<Vec<TestCase>, CollaboratorError>;
}

/// Judges whether an observed response conforms to the case's intent.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(
        &self,
        case: &TestCase,
        result: &ExecutionResult,
        endpoint: &Endpoint,
    ) -> Result<Decision, CollaboratorError>;
}

/// Produces assertions for an observed response without judging it.
#[async_trait]
pub trait AssertionGenerator: Send + Sync {
    async fn generate_assertions(
        &self,
        case: &TestCase,
        result: &ExecutionResult,
        endpoint: &Endpoint,
    ) -> Result<Vec<Assertion>, CollaboratorError>;
}

/// Runs one test case against a base URL.
///
/// Network failures are reported inside the result (status `-1`); `Err` is
/// reserved for requests that cannot be built at all.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        case: &TestCase,
        base_url: &str,
    ) -> Result<ExecutionResult, CollaboratorError>;
}

/// Produces natural-language texts about the API and about a finished run.
#[async_trait]
pub trait Analyst: Send + Sync {
    /// Understanding text for the loaded document.
    async fn describe_api(
        &self,
        program: &ProgramContext,
        document: &ApiDocument,
    ) -> Result<String, CollaboratorError>;

    /// Final analysis of a run, given a rendered digest of its cases and metrics.
    async fn analyze_run(
        &self,
        program: &ProgramContext,
        digest: &str,
    ) -> Result<String, CollaboratorError>;
}
