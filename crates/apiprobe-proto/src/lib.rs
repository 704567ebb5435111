//! # apiprobe-proto
//!
//! Shared types, error definitions, and traits for apiprobe.
//!
//! This crate provides the foundational abstractions used across all apiprobe
//! crates, including:
//! - The test data model: cases, assertions, execution results, scenarios
//! - Oracle decisions and API descriptions
//! - Collaborator traits for loaders, generators, oracles, executors and analysts

mod assertion;
mod case;
mod collaborator;
mod decision;
mod document;
mod error;
mod execution;
pub mod lenient;
mod scenario;

pub use assertion::{Assertion, AssertionKind, Operator};
pub use case::{ParamMap, TestCase};
pub use collaborator::{
    Analyst, AssertionGenerator, CaseGenerator, DecisionOracle, DocumentLoader, Executor,
};
pub use decision::{Decision, DecisionAction};
pub use document::{ApiDocument, Endpoint, ProgramContext};
pub use error::CollaboratorError;
pub use execution::{DecisionOutcome, ExecutionResult, TRANSPORT_FAILURE_STATUS, is_2xx};
pub use scenario::QualityScenario;
