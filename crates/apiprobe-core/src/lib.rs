//! # apiprobe-core
//!
//! Verification pipeline for HTTP APIs described by OpenAPI documents.
//!
//! This crate provides:
//! - The deterministic assertion evaluator and JSON-path resolver
//! - The local verifier that produces each result's final verdict
//! - The conformance decision loop (accept, adjust, flag abnormal, exhaust)
//! - The pipeline orchestrator over endpoints and quality scenarios
//! - Run metrics with nearest-rank percentiles
//! - The task registry and background runner behind the Run API
//! - YAML configuration with environment overrides

mod config;
mod decision_loop;
pub mod evaluator;
pub mod json_path;
pub mod metrics;
mod pipeline;
mod runner;
pub mod task_store;
pub mod testing;
mod text;
pub mod verifier;

pub use config::{
    ConfigError, DEFAULT_CONFIG_FILE, HttpSettings, LlmConfig, LlmProvider, PipelineSettings,
    ProbeConfig, ServerSettings, StoreSettings,
};
pub use decision_loop::{CaseDefaults, CaseVerdict, DecisionLoop, DecisionLoopConfig};
pub use evaluator::{AssertionOutcome, evaluate};
pub use metrics::{LabelStat, SummaryMetrics, percentile};
pub use pipeline::{
    Collaborators, Pipeline, PipelineConfig, PipelineError, RunReport, RunRequest, rerun_report,
};
pub use runner::{RunnerError, TaskRunner, derive_base_url};
pub use task_store::{
    InMemoryTaskStore, JsonTaskStore, StoreError, TaskRecord, TaskStatus, TaskStore,
};
pub use text::{strip_code_fences, truncate_with_ellipsis};
pub use verifier::verify;
