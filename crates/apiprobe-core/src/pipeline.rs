//! Pipeline orchestration.
//!
//! A run walks every (endpoint, scenario) pair in order, generating cases,
//! executing them and driving each through the [`DecisionLoop`]. Work within a
//! run is strictly sequential. A failure inside one pair is logged and the run
//! moves on; only a failure to load the API document is fatal.

use crate::decision_loop::{
    CaseDefaults, DecisionLoop, DecisionLoopConfig, execution_failure, with_timeout,
};
use crate::metrics::SummaryMetrics;
use crate::verifier::verify;
use apiprobe_proto::{
    Analyst, AssertionGenerator, CaseGenerator, CollaboratorError, DecisionOracle,
    DocumentLoader, Endpoint, ExecutionResult, Executor, ProgramContext, QualityScenario,
    TestCase,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that fail a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to load API document: {0}")]
    Document(#[source] CollaboratorError),
}

/// The external services a pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub loader: Arc<dyn DocumentLoader>,
    pub analyst: Arc<dyn Analyst>,
    pub generator: Arc<dyn CaseGenerator>,
    pub oracle: Arc<dyn DecisionOracle>,
    pub fallback: Arc<dyn AssertionGenerator>,
    pub executor: Arc<dyn Executor>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub decision: DecisionLoopConfig,
    /// Limit for case generation, document loading and analysis calls.
    pub generator_timeout: Duration,
    /// Used when the document yields no base URL.
    pub default_base_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decision: DecisionLoopConfig::default(),
            generator_timeout: Duration::from_secs(300),
            default_base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Parameters of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default)]
    pub swagger_url: String,
    #[serde(default)]
    pub program_name: String,
    /// Additional free-text testing requirements.
    #[serde(default)]
    pub extra: String,
    /// Only endpoints carrying one of these tags are tested. Empty means all.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Bearer token injected into every case.
    #[serde(default)]
    pub authorization: Option<String>,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub base_url: String,
    #[serde(default)]
    pub api_understanding: String,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub execution_results: Vec<ExecutionResult>,
    #[serde(default)]
    pub metrics: SummaryMetrics,
    #[serde(default)]
    pub summary: String,
}

/// Per-run accumulators.
#[derive(Default)]
struct Accumulator {
    cases: Vec<TestCase>,
    results: Vec<ExecutionResult>,
}

pub struct Pipeline {
    collaborators: Collaborators,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, config: PipelineConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the full pipeline for `request`.
    pub async fn run(&self, request: &RunRequest) -> Result<RunReport, PipelineError> {
        let c = &self.collaborators;
        info!(swagger_url = %request.swagger_url, program = %request.program_name, "Starting run");

        let document = with_timeout(
            self.config.generator_timeout,
            c.loader.load(&request.swagger_url),
        )
        .await
        .map_err(PipelineError::Document)?;

        let base_url = match document.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => {
                warn!(default = %self.config.default_base_url, "Document has no base URL, using default");
                self.config.default_base_url.clone()
            }
        };

        let mut program = ProgramContext {
            program_name: request.program_name.clone(),
            extra_requirements: request.extra.clone(),
            api_understanding: String::new(),
        };
        let understanding = with_timeout(
            self.config.generator_timeout,
            c.analyst.describe_api(&program, &document),
        )
        .await;
        program.api_understanding = match understanding {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => document.outline.clone(),
            Err(e) => {
                warn!(error = %e, "API description failed, using endpoint outline");
                document.outline.clone()
            }
        };

        let endpoints: Vec<&Endpoint> = document
            .endpoints
            .iter()
            .filter(|e| e.matches_tags(&request.tags))
            .collect();
        info!(
            endpoints = endpoints.len(),
            total = document.endpoints.len(),
            base_url = %base_url,
            "Testing endpoints"
        );

        let defaults = CaseDefaults::new(request.authorization.clone());
        let decision_loop = DecisionLoop::new(
            c.oracle.as_ref(),
            c.fallback.as_ref(),
            c.executor.as_ref(),
            self.config.decision.clone(),
        );
        let mut acc = Accumulator::default();

        for endpoint in endpoints {
            for scenario in QualityScenario::ALL {
                if let Err(e) = self
                    .run_pair(&decision_loop, &program, endpoint, scenario, &defaults, &base_url, &mut acc)
                    .await
                {
                    warn!(
                        endpoint = %endpoint.label(),
                        scenario = %scenario,
                        error = %e,
                        "Skipping endpoint scenario after generation failure"
                    );
                }
            }
        }

        let metrics = SummaryMetrics::from_results(&acc.results);
        let digest = metrics.digest();
        let analysis = with_timeout(
            self.config.generator_timeout,
            c.analyst.analyze_run(&program, &digest),
        )
        .await;
        let summary = match analysis {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => digest,
            Err(e) => {
                warn!(error = %e, "Run analysis failed, using local digest");
                digest
            }
        };

        info!(
            cases = acc.cases.len(),
            results = metrics.total,
            failed = metrics.fail,
            "Run finished"
        );
        Ok(RunReport {
            base_url,
            api_understanding: program.api_understanding,
            test_cases: acc.cases,
            execution_results: acc.results,
            metrics,
            summary,
        })
    }

    async fn run_pair(
        &self,
        decision_loop: &DecisionLoop<'_>,
        program: &ProgramContext,
        endpoint: &Endpoint,
        scenario: QualityScenario,
        defaults: &CaseDefaults,
        base_url: &str,
        acc: &mut Accumulator,
    ) -> Result<(), CollaboratorError> {
        let cases = with_timeout(
            self.config.generator_timeout,
            self.collaborators
                .generator
                .generate_cases(program, endpoint, scenario),
        )
        .await?;
        if cases.is_empty() {
            debug!(endpoint = %endpoint.label(), scenario = %scenario, "No cases generated");
            return Ok(());
        }

        for mut case in cases {
            case.assertions.clear();
            case.scenario = Some(scenario);
            defaults.apply(&mut case, endpoint);

            let mut result = match decision_loop.execute(&case, base_url).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        endpoint = %endpoint.label(),
                        scenario = %scenario,
                        case = %case.name,
                        error = %e,
                        "Case execution failed, recording transport failure"
                    );
                    let mut result = execution_failure(&case, base_url, &e);
                    verify(&case, &mut result);
                    acc.cases.push(case);
                    acc.results.push(result);
                    continue;
                }
            };
            result.scenario = Some(scenario);
            result.tags = case.tags.clone();
            debug!(case = %case.name, status = result.status_code, "Executed case");

            let verdict = decision_loop
                .run(case, result, endpoint, defaults, base_url)
                .await;
            acc.cases.extend(verdict.cases);
            acc.results.extend(verdict.results);
        }
        Ok(())
    }

    /// Re-executes stored cases against `base_url` with this pipeline's
    /// executor. See [`rerun_report`].
    pub async fn rerun(&self, previous: &RunReport, base_url: &str) -> RunReport {
        rerun_report(
            self.collaborators.executor.as_ref(),
            previous,
            base_url,
            self.config.decision.executor_timeout,
        )
        .await
    }
}

/// Re-executes the cases of `previous` against `base_url`.
///
/// Each case is verified against its persisted assertions. No generator,
/// oracle or analyst is consulted, and `previous` is left untouched.
pub async fn rerun_report(
    executor: &dyn Executor,
    previous: &RunReport,
    base_url: &str,
    limit: Duration,
) -> RunReport {
    let mut results = Vec::with_capacity(previous.test_cases.len());
    for (i, case) in previous.test_cases.iter().enumerate() {
        let mut result = match with_timeout(limit, executor.execute(case, base_url)).await {
            Ok(r) => r,
            Err(e) => {
                warn!(case = %case.name, error = %e, "Re-execution failed");
                execution_failure(case, base_url, &e)
            }
        };
        // Older reports keep the scenario only on results, aligned with cases.
        result.scenario = case.scenario.or_else(|| {
            previous
                .execution_results
                .get(i)
                .filter(|r| r.case_name == case.name)
                .and_then(|r| r.scenario)
        });
        result.tags = case.tags.clone();
        result.assertions = case.assertions.clone();
        verify(case, &mut result);
        results.push(result);
    }

    let metrics = SummaryMetrics::from_results(&results);
    info!(cases = results.len(), failed = metrics.fail, base_url, "Rerun finished");
    RunReport {
        base_url: base_url.to_string(),
        api_understanding: previous.api_understanding.clone(),
        test_cases: previous.test_cases.clone(),
        execution_results: results,
        summary: metrics.digest(),
        metrics,
    }
}
