//! Conformance decision loop.
//!
//! Drives one executed case from `PENDING` to a terminal [`DecisionOutcome`]:
//!
//! - `ACCEPTED`: the oracle judged the response conforming and supplied assertions
//! - `ADJUSTED`: the oracle proposed a replacement case, which was executed once
//!   and judged once; the original result always fails
//! - `ABNORMAL`: the oracle flagged the interface
//! - `EXHAUSTED`: the retry budget ran out; assertions come from the one-shot
//!   fallback generator, if it produces any
//!
//! Oracle failures, timeouts and inconclusive answers each consume one attempt.
//! Every result leaving the loop has been verified exactly once.

use crate::verifier::verify;
use apiprobe_proto::{
    AssertionGenerator, CollaboratorError, Decision, DecisionAction, DecisionOracle,
    DecisionOutcome, Endpoint, ExecutionResult, Executor, TestCase,
};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry budget and timeouts for the loop.
#[derive(Debug, Clone)]
pub struct DecisionLoopConfig {
    /// Oracle consultations allowed for the original case.
    pub max_retries: u32,
    pub oracle_timeout: Duration,
    pub executor_timeout: Duration,
}

impl Default for DecisionLoopConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            oracle_timeout: Duration::from_secs(300),
            executor_timeout: Duration::from_secs(90),
        }
    }
}

/// Fixed request policy applied to every case before execution, including
/// adjusted cases.
#[derive(Debug, Clone, Default)]
pub struct CaseDefaults {
    /// Bearer token. A value already starting with `Bearer ` is used as is.
    pub authorization: Option<String>,
}

impl CaseDefaults {
    pub fn new(authorization: Option<String>) -> Self {
        Self { authorization }
    }

    /// Injects the authorization header and endpoint tags, and fills an empty
    /// method or path from the endpoint. A case that already carries an
    /// `Authorization` header keeps it.
    pub fn apply(&self, case: &mut TestCase, endpoint: &Endpoint) {
        if case.method.trim().is_empty() {
            case.method = endpoint.method.clone();
        } else {
            case.method = case.method.trim().to_uppercase();
        }
        if case.path.trim().is_empty() {
            case.path = endpoint.path.clone();
        }
        if !endpoint.tags.is_empty() {
            case.tags = endpoint.tags.clone();
        }

        let Some(token) = self
            .authorization
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            return;
        };
        if case.header("Authorization").is_some() {
            return;
        }
        let has_scheme = token
            .get(..7)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("bearer "));
        let value = if has_scheme {
            token.to_string()
        } else {
            format!("Bearer {token}")
        };
        case.headers.insert("Authorization".to_string(), value);
    }
}

/// Terminal output of the loop for one original case.
#[derive(Debug, Clone)]
pub struct CaseVerdict {
    pub outcome: DecisionOutcome,
    /// The original case, followed by the adjusted case when one was run.
    pub cases: Vec<TestCase>,
    /// One verified result per entry in `cases`.
    pub results: Vec<ExecutionResult>,
    /// Oracle consultations spent, including the adjusted-case consultation.
    pub oracle_calls: u32,
}

/// The conformance state machine.
pub struct DecisionLoop<'a> {
    oracle: &'a dyn DecisionOracle,
    fallback: &'a dyn AssertionGenerator,
    executor: &'a dyn Executor,
    config: DecisionLoopConfig,
}

impl<'a> DecisionLoop<'a> {
    pub fn new(
        oracle: &'a dyn DecisionOracle,
        fallback: &'a dyn AssertionGenerator,
        executor: &'a dyn Executor,
        config: DecisionLoopConfig,
    ) -> Self {
        Self {
            oracle,
            fallback,
            executor,
            config,
        }
    }

    /// Executes `case` against `base_url` under the executor timeout.
    pub async fn execute(
        &self,
        case: &TestCase,
        base_url: &str,
    ) -> Result<ExecutionResult, CollaboratorError> {
        with_timeout(
            self.config.executor_timeout,
            self.executor.execute(case, base_url),
        )
        .await
    }

    /// Runs the loop for an already executed `case`.
    pub async fn run(
        &self,
        mut case: TestCase,
        mut result: ExecutionResult,
        endpoint: &Endpoint,
        defaults: &CaseDefaults,
        base_url: &str,
    ) -> CaseVerdict {
        let mut oracle_calls = 0;
        let mut attempt = 0;

        while attempt < self.config.max_retries {
            attempt += 1;
            oracle_calls += 1;

            let decision = match self.consult(&case, &result, endpoint).await {
                Ok(d) => d,
                Err(e) => {
                    warn!(case = %case.name, attempt, error = %e, "Oracle consultation failed");
                    continue;
                }
            };

            if decision.conforms {
                if decision.assertions.is_empty() {
                    debug!(case = %case.name, attempt, "Conforming decision without assertions, retrying");
                    continue;
                }
                debug!(case = %case.name, attempt, "PENDING -> ACCEPTED");
                attach(&mut case, &mut result, decision.assertions, decision.reason);
                return finish(DecisionOutcome::Accepted, vec![(case, result)], oracle_calls);
            }

            match decision.action {
                DecisionAction::AdjustCase => {
                    let Some(adjusted) = decision.adjusted_case else {
                        warn!(case = %case.name, attempt, "adjust_case decision without adjustedCase");
                        continue;
                    };
                    debug!(case = %case.name, attempt, "PENDING -> ADJUSTED");
                    oracle_calls += 1;
                    let pairs = self
                        .adjust(case, result, adjusted, &decision.reason, endpoint, defaults, base_url)
                        .await;
                    return finish(DecisionOutcome::Adjusted, pairs, oracle_calls);
                }
                DecisionAction::MarkAbnormal => {
                    debug!(case = %case.name, attempt, "PENDING -> ABNORMAL");
                    mark_abnormal(&mut result, decision.abnormal_description, &decision.reason);
                    return finish(DecisionOutcome::Abnormal, vec![(case, result)], oracle_calls);
                }
                DecisionAction::None | DecisionAction::Unrecognized(_) => {
                    warn!(
                        case = %case.name,
                        attempt,
                        action = decision.action.as_str(),
                        "Non-conforming decision without a usable action"
                    );
                }
            }
        }

        debug!(case = %case.name, attempts = attempt, "PENDING -> EXHAUSTED");
        match with_timeout(
            self.config.oracle_timeout,
            self.fallback.generate_assertions(&case, &result, endpoint),
        )
        .await
        {
            Ok(assertions) if !assertions.is_empty() => {
                attach(
                    &mut case,
                    &mut result,
                    assertions,
                    "Assertions generated after the decision budget ran out".to_string(),
                );
            }
            Ok(_) => debug!(case = %case.name, "Fallback produced no assertions"),
            Err(e) => warn!(case = %case.name, error = %e, "Fallback assertion generation failed"),
        }
        finish(DecisionOutcome::Exhausted, vec![(case, result)], oracle_calls)
    }

    async fn consult(
        &self,
        case: &TestCase,
        result: &ExecutionResult,
        endpoint: &Endpoint,
    ) -> Result<Decision, CollaboratorError> {
        with_timeout(
            self.config.oracle_timeout,
            self.oracle.decide(case, result, endpoint),
        )
        .await
    }

    /// Runs the single adjusted-case generation. Never re-enters the retry loop.
    async fn adjust(
        &self,
        original: TestCase,
        mut original_result: ExecutionResult,
        mut adjusted: TestCase,
        reason: &str,
        endpoint: &Endpoint,
        defaults: &CaseDefaults,
        base_url: &str,
    ) -> Vec<(TestCase, ExecutionResult)> {
        if adjusted.name.trim().is_empty() {
            adjusted.name = format!("{} (adjusted)", original.name);
        }
        adjusted.assertions.clear();
        adjusted.scenario = original.scenario;
        defaults.apply(&mut adjusted, endpoint);

        let mut adjusted_result = match self.execute(&adjusted, base_url).await {
            Ok(r) => r,
            Err(e) => {
                warn!(case = %adjusted.name, error = %e, "Adjusted case execution failed");
                execution_failure(&adjusted, base_url, &e)
            }
        };
        adjusted_result.scenario = original_result.scenario;
        adjusted_result.tags = adjusted.tags.clone();

        match self.consult(&adjusted, &adjusted_result, endpoint).await {
            Ok(d) if d.conforms => {
                attach(&mut adjusted, &mut adjusted_result, d.assertions, d.reason);
                adjusted_result.decision = Some(DecisionOutcome::Accepted);
            }
            Ok(d) => {
                mark_abnormal(&mut adjusted_result, d.abnormal_description, &d.reason);
                adjusted_result.decision = Some(DecisionOutcome::Abnormal);
            }
            Err(e) => {
                warn!(case = %adjusted.name, error = %e, "Oracle failed on adjusted case");
                mark_abnormal(
                    &mut adjusted_result,
                    None,
                    &format!("No decision for adjusted case: {e}"),
                );
                adjusted_result.decision = Some(DecisionOutcome::Abnormal);
            }
        }
        verify(&adjusted, &mut adjusted_result);

        original_result.case_adjusted = true;
        original_result.adjustment_note = if reason.trim().is_empty() {
            format!("Case adjusted; re-executed as '{}'", adjusted.name)
        } else {
            format!("Case adjusted ({reason}); re-executed as '{}'", adjusted.name)
        };

        vec![(original, original_result), (adjusted, adjusted_result)]
    }
}

pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| CollaboratorError::Timeout(limit))?
}

/// Result recorded for a case whose execution returned an error instead of a
/// response.
pub(crate) fn execution_failure(
    case: &TestCase,
    base_url: &str,
    error: &CollaboratorError,
) -> ExecutionResult {
    let mut result = ExecutionResult::transport_failure(
        case.name.clone(),
        case.method.clone(),
        format!("{}{}", base_url.trim_end_matches('/'), case.path),
        0,
        error.to_string(),
    );
    result.tags = case.tags.clone();
    result.scenario = case.scenario;
    result
}

fn attach(
    case: &mut TestCase,
    result: &mut ExecutionResult,
    assertions: Vec<apiprobe_proto::Assertion>,
    reason: String,
) {
    result.assertions = assertions.clone();
    result.assertion_reason = reason;
    case.assertions = assertions;
}

fn mark_abnormal(result: &mut ExecutionResult, description: Option<String>, reason: &str) {
    result.interface_abnormal = true;
    result.abnormal_description = description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| reason.to_string());
}

/// Stamps the outcome on the first result, verifies every result not yet
/// verified, and packs the verdict.
fn finish(
    outcome: DecisionOutcome,
    pairs: Vec<(TestCase, ExecutionResult)>,
    oracle_calls: u32,
) -> CaseVerdict {
    let mut cases = Vec::with_capacity(pairs.len());
    let mut results = Vec::with_capacity(pairs.len());
    for (i, (case, mut result)) in pairs.into_iter().enumerate() {
        if i == 0 {
            result.decision = Some(outcome);
            verify(&case, &mut result);
        }
        cases.push(case);
        results.push(result);
    }
    CaseVerdict {
        outcome,
        cases,
        results,
        oracle_calls,
    }
}
