//! Background task runner behind the Run API.
//!
//! Each submitted run executes on its own tokio task and owns its accumulators;
//! the only shared state is the [`TaskStore`].

use crate::pipeline::{Pipeline, RunReport, RunRequest};
use crate::task_store::{TaskRecord, TaskStatus, TaskStore};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task {task_id} is {status:?}, only COMPLETED tasks can be re-run")]
    NotCompleted { task_id: String, status: TaskStatus },
}

#[derive(Clone)]
pub struct TaskRunner {
    pipeline: Arc<Pipeline>,
    store: Arc<dyn TaskStore>,
}

impl TaskRunner {
    pub fn new(pipeline: Arc<Pipeline>, store: Arc<dyn TaskStore>) -> Self {
        Self { pipeline, store }
    }

    /// Starts a run in the background and returns its task id.
    pub fn submit(&self, request: RunRequest) -> String {
        let task_id = Uuid::new_v4().to_string();
        self.store.insert(TaskRecord::running(&task_id));
        info!(task_id = %task_id, swagger_url = %request.swagger_url, "Submitted run");

        let pipeline = Arc::clone(&self.pipeline);
        spawn_tracked(Arc::clone(&self.store), task_id.clone(), async move {
            pipeline.run(&request).await.map_err(|e| e.to_string())
        });
        task_id
    }

    /// Current record for `task_id`; unknown ids yield a `NOT_FOUND` record.
    pub fn status(&self, task_id: &str) -> TaskRecord {
        self.store
            .get(task_id)
            .unwrap_or_else(|| TaskRecord::not_found(task_id))
    }

    /// Re-executes every case of a completed task as a new task.
    ///
    /// The base URL is `base_url` when given, otherwise derived from the stored
    /// report (see [`derive_base_url`]).
    pub fn rerun(&self, task_id: &str, base_url: Option<String>) -> Result<String, RunnerError> {
        let record = self
            .store
            .get(task_id)
            .ok_or_else(|| RunnerError::NotFound(task_id.to_string()))?;
        let report = match (record.status, record.result) {
            (TaskStatus::Completed, Some(report)) => report,
            (status, _) => {
                return Err(RunnerError::NotCompleted {
                    task_id: task_id.to_string(),
                    status,
                });
            }
        };

        let base_url = derive_base_url(
            base_url.as_deref(),
            &report,
            &self.pipeline.config().default_base_url,
        );
        let new_id = Uuid::new_v4().to_string();
        self.store.insert(TaskRecord::running(&new_id));
        info!(task_id = %new_id, source = %task_id, base_url = %base_url, "Submitted rerun");

        let pipeline = Arc::clone(&self.pipeline);
        spawn_tracked(Arc::clone(&self.store), new_id.clone(), async move {
            Ok(pipeline.rerun(&report, &base_url).await)
        });
        Ok(new_id)
    }
}

/// Runs `work` on its own tokio task and records the outcome under `task_id`.
/// A panicking run is recorded as `FAILED` instead of staying `RUNNING`.
fn spawn_tracked<F>(store: Arc<dyn TaskStore>, task_id: String, work: F)
where
    F: Future<Output = Result<RunReport, String>> + Send + 'static,
{
    let handle = tokio::spawn(work);
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(report)) => {
                info!(task_id = %task_id, results = report.execution_results.len(), "Run completed");
                store.complete(&task_id, report);
            }
            Ok(Err(e)) => {
                error!(task_id = %task_id, error = %e, "Run failed");
                store.fail(&task_id, e);
            }
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Run aborted");
                store.fail(&task_id, format!("Run aborted: {e}"));
            }
        }
    });
}

/// Picks the base URL for a rerun: the explicit override, else the stored base
/// URL, else the origin of the first recorded request, else `default`.
pub fn derive_base_url(explicit: Option<&str>, report: &RunReport, default: &str) -> String {
    let non_blank = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.trim_end_matches('/').to_string())
    };

    explicit
        .and_then(&non_blank)
        .or_else(|| non_blank(&report.base_url))
        .or_else(|| {
            report
                .execution_results
                .first()
                .and_then(|r| reqwest::Url::parse(&r.url).ok())
                .map(|url| url.origin().ascii_serialization())
                .filter(|origin| origin != "null")
        })
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Collaborators, PipelineConfig};
    use crate::task_store::InMemoryTaskStore;
    use crate::testing::{
        EchoAnalyst, ScriptedExecutor, ScriptedOracle, StaticAssertionGenerator,
        StaticCaseGenerator, StaticLoader,
    };
    use apiprobe_proto::{
        ApiDocument, Assertion, CollaboratorError, DocumentLoader, Endpoint, ExecutionResult,
        TestCase,
    };
    use async_trait::async_trait;
    use std::time::Duration;

    /// Loader that panics, standing in for a bug anywhere inside a run.
    struct PanickingLoader;

    #[async_trait]
    impl DocumentLoader for PanickingLoader {
        async fn load(&self, _url: &str) -> Result<ApiDocument, CollaboratorError> {
            panic!("loader bug");
        }
    }

    fn runner(loader: StaticLoader, executor: Arc<ScriptedExecutor>) -> TaskRunner {
        runner_with_loader(Arc::new(loader), executor)
    }

    fn runner_with_loader(
        loader: Arc<dyn DocumentLoader>,
        executor: Arc<ScriptedExecutor>,
    ) -> TaskRunner {
        let collaborators = Collaborators {
            loader,
            analyst: Arc::new(EchoAnalyst::new()),
            generator: Arc::new(StaticCaseGenerator::new(vec![TestCase::new("list", "GET", "")])),
            oracle: Arc::new(ScriptedOracle::accepting(vec![Assertion::status_equals(200)], 3)),
            fallback: Arc::new(StaticAssertionGenerator::new(vec![])),
            executor,
        };
        let pipeline = Arc::new(Pipeline::new(collaborators, PipelineConfig::default()));
        TaskRunner::new(pipeline, Arc::new(InMemoryTaskStore::new()))
    }

    fn document() -> ApiDocument {
        ApiDocument {
            base_url: Some("http://api.test".to_string()),
            endpoints: vec![Endpoint::new("GET", "/users")],
            ..ApiDocument::default()
        }
    }

    async fn wait_finished(runner: &TaskRunner, task_id: &str) -> TaskRecord {
        for _ in 0..200 {
            let record = runner.status(task_id);
            if record.status.is_finished() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {task_id} did not finish");
    }

    #[tokio::test]
    async fn test_submit_completes() {
        let r = runner(StaticLoader::new(document()), Arc::new(ScriptedExecutor::new()));
        let id = r.submit(RunRequest {
            swagger_url: "http://api.test/doc".to_string(),
            ..RunRequest::default()
        });
        let record = wait_finished(&r, &id).await;
        assert_eq!(record.status, TaskStatus::Completed);
        assert_eq!(record.result.unwrap().execution_results.len(), 3);
    }

    #[tokio::test]
    async fn test_submit_records_fatal_error() {
        let r = runner(StaticLoader::failing("unreachable"), Arc::new(ScriptedExecutor::new()));
        let id = r.submit(RunRequest::default());
        let record = wait_finished(&r, &id).await;
        assert_eq!(record.status, TaskStatus::Failed);
        assert!(record.error.unwrap().contains("unreachable"));
    }

    #[tokio::test]
    async fn test_panicking_run_is_marked_failed() {
        let r = runner_with_loader(Arc::new(PanickingLoader), Arc::new(ScriptedExecutor::new()));
        let id = r.submit(RunRequest::default());
        let record = wait_finished(&r, &id).await;
        assert_eq!(record.status, TaskStatus::Failed);
        assert!(record.error.unwrap().starts_with("Run aborted"));
        assert!(record.end_time.is_some());
    }

    #[tokio::test]
    async fn test_unknown_task_status_is_not_found() {
        let r = runner(StaticLoader::new(document()), Arc::new(ScriptedExecutor::new()));
        assert_eq!(r.status("missing").status, TaskStatus::NotFound);
        assert!(matches!(r.rerun("missing", None), Err(RunnerError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rerun_completed_task_uses_override() {
        let executor = Arc::new(ScriptedExecutor::new());
        let r = runner(StaticLoader::new(document()), Arc::clone(&executor));
        let id = r.submit(RunRequest::default());
        wait_finished(&r, &id).await;

        let rerun_id = r.rerun(&id, Some("http://staging.test/".to_string())).unwrap();
        assert_ne!(rerun_id, id);
        let record = wait_finished(&r, &rerun_id).await;
        let report = record.result.unwrap();
        assert_eq!(report.base_url, "http://staging.test");
        assert_eq!(report.execution_results.len(), 3);
        assert!(executor.executed().iter().any(|(_, base)| base == "http://staging.test"));
    }

    #[tokio::test]
    async fn test_rerun_rejects_unfinished_task() {
        let r = runner(StaticLoader::new(document()), Arc::new(ScriptedExecutor::new()));
        r.store.insert(TaskRecord::running("busy"));
        let err = r.rerun("busy", None).unwrap_err();
        assert!(matches!(
            err,
            RunnerError::NotCompleted {
                status: TaskStatus::Running,
                ..
            }
        ));
    }

    // ========================================================================
    // Base URL derivation
    // ========================================================================

    #[test]
    fn test_derive_base_url_precedence() {
        let mut report = RunReport {
            base_url: "http://stored.test".to_string(),
            execution_results: vec![ExecutionResult::response(
                "c",
                "GET",
                "https://origin.test:8443/v1/users?x=1",
                200,
                "",
                1,
            )],
            ..RunReport::default()
        };
        let default = "http://localhost:8080";
        assert_eq!(
            derive_base_url(Some("http://override.test"), &report, default),
            "http://override.test"
        );
        assert_eq!(derive_base_url(Some("  "), &report, default), "http://stored.test");

        report.base_url.clear();
        assert_eq!(derive_base_url(None, &report, default), "https://origin.test:8443");

        report.execution_results.clear();
        assert_eq!(derive_base_url(None, &report, default), default);
    }
}
