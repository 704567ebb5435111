//! Scripted collaborators for tests.
//!
//! Every fake counts its calls so tests can assert on how often the pipeline
//! reached out. None of them touch the network.

use apiprobe_proto::{
    Analyst, ApiDocument, Assertion, AssertionGenerator, CaseGenerator, CollaboratorError,
    Decision, DecisionOracle, DocumentLoader, Endpoint, ExecutionResult, Executor,
    ProgramContext, QualityScenario, TestCase,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Oracle replaying a fixed list of replies, then failing.
///
/// `Err(message)` entries surface as [`CollaboratorError::Provider`].
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<Decision, String>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new(replies: Vec<Result<Decision, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Oracle that accepts every case with the given assertions.
    pub fn accepting(assertions: Vec<Assertion>, times: usize) -> Self {
        Self::new(
            (0..times)
                .map(|_| Ok(Decision::accept("conforms", assertions.clone())))
                .collect(),
        )
    }

    /// Sleeps before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Case names in consultation order.
    pub fn seen_cases(&self) -> Vec<String> {
        lock(&self.seen).clone()
    }
}

#[async_trait]
impl DecisionOracle for ScriptedOracle {
    async fn decide(
        &self,
        case: &TestCase,
        _result: &ExecutionResult,
        _endpoint: &Endpoint,
    ) -> Result<Decision, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.seen).push(case.name.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = lock(&self.replies).pop_front();
        match reply {
            Some(Ok(decision)) => Ok(decision),
            Some(Err(message)) => Err(CollaboratorError::Provider(message)),
            None => Err(CollaboratorError::Provider("script exhausted".to_string())),
        }
    }
}

/// Case generator returning canned cases per (endpoint label, scenario).
#[derive(Default)]
pub struct StaticCaseGenerator {
    default_cases: Vec<TestCase>,
    by_key: HashMap<(String, QualityScenario), Result<Vec<TestCase>, String>>,
    calls: AtomicUsize,
}

impl StaticCaseGenerator {
    /// Returns `cases` for every pair without a specific entry.
    pub fn new(cases: Vec<TestCase>) -> Self {
        Self {
            default_cases: cases,
            ..Self::default()
        }
    }

    pub fn with(
        mut self,
        endpoint_label: &str,
        scenario: QualityScenario,
        cases: Vec<TestCase>,
    ) -> Self {
        self.by_key
            .insert((endpoint_label.to_string(), scenario), Ok(cases));
        self
    }

    pub fn failing(mut self, endpoint_label: &str, scenario: QualityScenario, message: &str) -> Self {
        self.by_key.insert(
            (endpoint_label.to_string(), scenario),
            Err(message.to_string()),
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaseGenerator for StaticCaseGenerator {
    async fn generate_cases(
        &self,
        _program: &ProgramContext,
        endpoint: &Endpoint,
        scenario: QualityScenario,
    ) -> Result<Vec<TestCase>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.by_key.get(&(endpoint.label(), scenario)) {
            Some(Ok(cases)) => Ok(cases.clone()),
            Some(Err(message)) => Err(CollaboratorError::Provider(message.clone())),
            None => Ok(self.default_cases.clone()),
        }
    }
}

enum Canned {
    Respond { status: i32, body: String },
    Fail(String),
}

/// Executor answering by case name; unknown cases get `200 {}`.
#[derive(Default)]
pub struct ScriptedExecutor {
    canned: HashMap<String, Canned>,
    calls: AtomicUsize,
    executed: Mutex<Vec<(String, String)>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, case_name: &str, status: i32, body: &str) -> Self {
        self.canned.insert(
            case_name.to_string(),
            Canned::Respond {
                status,
                body: body.to_string(),
            },
        );
        self
    }

    /// Makes `execute` return an error for `case_name`.
    pub fn fail(mut self, case_name: &str, message: &str) -> Self {
        self.canned
            .insert(case_name.to_string(), Canned::Fail(message.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(case name, base url)` pairs in execution order.
    pub fn executed(&self) -> Vec<(String, String)> {
        lock(&self.executed).clone()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn execute(
        &self,
        case: &TestCase,
        base_url: &str,
    ) -> Result<ExecutionResult, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.executed).push((case.name.clone(), base_url.to_string()));
        let url = format!("{}{}", base_url.trim_end_matches('/'), case.path);
        match self.canned.get(&case.name) {
            Some(Canned::Fail(message)) => Err(CollaboratorError::InvalidRequest(message.clone())),
            Some(Canned::Respond { status, body }) => Ok(ExecutionResult::response(
                &case.name,
                &case.method,
                url,
                *status,
                body.as_str(),
                5,
            )),
            None => Ok(ExecutionResult::response(&case.name, &case.method, url, 200, "{}", 5)),
        }
    }
}

/// Loader returning a fixed document, or a fixed error.
pub struct StaticLoader {
    document: Result<ApiDocument, String>,
    calls: AtomicUsize,
}

impl StaticLoader {
    pub fn new(document: ApiDocument) -> Self {
        Self {
            document: Ok(document),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            document: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentLoader for StaticLoader {
    async fn load(&self, _url: &str) -> Result<ApiDocument, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.document
            .clone()
            .map_err(CollaboratorError::Http)
    }
}

/// Analyst that echoes its inputs back, optionally failing every call.
#[derive(Default)]
pub struct EchoAnalyst {
    failing: bool,
    calls: AtomicUsize,
}

impl EchoAnalyst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyst for EchoAnalyst {
    async fn describe_api(
        &self,
        program: &ProgramContext,
        document: &ApiDocument,
    ) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(CollaboratorError::Provider("analyst offline".to_string()));
        }
        Ok(format!(
            "{} exposes {} endpoints",
            program.program_name,
            document.endpoints.len()
        ))
    }

    async fn analyze_run(
        &self,
        _program: &ProgramContext,
        digest: &str,
    ) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(CollaboratorError::Provider("analyst offline".to_string()));
        }
        Ok(format!("Analysis:\n{digest}"))
    }
}

/// Fallback assertion generator returning a fixed list.
pub struct StaticAssertionGenerator {
    assertions: Vec<Assertion>,
    calls: AtomicUsize,
}

impl StaticAssertionGenerator {
    pub fn new(assertions: Vec<Assertion>) -> Self {
        Self {
            assertions,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssertionGenerator for StaticAssertionGenerator {
    async fn generate_assertions(
        &self,
        _case: &TestCase,
        _result: &ExecutionResult,
        _endpoint: &Endpoint,
    ) -> Result<Vec<Assertion>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.assertions.clone())
    }
}
