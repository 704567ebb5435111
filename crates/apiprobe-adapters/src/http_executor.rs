//! HTTP executor backed by reqwest.
//!
//! Builds the request URL from the base URL, the case path, its path
//! parameters and query parameters, sends it, and records status, body and
//! wall-clock duration. Network failures become results with status `-1`
//! rather than errors; only requests that cannot be built return `Err`.

use apiprobe_proto::{CollaboratorError, ExecutionResult, Executor, ParamMap, TestCase};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Url};
use std::time::{Duration, Instant};
use tracing::debug;

/// Methods that carry a request body.
const BODY_METHODS: [&str; 3] = ["POST", "PUT", "PATCH"];

pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| CollaboratorError::Http(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// Substitutes `{name}` path parameters, joins `base_url` and the path with a
/// single `/`, and appends URL-encoded query parameters in insertion order.
///
/// Path parameter values are percent-encoded as single segments, so a value
/// containing `/`, `?` or `#` cannot change the shape of the URL.
pub fn build_url(base_url: &str, case: &TestCase) -> Result<Url, CollaboratorError> {
    let mut url = Url::parse(base_url.trim()).map_err(|e| {
        CollaboratorError::InvalidRequest(format!("invalid base URL '{base_url}': {e}"))
    })?;
    let (template, literal_query) = case
        .path
        .split_once('?')
        .unwrap_or((case.path.as_str(), ""));

    {
        let mut segments = url.path_segments_mut().map_err(|()| {
            CollaboratorError::InvalidRequest(format!("base URL '{base_url}' cannot carry a path"))
        })?;
        segments.pop_if_empty();
        for segment in template.trim_start_matches('/').split('/') {
            segments.push(&substitute(segment, &case.path_params));
        }
    }

    if !literal_query.is_empty() {
        url.set_query(Some(literal_query));
    }
    if !case.query_params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &case.query_params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

fn substitute(segment: &str, params: &ParamMap) -> String {
    params
        .iter()
        .fold(segment.to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{name}}}"), value)
        })
}

fn requires_body(method: &str) -> bool {
    BODY_METHODS.contains(&method)
}

/// Single-quotes `s` for a POSIX shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Equivalent curl invocation for reproducing a request by hand.
pub fn curl_command(method: &str, url: &str, case: &TestCase) -> String {
    let mut parts = vec![
        "curl".to_string(),
        "-X".to_string(),
        method.to_string(),
        shell_quote(url),
    ];
    for (key, value) in &case.headers {
        parts.push("-H".to_string());
        parts.push(shell_quote(&format!("{key}: {value}")));
    }
    if requires_body(method) {
        if case.header("Content-Type").is_none() {
            parts.push("-H".to_string());
            parts.push(shell_quote("Content-Type: application/json"));
        }
        parts.push("--data".to_string());
        parts.push(shell_quote(&case.body));
    }
    parts.join(" ")
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(
        &self,
        case: &TestCase,
        base_url: &str,
    ) -> Result<ExecutionResult, CollaboratorError> {
        let method_name = case.method.trim().to_uppercase();
        let method = Method::from_bytes(method_name.as_bytes()).map_err(|_| {
            CollaboratorError::InvalidRequest(format!("invalid HTTP method '{}'", case.method))
        })?;
        let url = build_url(base_url, case)?;
        let url_text = url.to_string();
        let curl = curl_command(&method_name, &url_text, case);

        let mut request = self.client.request(method, url);
        for (key, value) in &case.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if requires_body(&method_name) {
            if case.header("Content-Type").is_none() {
                request = request.header(CONTENT_TYPE, "application/json");
            }
            request = request.body(case.body.clone());
        }

        debug!(case = %case.name, method = %method_name, url = %url_text, "Sending request");
        let started = Instant::now();
        let mut result = match request.send().await {
            Ok(response) => {
                let status = i32::from(response.status().as_u16());
                let body = response.text().await;
                let duration_ms = started.elapsed().as_millis() as u64;
                match body {
                    Ok(text) => ExecutionResult::response(
                        &case.name, &method_name, &url_text, status, text, duration_ms,
                    ),
                    Err(e) => {
                        let mut r = ExecutionResult::response(
                            &case.name, &method_name, &url_text, status, "", duration_ms,
                        );
                        r.error_message = Some(format!("failed to read body: {e}"));
                        r
                    }
                }
            }
            Err(e) if e.is_builder() => {
                return Err(CollaboratorError::InvalidRequest(e.to_string()));
            }
            Err(e) => ExecutionResult::transport_failure(
                &case.name,
                &method_name,
                &url_text,
                started.elapsed().as_millis() as u64,
                e.to_string(),
            ),
        };
        result.curl_command = curl;
        result.tags = case.tags.clone();
        Ok(result)
    }
}
