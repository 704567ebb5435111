//! Prompt builders for the LLM-backed collaborators.
//!
//! Each builder returns the system prompt as a constant and renders the user
//! prompt from the call's inputs. Replies are always requested as bare JSON.

use apiprobe_core::truncate_with_ellipsis;
use apiprobe_proto::{
    ApiDocument, Endpoint, ExecutionResult, ProgramContext, QualityScenario, TestCase,
};

/// Response bodies longer than this are truncated before being sent to a model.
pub const MAX_BODY_CHARS: usize = 4_000;

pub const CASE_SYSTEM: &str = r#"You are a senior API test engineer. Design HTTP test cases for a single endpoint.
Rules:
- Follow the OpenAPI definition strictly: parameter names, locations, types and constraints must match it.
- Fields that look like phone numbers get a random 11-digit number.
- Every case must serve the requested quality scenario.
- HAPPY_PATH only: if the call needs the id of an existing resource and none is known, skip it and return {"cases": []}.
- Never skip for PARAM_INTEGRITY or ABNORMAL_INPUT.
- "body" is always a string holding the serialized request body, or "" when there is none.
Output raw JSON only, no markdown, in exactly this shape:
{"cases":[{"name":"...","method":"GET","path":"/resource/{id}","headers":{},"queryParams":{},"pathParams":{},"body":"","goal":"..."}]}"#;

pub const ASSERTION_SYSTEM: &str = r#"You are an API test engineer writing assertions for an executed request.
Allowed assertion types: statusCode, bodyContains, jsonPath, responseTime.
Allowed operators: equals, contains, notContains, greaterThan, lessThan.
"expression" is only used by jsonPath and is a path such as $.data.items[0].id.
Check business result codes in the body even when the HTTP status is 200.
Output a pure JSON array, no markdown. Example:
[{"type":"statusCode","operator":"equals","expected":"200","successMessage":"status is 200","failureMessage":"unexpected status"},
 {"type":"jsonPath","expression":"$.code","operator":"equals","expected":"0","successMessage":"business code ok","failureMessage":"business code is not 0"}]"#;

pub const DECISION_SYSTEM: &str = r#"You judge whether an executed API test case behaved as its goal and the endpoint definition require, and you write its assertions.
Reply with exactly one JSON object, no markdown:
{"conforms": true|false,
 "reason": "short explanation",
 "action": "none" | "adjust_case" | "mark_abnormal",
 "assertions": [{"type":"statusCode|bodyContains|jsonPath|responseTime","expression":"$.path (jsonPath only)","operator":"equals|contains|notContains|greaterThan|lessThan","expected":"...","successMessage":"...","failureMessage":"..."}],
 "adjustedCase": {"name":"...","method":"...","path":"...","headers":{},"queryParams":{},"pathParams":{},"body":"","goal":"..."},
 "abnormalDescription": "..."}
When conforms is true, action is "none" and assertions must describe the observed, correct behaviour.
When conforms is false, either the case itself was wrong (action "adjust_case" with a corrected adjustedCase)
or the interface misbehaved (action "mark_abnormal" with abnormalDescription)."#;

pub const UNDERSTANDING_SYSTEM: &str = "You are an API analyst. Summarise the API for the testers who will exercise it. \
Cover: the base server, the number of endpoints, the parameters of each endpoint, which endpoints take a request body, \
and whether authentication is required (name the token endpoint if there is one). Plain text, concise.";

pub const ANALYSIS_SYSTEM: &str = "You are a QA lead reviewing the results of an automated API test run. \
Explain the likely causes of each failing group with a concrete suggestion, state what the passing groups prove, \
and recommend a retry or optimisation strategy. Plain text, concise.";

fn scenario_guidance(scenario: QualityScenario) -> &'static str {
    match scenario {
        QualityScenario::HappyPath => {
            "Normal calls with valid parameters that the endpoint should accept."
        }
        QualityScenario::ParamIntegrity => {
            "Missing required parameters, empty values and wrongly typed values."
        }
        QualityScenario::AbnormalInput => {
            "Overlong strings, special characters, SQL injection attempts and boundary values."
        }
    }
}

fn json_or_empty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn body_excerpt(result: &ExecutionResult) -> String {
    match &result.response_body {
        Some(body) => truncate_with_ellipsis(body, MAX_BODY_CHARS),
        None => format!(
            "<no response: {}>",
            result.error_message.as_deref().unwrap_or("transport failure")
        ),
    }
}

pub fn case_prompt(
    program: &ProgramContext,
    endpoint: &Endpoint,
    scenario: QualityScenario,
) -> String {
    let mut prompt = format!(
        "Program: {}\nTarget endpoint: {}\n",
        program.program_name,
        endpoint.label()
    );
    if !program.extra_requirements.trim().is_empty() {
        prompt.push_str(&format!("Additional requirements: {}\n", program.extra_requirements));
    }
    if !program.api_understanding.trim().is_empty() {
        prompt.push_str(&format!("API overview:\n{}\n", program.api_understanding));
    }
    prompt.push_str(&format!(
        "\nEndpoint definition (OpenAPI):\n{}\n\nScenario: {} ({})\n{}\n",
        endpoint.context_json(),
        scenario.as_str(),
        scenario.description(),
        scenario_guidance(scenario)
    ));
    prompt
}

pub fn assertion_prompt(case: &TestCase, result: &ExecutionResult, endpoint: &Endpoint) -> String {
    format!(
        "Endpoint definition:\n{}\n\n\
         Case: {}\nGoal: {}\nRequest: {} {}\nRequest body: {}\n\n\
         Actual status: {}\nActual response body:\n{}\n\n\
         Avoid strict equality on dynamic fields such as ids and timestamps. \
         If the case expects a failure, assert on the error code. \
         Watch for business errors returned with HTTP 200.",
        endpoint.context_json(),
        case.name,
        case.goal,
        result.method,
        result.url,
        case.body,
        result.status_code,
        body_excerpt(result)
    )
}

pub fn decision_prompt(case: &TestCase, result: &ExecutionResult, endpoint: &Endpoint) -> String {
    format!(
        "Endpoint definition:\n{}\n\n\
         Case: {}\nGoal: {}\nMethod: {}\nPath: {}\n\
         Headers: {}\nQuery parameters: {}\nPath parameters: {}\nBody: {}\n\n\
         Observed status: {}\nObserved duration: {} ms\nObserved response body:\n{}\n\n\
         If the case was malformed for its goal, return action \"adjust_case\" with a corrected case. \
         If the interface itself behaved wrongly, return action \"mark_abnormal\" and describe the defect.",
        endpoint.context_json(),
        case.name,
        case.goal,
        case.method,
        case.path,
        json_or_empty(&case.headers),
        json_or_empty(&case.query_params),
        json_or_empty(&case.path_params),
        case.body,
        result.status_code,
        result.duration_ms,
        body_excerpt(result)
    )
}

pub fn understanding_prompt(program: &ProgramContext, document: &ApiDocument) -> String {
    format!(
        "Program: {}\nAdditional requirements: {}\nBase server: {}\nEndpoints ({}):\n{}\n\nDocument preview:\n{}",
        program.program_name,
        program.extra_requirements,
        document.base_url.as_deref().unwrap_or("<unknown>"),
        document.endpoints.len(),
        document.outline,
        document.raw_preview
    )
}

pub fn analysis_prompt(program: &ProgramContext, digest: &str) -> String {
    format!(
        "Program: {}\nAdditional requirements: {}\n\nRun results:\n{}",
        program.program_name, program.extra_requirements, digest
    )
}
