//! Configuration for apiprobe.
//!
//! Loaded from a YAML file (default `apiprobe.yml`); a missing file yields the
//! defaults. Environment variables are applied on top:
//!
//! - `LLM_PROVIDER`: `openai`, `deepseek`, `dashscope` or `gemini`
//! - `<PROVIDER>_API_KEY`, `<PROVIDER>_BASE_URL`, `<PROVIDER>_MODEL`
//! - `APIPROBE_PORT`, `APIPROBE_STORE_DIR`
//!
//! Without `LLM_PROVIDER` and without a key in the file, the first provider
//! with an API key in the environment wins, checked in the order deepseek,
//! gemini, dashscope, openai.

use crate::decision_loop::DecisionLoopConfig;
use crate::pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "apiprobe.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Chat-completion provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    #[default]
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "dashscope")]
    DashScope,
    #[serde(rename = "gemini")]
    Gemini,
}

impl LlmProvider {
    /// Order used when picking a provider from available keys.
    pub const DETECTION_ORDER: [LlmProvider; 4] = [
        LlmProvider::DeepSeek,
        LlmProvider::Gemini,
        LlmProvider::DashScope,
        LlmProvider::OpenAi,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::DeepSeek => "deepseek",
            LlmProvider::DashScope => "dashscope",
            LlmProvider::Gemini => "gemini",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(LlmProvider::OpenAi),
            "deepseek" => Some(LlmProvider::DeepSeek),
            "dashscope" => Some(LlmProvider::DashScope),
            "gemini" => Some(LlmProvider::Gemini),
            _ => None,
        }
    }

    /// Prefix of this provider's environment variables.
    pub fn env_prefix(self) -> String {
        self.as_str().to_uppercase()
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "https://api.openai.com",
            LlmProvider::DeepSeek => "https://api.deepseek.com",
            LlmProvider::DashScope => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4o-mini",
            LlmProvider::DeepSeek => "deepseek-chat",
            LlmProvider::DashScope => "qwen-plus",
            LlmProvider::Gemini => "gemini-2.5-pro",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<String>,
    /// Provider default when unset.
    pub base_url: Option<String>,
    /// Provider default when unset.
    pub model: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            api_key: None,
            base_url: None,
            model: None,
            temperature: 0.2,
            timeout_secs: 300,
        }
    }
}

impl LlmConfig {
    pub fn effective_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub max_retries: u32,
    pub oracle_timeout_secs: u64,
    pub generator_timeout_secs: u64,
    pub executor_timeout_secs: u64,
    pub default_base_url: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            oracle_timeout_secs: 300,
            generator_timeout_secs: 300,
            executor_timeout_secs: 90,
            default_base_url: "http://localhost:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// When set, finished tasks are persisted here as JSON files.
    pub dir: Option<PathBuf>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub llm: LlmConfig,
    pub pipeline: PipelineSettings,
    pub http: HttpSettings,
    pub server: ServerSettings,
    pub store: StoreSettings,
}

impl ProbeConfig {
    /// Parses configuration from YAML text.
    pub fn parse_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Reads `path`, or returns the defaults when it does not exist.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Loads the file (or `apiprobe.yml`), applies the process environment and
    /// validates the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = Self::from_file(path)?;
        config.apply_env_from(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let explicit = get("LLM_PROVIDER").and_then(|p| LlmProvider::parse(&p));
        let detected = explicit.or_else(|| {
            if self.llm.api_key.is_some() {
                return None;
            }
            LlmProvider::DETECTION_ORDER
                .into_iter()
                .find(|p| get(&format!("{}_API_KEY", p.env_prefix())).is_some())
        });
        if let Some(provider) = detected {
            if provider != self.llm.provider {
                self.llm.base_url = None;
                self.llm.model = None;
                self.llm.api_key = None;
            }
            self.llm.provider = provider;
        }

        let prefix = self.llm.provider.env_prefix();
        if let Some(key) = get(&format!("{prefix}_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get(&format!("{prefix}_BASE_URL")) {
            self.llm.base_url = Some(url);
        }
        if let Some(model) = get(&format!("{prefix}_MODEL")) {
            self.llm.model = Some(model);
        }

        if let Some(port) = get("APIPROBE_PORT").and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(dir) = get("APIPROBE_STORE_DIR") {
            self.store.dir = Some(PathBuf::from(dir));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if p.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.max_retries must be at least 1".to_string(),
            ));
        }
        let timeouts = [
            ("pipeline.oracle_timeout_secs", p.oracle_timeout_secs),
            ("pipeline.generator_timeout_secs", p.generator_timeout_secs),
            ("pipeline.executor_timeout_secs", p.executor_timeout_secs),
            ("http.connect_timeout_secs", self.http.connect_timeout_secs),
            ("http.request_timeout_secs", self.http.request_timeout_secs),
            ("llm.timeout_secs", self.llm.timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
        }
        if p.default_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "pipeline.default_base_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Runtime settings for [`crate::Pipeline`].
    pub fn pipeline_config(&self) -> PipelineConfig {
        let p = &self.pipeline;
        PipelineConfig {
            decision: DecisionLoopConfig {
                max_retries: p.max_retries,
                oracle_timeout: Duration::from_secs(p.oracle_timeout_secs),
                executor_timeout: Duration::from_secs(p.executor_timeout_secs),
            },
            generator_timeout: Duration::from_secs(p.generator_timeout_secs),
            default_base_url: p.default_base_url.clone(),
        }
    }
}
