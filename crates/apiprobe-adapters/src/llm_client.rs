//! Chat-completion client.
//!
//! Two wire formats are supported: the OpenAI-compatible
//! `/v1/chat/completions` API (OpenAI, DeepSeek, DashScope) and Gemini's
//! `generateContent`.

use apiprobe_core::{LlmConfig, LlmProvider};
use apiprobe_proto::CollaboratorError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// A language model answering one system + user prompt pair.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, system: &str, user: &str) -> Result<String, CollaboratorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    OpenAiCompatible,
    Gemini,
}

impl From<LlmProvider> for WireFormat {
    fn from(provider: LlmProvider) -> Self {
        match provider {
            LlmProvider::Gemini => WireFormat::Gemini,
            LlmProvider::OpenAi | LlmProvider::DeepSeek | LlmProvider::DashScope => {
                WireFormat::OpenAiCompatible
            }
        }
    }
}

pub struct ChatClient {
    client: Client,
    format: WireFormat,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: [GeminiContent; 1],
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

impl ChatClient {
    pub fn new(
        format: WireFormat,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Http(e.to_string()))?;
        Ok(Self {
            client,
            format,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            temperature,
        })
    }

    /// Builds a client for the configured provider. A missing API key is an
    /// error here rather than on the first call.
    pub fn from_config(config: &LlmConfig) -> Result<Self, CollaboratorError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                CollaboratorError::InvalidRequest(format!(
                    "no API key configured for provider '{}' (set {}_API_KEY)",
                    config.provider,
                    config.provider.env_prefix()
                ))
            })?;
        Self::new(
            config.provider.into(),
            config.effective_base_url(),
            config.effective_model(),
            api_key,
            config.temperature,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Request URL for the configured wire format.
    pub fn endpoint(&self) -> String {
        match self.format {
            WireFormat::OpenAiCompatible if self.base_url.ends_with("/v1") => {
                format!("{}/chat/completions", self.base_url)
            }
            WireFormat::OpenAiCompatible => format!("{}/v1/chat/completions", self.base_url),
            WireFormat::Gemini => format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ),
        }
    }

    async fn post_json<T: Serialize + Sync>(
        &self,
        request: reqwest::RequestBuilder,
        payload: &T,
    ) -> Result<String, CollaboratorError> {
        let response = request
            .header("content-type", "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Http(format!("LLM request timed out: {e}"))
                } else {
                    CollaboratorError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CollaboratorError::Http(format!(
                "LLM call failed: {} - {}",
                status, body
            )));
        }
        Ok(body)
    }

    async fn chat_openai(&self, system: &str, user: &str) -> Result<String, CollaboratorError> {
        let payload = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };
        let request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key);
        let body = self.post_json(request, &payload).await?;
        let parsed: ChatResponse = serde_json::from_str(&body)?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn chat_gemini(&self, system: &str, user: &str) -> Result<String, CollaboratorError> {
        let payload = GeminiRequest {
            contents: [GeminiContent {
                parts: vec![GeminiPart {
                    text: format!("{system}\n{user}"),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
            },
        };
        let request = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key);
        let body = self.post_json(request, &payload).await?;
        let parsed: GeminiResponse = serde_json::from_str(&body)?;
        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn chat(&self, system: &str, user: &str) -> Result<String, CollaboratorError> {
        debug!(
            model = %self.model,
            prompt_chars = system.len() + user.len(),
            "Calling LLM"
        );
        let text = match self.format {
            WireFormat::OpenAiCompatible => self.chat_openai(system, user).await?,
            WireFormat::Gemini => self.chat_gemini(system, user).await?,
        };
        if text.trim().is_empty() {
            return Err(CollaboratorError::Provider(
                "LLM returned an empty reply".to_string(),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(format: WireFormat, base: &str) -> ChatClient {
        ChatClient::new(format, base, "m1", "k", 0.2, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_urls() {
        assert_eq!(
            client(WireFormat::OpenAiCompatible, "https://api.deepseek.com/").endpoint(),
            "https://api.deepseek.com/v1/chat/completions"
        );
        assert_eq!(
            client(
                WireFormat::OpenAiCompatible,
                "https://dashscope.aliyuncs.com/compatible-mode/v1"
            )
            .endpoint(),
            "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions"
        );
        assert_eq!(
            client(WireFormat::Gemini, "https://generativelanguage.googleapis.com").endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/m1:generateContent"
        );
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = LlmConfig::default();
        assert!(matches!(
            ChatClient::from_config(&config),
            Err(CollaboratorError::InvalidRequest(_))
        ));

        let config = LlmConfig {
            provider: LlmProvider::Gemini,
            api_key: Some("secret".to_string()),
            ..LlmConfig::default()
        };
        let c = ChatClient::from_config(&config).unwrap();
        assert_eq!(c.format(), WireFormat::Gemini);
        assert!(c.endpoint().ends_with("/models/gemini-2.5-pro:generateContent"));
    }

    #[test]
    fn test_openai_payload_shape() {
        let payload = ChatRequest {
            model: "m",
            temperature: 0.5,
            messages: [
                ChatMessage {
                    role: "system",
                    content: "s",
                },
                ChatMessage {
                    role: "user",
                    content: "u",
                },
            ],
        };
        let v = serde_json::to_value(&payload).unwrap();
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "u");
        assert_eq!(v["temperature"], 0.5);
    }

    #[test]
    fn test_gemini_response_parsing_tolerates_missing_parts() {
        let parsed: GeminiResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{}}]}"#).unwrap();
        assert!(parsed.candidates[0].content.parts.is_empty());
    }
}
