use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmSettings;
use crate::core::schema::schema_for;

/// Errors that can occur when calling the LLM service
///
/// None of these reach the caller of the pipeline: every one of them is
/// logged and answered with the deterministic fallback.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    Api(String),

    #[error("Response contained no content")]
    EmptyContent,

    #[error("Malformed output: {0}")]
    MalformedOutput(String),

    #[error("Output does not match the requested schema: {0}")]
    InvalidSchema(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// One structured-output call
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    /// Schema name reported to the service
    pub name: String,
    /// System instructions
    pub system: String,
    /// JSON context sent as the user message
    pub payload: Value,
    /// Sanitized JSON schema the output must follow
    pub schema: Value,
}

/// Structured-output completion service
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one completion and return the parsed JSON output
    async fn complete(&self, request: StructuredRequest) -> Result<Value, LlmError>;
}

/// Run a structured call for `T`, bounded by `timeout`
///
/// The schema is generated from `T` and sanitized, so every caller shares the
/// same contract.
pub async fn generate_structured<T>(
    client: &dyn LlmClient,
    name: &str,
    system: &str,
    payload: Value,
    timeout: Duration,
) -> Result<T, LlmError>
where
    T: DeserializeOwned + JsonSchema,
{
    let request = StructuredRequest {
        name: name.to_string(),
        system: system.to_string(),
        payload,
        schema: schema_for::<T>(),
    };

    let output = tokio::time::timeout(timeout, client.complete(request))
        .await
        .map_err(|_| LlmError::Timeout(timeout))??;

    serde_json::from_value(output).map_err(|e| LlmError::InvalidSchema(e.to_string()))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: Value,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// OpenAI-compatible chat-completions client
///
/// Requests use the strict `json_schema` response format.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    pub fn from_settings(settings: &LlmSettings) -> Result<Self, LlmError> {
        Self::new(
            settings.endpoint.clone(),
            settings.api_key.clone(),
            settings.model.clone(),
            settings.timeout(),
        )
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: StructuredRequest) -> Result<Value, LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::Api("no API key configured".to_string()));
        }

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.payload.to_string(),
                },
            ],
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": schema_name(&request.name),
                    "strict": true,
                    "schema": request.schema,
                }
            }),
            temperature: 0.7,
        };

        tracing::debug!("Requesting structured completion '{}' from {}", request.name, self.model);

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{}: {}", status, detail.trim())));
        }

        let text = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::MalformedOutput(format!("unexpected response body: {}", e)))?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(LlmError::EmptyContent)?;

        if let Some(refusal) = message.refusal.filter(|r| !r.trim().is_empty()) {
            return Err(LlmError::Api(format!("refused: {}", refusal)));
        }

        let content = message.content.unwrap_or_default();
        let content = strip_code_fence(&content);
        if content.is_empty() {
            return Err(LlmError::EmptyContent);
        }

        serde_json::from_str(content).map_err(|e| LlmError::MalformedOutput(e.to_string()))
    }
}

/// Schema names may only contain ASCII alphanumerics, `_` and `-`
fn schema_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();

    if cleaned.is_empty() {
        "output".to_string()
    } else {
        cleaned
    }
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
