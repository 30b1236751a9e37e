use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::Config;
use crate::error::LlmError;
use crate::llm_types::{CompletionRequest, Message, MessagesRequest, MessagesResponse};

const MAX_RATE_LIMIT_RETRIES: u32 = 3;

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Single-turn completion. Returns the raw reply text, possibly empty.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// `None` when the configured provider cannot be called (no API key).
pub fn create_provider(config: &Config) -> Option<Box<dyn LlmProvider>> {
    if !config.model_configured() {
        return None;
    }
    let http = build_http_client(config.llm_timeout_secs);
    match config.llm_provider.as_str() {
        "anthropic" => Some(Box::new(AnthropicProvider::new(config, http))),
        _ => Some(Box::new(OpenAiProvider::new(config, http))),
    }
}

fn build_http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            warn!("Failed to build HTTP client with timeout, using defaults: {e}");
            reqwest::Client::new()
        })
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// Error envelope shared by OpenAI-compatible and Anthropic APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

pub fn classify_api_error(status: u16, body: &str) -> LlmError {
    let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(body) else {
        return LlmError::Api(format!("HTTP {status}: {body}"));
    };
    let detail = envelope.error;
    let code_is_quota = detail
        .code
        .as_ref()
        .and_then(|c| c.as_str())
        .is_some_and(|c| c == "insufficient_quota");
    if detail.error_type.as_deref() == Some("insufficient_quota")
        || code_is_quota
        || detail.message.to_lowercase().contains("quota")
    {
        return LlmError::QuotaExceeded;
    }
    match detail.error_type {
        Some(kind) => LlmError::Api(format!("HTTP {status} {kind}: {}", detail.message)),
        None => LlmError::Api(format!("HTTP {status}: {}", detail.message)),
    }
}

/// Send a request, retrying plain rate limits with exponential backoff.
///
/// Quota exhaustion is reported immediately even when it arrives as a 429.
async fn send_with_retry<F>(build: F) -> Result<String, LlmError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut retries = 0u32;
    loop {
        let response = build().send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.text().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let err = classify_api_error(status.as_u16(), &body);
        if status.as_u16() == 429
            && err != LlmError::QuotaExceeded
            && retries < MAX_RATE_LIMIT_RETRIES
        {
            retries += 1;
            let delay = Duration::from_secs(2u64.pow(retries));
            warn!(
                "Rate limited, retrying in {:?} (attempt {retries}/{MAX_RATE_LIMIT_RETRIES})",
                delay
            );
            tokio::time::sleep(delay).await;
            continue;
        }
        return Err(err);
    }
}

// ---------------------------------------------------------------------------
// Anthropic provider
// ---------------------------------------------------------------------------

pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        AnthropicProvider {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config
                .llm_base_url
                .clone()
                .unwrap_or_else(|| "https://api.anthropic.com/v1/messages".into()),
        }
    }

    fn build_request(&self, request: &CompletionRequest) -> MessagesRequest {
        let mut system = request.system.clone();
        if request.json_mode {
            system.push_str("\n\nRespond with a single JSON object and nothing else.");
        }
        MessagesRequest {
            model: self.model.clone(),
            max_tokens: request.max_tokens,
            system,
            messages: vec![Message {
                role: "user".into(),
                content: request.user.clone(),
            }],
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let body = self.build_request(&request);
        let text = send_with_retry(|| {
            self.http
                .post(&self.base_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .json(&body)
        })
        .await?;
        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::Api(format!("Failed to parse response: {e}")))?;
        Ok(parsed.text())
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible provider  (OpenAI, OpenRouter, Ollama …)
// ---------------------------------------------------------------------------

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    chat_url: String,
}

impl OpenAiProvider {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        let default_base = if config.llm_provider == "ollama" {
            "http://localhost:11434/v1"
        } else {
            "https://api.openai.com/v1"
        };
        let base = config.llm_base_url.as_deref().unwrap_or(default_base);
        let chat_url = format!("{}/chat/completions", base.trim_end_matches('/'));

        OpenAiProvider {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            chat_url,
        }
    }

    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if request.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct OaiResponse {
    choices: Vec<OaiChoice>,
}

#[derive(Debug, Deserialize)]
struct OaiChoice {
    message: OaiMessage,
}

#[derive(Debug, Deserialize)]
struct OaiMessage {
    content: Option<String>,
}

fn parse_oai_completion(text: &str) -> Result<String, LlmError> {
    let oai: OaiResponse = serde_json::from_str(text)
        .map_err(|e| LlmError::Api(format!("Failed to parse OpenAI response: {e}")))?;
    let choice = oai
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Api("Response contained no choices".into()))?;
    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let body = self.build_body(&request);
        let text = send_with_retry(|| {
            let mut req = self
                .http
                .post(&self.chat_url)
                .header("Content-Type", "application/json")
                .json(&body);
            if !self.api_key.trim().is_empty() {
                req = req.header("Authorization", format!("Bearer {}", self.api_key));
            }
            req
        })
        .await?;
        parse_oai_completion(&text)
    }
}
