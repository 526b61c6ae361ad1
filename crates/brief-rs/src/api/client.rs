//! Async HTTP client for OpenAI-compatible chat completions.

use crate::accounting::UsageRecord;
use crate::error::{BriefError, Result};
use crate::llm::{ChatMessage, Completion, LlmClient, LlmFuture};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Environment variable holding the bearer token.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Optional override for the endpoint root (any OpenAI-compatible server).
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat completion request body.
#[derive(Serialize, Debug)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    #[serde(default)]
    choices: Vec<RawChoice>,
    error: Option<ApiErrorResponse>,
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// ── Client ─────────────────────────────────────────────────────────

/// Chat-completions client.
pub struct ChatClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ChatClient {
    /// Client against the public OpenAI endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, OPENAI_BASE_URL)
    }

    /// Client against any OpenAI-compatible endpoint root, e.g.
    /// `http://localhost:8080/v1`.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("brief-rs/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BriefError::provider("client_build", e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build from `OPENAI_API_KEY` and, if set, `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            BriefError::provider("missing_api_key", format!("{API_KEY_ENV} is not set"))
        })?;
        match std::env::var(BASE_URL_ENV) {
            Ok(base) if !base.trim().is_empty() => Self::with_base_url(api_key, base),
            _ => Self::new(api_key),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest<'_>) -> Result<Completion> {
        debug!(
            "LLM request: model={}, messages={}, temp={}",
            body.model,
            body.messages.len(),
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| BriefError::provider("transport", format!("request failed: {e}")))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| {
            BriefError::provider("transport", format!("failed to read response: {e}"))
        })?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(BriefError::provider(
                format!("http_{}", status.as_u16()),
                error_message(&text),
            ));
        }

        parse_completion(&text, body.model)
    }
}

impl LlmClient for ChatClient {
    fn invoke<'a>(
        &'a self,
        model_id: &'a str,
        messages: &'a [ChatMessage],
        temperature: f32,
    ) -> LlmFuture<'a> {
        Box::pin(async move {
            let body = ChatRequest {
                model: model_id,
                messages,
                temperature,
            };
            self.chat(&body).await
        })
    }
}

/// Pull the provider's message out of an error body, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<RawChatResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .map(|e| e.message)
        .unwrap_or_else(|| body.to_string())
}

fn parse_completion(body: &str, model_id: &str) -> Result<Completion> {
    let parsed: RawChatResponse = serde_json::from_str(body)
        .map_err(|e| BriefError::provider("bad_response", format!("failed to parse response: {e}")))?;

    if let Some(err) = parsed.error {
        let code = match err.code {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => "api_error".to_string(),
        };
        return Err(BriefError::provider(code, err.message));
    }

    // A reply without usage cannot be priced; treat it as a failed call so
    // the ledger never holds a guessed cost.
    let usage = parsed.usage.ok_or_else(|| {
        BriefError::provider("missing_usage", "response did not report token usage")
    })?;

    debug!(
        "Token usage: prompt={}, completion={}",
        usage.prompt_tokens, usage.completion_tokens
    );

    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| BriefError::provider("empty_response", "response had no message content"))?;

    Ok(Completion {
        text,
        usage: UsageRecord::new(model_id, usage.prompt_tokens, usage.completion_tokens),
    })
}
