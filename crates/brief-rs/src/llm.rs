//! The LLM-call abstraction the pipeline drives.
//!
//! Everything above this seam (orchestrator, session) only knows that a call
//! takes a model id plus messages and returns text plus usage, or fails with
//! [`BriefError::Provider`](crate::BriefError::Provider). The HTTP
//! implementation lives in [`api::ChatClient`](crate::api::ChatClient); tests
//! substitute scripted clients.

use crate::accounting::UsageRecord;
use crate::conversation::{Message, Role};
use crate::error::{BriefError, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future returned by [`LlmClient::invoke`].
pub type LlmFuture<'a> = Pin<Box<dyn Future<Output = Result<Completion>> + Send + 'a>>;

/// A message as sent on the wire.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// Output of one successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: UsageRecord,
}

/// One chat-completion call against a model.
pub trait LlmClient: Send + Sync {
    fn invoke<'a>(
        &'a self,
        model_id: &'a str,
        messages: &'a [ChatMessage],
        temperature: f32,
    ) -> LlmFuture<'a>;
}

impl<T: LlmClient + ?Sized> LlmClient for &T {
    fn invoke<'a>(
        &'a self,
        model_id: &'a str,
        messages: &'a [ChatMessage],
        temperature: f32,
    ) -> LlmFuture<'a> {
        (**self).invoke(model_id, messages, temperature)
    }
}

/// Await a call, turning an elapsed deadline into a provider failure. The
/// abandoned call contributes no usage, so nothing is recorded for it.
pub async fn invoke_with_timeout(
    client: &dyn LlmClient,
    model_id: &str,
    messages: &[ChatMessage],
    temperature: f32,
    timeout: Option<Duration>,
) -> Result<Completion> {
    let call = client.invoke(model_id, messages, temperature);
    match timeout {
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
            BriefError::provider(
                "timeout",
                format!("no response from '{model_id}' within {:.1}s", limit.as_secs_f64()),
            )
        })?,
        None => call.await,
    }
}
