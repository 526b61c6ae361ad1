//! HTTP side of the LLM-call abstraction.
//!
//! - [`client`] — [`ChatClient`], a reqwest client for OpenAI-compatible
//!   `/chat/completions` endpoints implementing [`LlmClient`](crate::LlmClient).
//!   Transport failures, non-2xx statuses, provider error objects and replies
//!   without usage all surface as [`BriefError::Provider`](crate::BriefError::Provider);
//!   nothing is retried here.

pub mod client;

pub use client::{API_KEY_ENV, BASE_URL_ENV, ChatClient, ChatRequest, OPENAI_BASE_URL};
