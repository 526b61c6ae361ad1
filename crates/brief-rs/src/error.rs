//! Error taxonomy shared by every stage of the pipeline.
//!
//! Registry and chunking failures are structural: the request was set up
//! wrong (unknown model, reserve too large, overlap too large) and retrying
//! it unchanged cannot help. Provider failures come from the chat endpoint
//! and are surfaced as-is; the library never retries on its own.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BriefError>;

#[derive(Debug, Error)]
pub enum BriefError {
    /// The model id is not registered.
    #[error("unknown model '{0}'")]
    UnknownModel(String),

    /// `max_context_tokens - reserve` left no room for input text.
    #[error(
        "reserve of {reserve} tokens leaves no input budget for '{model_id}' \
         ({max_context_tokens} token context)"
    )]
    InvalidBudget {
        model_id: String,
        max_context_tokens: usize,
        reserve: usize,
    },

    /// A unit the splitter cannot divide any further is still over budget.
    #[error("indivisible segment of {tokens} tokens exceeds budget of {budget} tokens: {preview:?}")]
    ChunkTooLarge {
        tokens: usize,
        budget: usize,
        preview: String,
    },

    /// Chunk overlap must be strictly smaller than the budget it lives in.
    #[error("overlap of {overlap} tokens must be smaller than the chunk budget of {budget}")]
    InvalidOverlap { overlap: usize, budget: usize },

    /// A collapse round did not make the partial summaries any shorter.
    #[error("reduce stalled after {rounds} collapse round(s) at {tokens} tokens (budget {budget})")]
    ReduceStalled {
        rounds: usize,
        tokens: usize,
        budget: usize,
    },

    /// Transport or provider-side failure of an LLM call.
    #[error("provider error [{code}]: {message}")]
    Provider { code: String, message: String },

    /// The fetcher or transcript loader had nothing to give us.
    #[error("content unavailable: {0}")]
    ContentUnavailable(String),

    /// The URL lacks a scheme or host.
    #[error("invalid url '{0}'")]
    InvalidUrl(String),

    /// A model profile failed validation on registration.
    #[error("invalid model profile '{id}': {reason}")]
    InvalidProfile { id: String, reason: String },
}

impl BriefError {
    pub fn provider(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Misconfiguration that must abort the request rather than be retried.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnknownModel(_)
                | Self::InvalidBudget { .. }
                | Self::ChunkTooLarge { .. }
                | Self::InvalidOverlap { .. }
                | Self::ReduceStalled { .. }
                | Self::InvalidProfile { .. }
        )
    }

    /// The request had no usable input ("nothing to summarize").
    pub fn is_content_unavailable(&self) -> bool {
        matches!(self, Self::ContentUnavailable(_) | Self::InvalidUrl(_))
    }
}
