//! Convenience re-exports for common `brief-rs` types.
//!
//! ```ignore
//! use brief_rs::prelude::*;
//! ```

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{BriefError, ModelChoice, ModelProfile, ModelRegistry, PipelineConfig, Result};

// ── Pipeline ────────────────────────────────────────────────────────
pub use crate::accounting::{CostAccountant, CostLedger, UsageRecord, format_usd};
pub use crate::chunking::{Chunk, Document, Separator, TextSplitter};
pub use crate::conversation::{Conversation, Message, Role};
pub use crate::summarize::{
    Strategy, StrategyHint, SummaryOutcome, SummaryPrompts, Summarizer,
};
pub use crate::tokenizer::{BpeTokenizer, CharEstimator, Tokenizer};

// ── Session and events ──────────────────────────────────────────────
pub use crate::events::{EventHandler, FnEventHandler, LoggingHandler, NoopHandler, SummarizeEvent};
pub use crate::session::{ChatTurn, Session, SourcedSummary};

// ── Model calls and content ─────────────────────────────────────────
pub use crate::api::ChatClient;
pub use crate::llm::{ChatMessage, Completion, LlmClient};
pub use crate::source::{
    ContentFetcher, FileTranscriptLoader, HttpContentFetcher, TranscriptLoader, validate_url,
};
