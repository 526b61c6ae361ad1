//! Per-session pipeline settings.
//!
//! # Examples
//!
//! ```
//! use brief_rs::{ModelChoice, PipelineConfig};
//! use std::time::Duration;
//!
//! let config = PipelineConfig::default()
//!     .with_model(ModelChoice::Gpt35Turbo16k)
//!     .with_reserve(2_000)
//!     .with_temperature(0.3)
//!     .with_call_timeout(Duration::from_secs(60));
//! assert_eq!(config.model, "gpt-3.5-turbo-16k");
//! ```

use crate::registry::ModelChoice;
use crate::summarize::{DEFAULT_WEB_SUMMARY_CHARS, StrategyHint};
use std::time::Duration;

/// Tokens held back from the context window for prompt overhead and the reply.
pub const DEFAULT_RESERVE: usize = 1_000;
/// Upper bound on collapse rounds in map-reduce.
pub const DEFAULT_MAX_COLLAPSE_ROUNDS: usize = 8;
pub const MAX_TEMPERATURE: f32 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Registry id of the model every call goes to. Default: `gpt-3.5-turbo`.
    pub model: String,
    /// Tokens reserved out of the context window. Default: `1000`.
    pub reserve: usize,
    /// Tokens shared between consecutive chunks. Default: `0`.
    pub overlap: usize,
    /// Sampling temperature in `0.0..=2.0`. Default: `0.0`.
    pub temperature: f32,
    /// Deadline for each individual call. Default: none.
    pub call_timeout: Option<Duration>,
    /// Collapse rounds allowed before giving up. Default: `8`.
    pub max_collapse_rounds: usize,
    /// Target length of web-page summaries, in characters. Default: `300`.
    pub web_summary_chars: usize,
    /// Strategy preference for web and video summaries. Default: `Auto`.
    pub strategy_hint: StrategyHint,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: ModelChoice::default().id().to_string(),
            reserve: DEFAULT_RESERVE,
            overlap: 0,
            temperature: 0.0,
            call_timeout: None,
            max_collapse_rounds: DEFAULT_MAX_COLLAPSE_ROUNDS,
            web_summary_chars: DEFAULT_WEB_SUMMARY_CHARS,
            strategy_hint: StrategyHint::Auto,
        }
    }
}

impl PipelineConfig {
    pub fn with_model(mut self, choice: ModelChoice) -> Self {
        self.model = choice.id().to_string();
        self
    }

    /// Use a model id registered outside the built-in choices.
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model = model_id.into();
        self
    }

    pub fn with_reserve(mut self, reserve: usize) -> Self {
        self.reserve = reserve;
        self
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    /// Clamped to `0.0..=2.0`; NaN becomes `0.0`.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = if temperature.is_nan() {
            0.0
        } else {
            temperature.clamp(0.0, MAX_TEMPERATURE)
        };
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn with_max_collapse_rounds(mut self, rounds: usize) -> Self {
        self.max_collapse_rounds = rounds;
        self
    }

    pub fn with_web_summary_chars(mut self, chars: usize) -> Self {
        self.web_summary_chars = chars;
        self
    }

    pub fn with_strategy_hint(mut self, hint: StrategyHint) -> Self {
        self.strategy_hint = hint;
        self
    }
}
