//! Token counting for budget arithmetic.
//!
//! The pipeline asks a [`Tokenizer`] for a count keyed by model id. A count
//! may come in over what the provider bills but never under it, otherwise a
//! chunk that "fits" can overflow the model's context window.
//!
//! [`BpeTokenizer`] counts exactly with the `cl100k_base` encoding for the
//! OpenAI chat models and hands every other id to [`CharEstimator`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Default characters per token inside a run of ASCII letters. BPE
/// vocabularies average closer to 4 on English words; 3 keeps the estimate
/// on the high side.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 3.0;

/// Model ids that tokenize with `cl100k_base`.
pub const CL100K_MODELS: [&str; 4] = ["gpt-3.5-turbo", "gpt-3.5-turbo-16k", "gpt-4", "gpt-4-32k"];

static CL100K: LazyLock<Option<CoreBPE>> = LazyLock::new(|| match tiktoken_rs::cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        warn!("cl100k_base encoding failed to load, falling back to estimates: {e}");
        None
    }
});

/// Token counting capability, keyed by model id.
pub trait Tokenizer: Send + Sync {
    fn estimate_tokens(&self, text: &str, model_id: &str) -> usize;
}

// ── BPE ────────────────────────────────────────────────────────────

/// Exact `cl100k_base` counts for known models, [`CharEstimator`] otherwise.
pub struct BpeTokenizer {
    bpe: Option<&'static CoreBPE>,
    models: BTreeSet<String>,
    fallback: CharEstimator,
}

impl Default for BpeTokenizer {
    fn default() -> Self {
        Self {
            bpe: CL100K.as_ref(),
            models: BTreeSet::from(CL100K_MODELS.map(String::from)),
            fallback: CharEstimator::default(),
        }
    }
}

impl BpeTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count `model_id` with `cl100k_base` too (fine-tunes, compatible
    /// servers that reuse the OpenAI vocabulary).
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.models.insert(model_id.into());
        self
    }

    pub fn with_fallback(mut self, fallback: CharEstimator) -> Self {
        self.fallback = fallback;
        self
    }

    /// Whether counts for `model_id` are exact rather than estimated.
    pub fn is_exact_for(&self, model_id: &str) -> bool {
        self.bpe.is_some() && self.models.contains(model_id)
    }
}

impl Tokenizer for BpeTokenizer {
    fn estimate_tokens(&self, text: &str, model_id: &str) -> usize {
        match self.bpe {
            Some(bpe) if self.models.contains(model_id) => bpe.encode_ordinary(text).len(),
            _ => self.fallback.estimate_tokens(text, model_id),
        }
    }
}

// ── Heuristic ──────────────────────────────────────────────────────

/// Character-class heuristic for models without a known vocabulary.
///
/// A run of ASCII letters costs `len / chars_per_token` tokens, rounded up,
/// and a single space directly before it rides along for free. Every other
/// character (digits, punctuation, other whitespace, anything non-ASCII)
/// costs a full token. BPE encoders split digit groups, symbols and CJK text
/// into short tokens, so charging those per character keeps tables, JSON
/// and hex dumps from being undercounted.
#[derive(Debug, Clone)]
pub struct CharEstimator {
    chars_per_token: f64,
    per_model: BTreeMap<String, f64>,
}

impl Default for CharEstimator {
    fn default() -> Self {
        Self {
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
            per_model: BTreeMap::new(),
        }
    }
}

impl CharEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the letter-run ratio for every model. Values below 1.0 are
    /// clamped to 1.0 (one token per letter).
    pub fn with_chars_per_token(mut self, ratio: f64) -> Self {
        self.chars_per_token = sanitize_ratio(ratio);
        self
    }

    /// Override the letter-run ratio for a single model id.
    pub fn with_model_ratio(mut self, model_id: impl Into<String>, ratio: f64) -> Self {
        self.per_model.insert(model_id.into(), sanitize_ratio(ratio));
        self
    }

    fn ratio_for(&self, model_id: &str) -> f64 {
        self.per_model
            .get(model_id)
            .copied()
            .unwrap_or(self.chars_per_token)
    }
}

fn sanitize_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() && ratio >= 1.0 {
        ratio
    } else {
        1.0
    }
}

fn word_tokens(letters: usize, ratio: f64) -> usize {
    (letters as f64 / ratio).ceil() as usize
}

impl Tokenizer for CharEstimator {
    fn estimate_tokens(&self, text: &str, model_id: &str) -> usize {
        let ratio = self.ratio_for(model_id);
        let mut tokens = 0;
        let mut letters = 0;
        // A space that joins the next word if a letter follows it.
        let mut pending_space = false;

        for c in text.chars() {
            if c.is_ascii_alphabetic() {
                pending_space = false;
                letters += 1;
                continue;
            }
            tokens += word_tokens(letters, ratio);
            letters = 0;
            if pending_space {
                tokens += 1;
            }
            pending_space = c == ' ';
            if !pending_space {
                tokens += 1;
            }
        }
        tokens += word_tokens(letters, ratio);
        if pending_space {
            tokens += 1;
        }
        tokens
    }
}
