//! Recursive, token-bounded text splitting.
//!
//! A document that does not fit a model's input budget is cut on the
//! coarsest boundary that works: paragraph breaks first, then line breaks,
//! sentence ends, whitespace, and finally single characters. Pieces that fit
//! are greedily merged back together up to the budget, so chunks stay as
//! large (and as coherent) as the budget allows. A piece that is still over
//! budget after the last separator level is an error, never a truncation.
//!
//! Splitting is a pure function of (text, model id, budget, overlap,
//! separators, tokenizer): the same input always yields the same chunks.

use crate::error::{BriefError, Result};
use crate::registry::ModelRegistry;
use crate::tokenizer::Tokenizer;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

/// Sentence end: western punctuation followed by whitespace, or CJK full stops.
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+\s+|[。！？]+").expect("sentence regex is valid"));

/// Metadata key for where a document came from (URL or path).
pub const META_SOURCE: &str = "source";
/// Metadata key for a human-readable title.
pub const META_TITLE: &str = "title";

/// Source text plus loader-provided metadata (title, duration, ...).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(META_SOURCE).map(String::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get(META_TITLE).map(String::as_str)
    }
}

/// One token-bounded segment of a document, in document order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub estimated_tokens: usize,
    pub sequence_index: usize,
}

/// Split boundaries, coarsest first.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Separator {
    /// Blank line.
    Paragraph,
    /// Single newline.
    Line,
    /// `.`, `!`, `?` followed by whitespace, or `。`, `！`, `？`.
    Sentence,
    /// Any whitespace run.
    Whitespace,
    /// Every character on its own.
    Character,
}

impl Separator {
    pub const DEFAULT_ORDER: [Separator; 5] = [
        Separator::Paragraph,
        Separator::Line,
        Separator::Sentence,
        Separator::Whitespace,
        Separator::Character,
    ];

    /// Cut `text` after every occurrence of this separator. The separator
    /// stays attached to the piece it ends, so the pieces concatenate back
    /// to `text` exactly.
    fn split(self, text: &str) -> Vec<&str> {
        match self {
            Separator::Paragraph => text.split_inclusive("\n\n").collect(),
            Separator::Line => text.split_inclusive('\n').collect(),
            Separator::Sentence => split_after_matches(text, &SENTENCE_END),
            Separator::Whitespace => split_after_whitespace(text),
            Separator::Character => text
                .char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect(),
        }
    }
}

fn split_after_matches<'t>(text: &'t str, re: &Regex) -> Vec<&'t str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for m in re.find_iter(text) {
        if m.end() > start {
            pieces.push(&text[start..m.end()]);
            start = m.end();
        }
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn split_after_whitespace(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut in_space = false;
    for (i, c) in text.char_indices() {
        let space = c.is_whitespace();
        if in_space && !space {
            pieces.push(&text[start..i]);
            start = i;
        }
        in_space = space;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Token-bounded recursive splitter.
pub struct TextSplitter<'a> {
    tokenizer: &'a dyn Tokenizer,
    separators: Vec<Separator>,
}

impl<'a> TextSplitter<'a> {
    pub fn new(tokenizer: &'a dyn Tokenizer) -> Self {
        Self {
            tokenizer,
            separators: Separator::DEFAULT_ORDER.to_vec(),
        }
    }

    /// Replace the separator cascade. Leaving out [`Separator::Character`]
    /// makes a single over-budget word a [`BriefError::ChunkTooLarge`].
    pub fn with_separators(mut self, separators: Vec<Separator>) -> Self {
        self.separators = separators;
        self
    }

    pub fn tokenizer(&self) -> &'a dyn Tokenizer {
        self.tokenizer
    }

    /// Split a document against `budget_tokens(model_id, reserve)`.
    pub fn split(
        &self,
        document: &Document,
        registry: &ModelRegistry,
        model_id: &str,
        reserve: usize,
        overlap: usize,
    ) -> Result<Vec<Chunk>> {
        let budget = registry.budget_tokens(model_id, reserve)?;
        self.split_text(&document.text, model_id, budget, overlap)
    }

    /// Split raw text against an already-computed token budget.
    ///
    /// Consecutive chunks share up to `overlap` tokens of whole pieces at the
    /// finest separator level that was needed. Every chunk still carries at
    /// least one piece its predecessor did not, so overlap can never stall
    /// progress.
    pub fn split_text(
        &self,
        text: &str,
        model_id: &str,
        budget: usize,
        overlap: usize,
    ) -> Result<Vec<Chunk>> {
        if overlap >= budget {
            return Err(BriefError::InvalidOverlap { overlap, budget });
        }

        let mut segments = Vec::new();
        if self.estimate(text, model_id) <= budget {
            segments.push(text.to_string());
        } else {
            self.split_recursive(text, &self.separators, model_id, budget, overlap, &mut segments)?;
        }

        let chunks: Vec<Chunk> = segments
            .into_iter()
            .filter_map(|s| {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .enumerate()
            .map(|(sequence_index, text)| Chunk {
                estimated_tokens: self.estimate(&text, model_id),
                text,
                sequence_index,
            })
            .collect();

        debug!(
            chunks = chunks.len(),
            budget,
            overlap,
            model = model_id,
            "split text"
        );
        Ok(chunks)
    }

    fn estimate(&self, text: &str, model_id: &str) -> usize {
        self.tokenizer.estimate_tokens(text, model_id)
    }

    /// `text` is known to be over budget.
    fn split_recursive(
        &self,
        text: &str,
        levels: &[Separator],
        model_id: &str,
        budget: usize,
        overlap: usize,
        out: &mut Vec<String>,
    ) -> Result<()> {
        let Some((separator, finer)) = levels.split_first() else {
            return Err(self.too_large(text, model_id, budget));
        };

        let pieces = separator.split(text);
        if pieces.len() <= 1 {
            return self.split_recursive(text, finer, model_id, budget, overlap, out);
        }

        let mut fitting: Vec<&str> = Vec::new();
        for piece in pieces {
            if self.estimate(piece, model_id) <= budget {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                self.merge_pieces(&fitting, model_id, budget, overlap, out);
                fitting.clear();
            }
            if finer.is_empty() {
                return Err(self.too_large(piece, model_id, budget));
            }
            self.split_recursive(piece, finer, model_id, budget, overlap, out)?;
        }
        if !fitting.is_empty() {
            self.merge_pieces(&fitting, model_id, budget, overlap, out);
        }
        Ok(())
    }

    /// Greedily pack consecutive pieces into segments of at most `budget`
    /// tokens. Every piece fits on its own.
    ///
    /// Windows are sized by estimating their joined text, not by summing
    /// piece estimates: per-piece rounding would otherwise leave each chunk
    /// well short of the budget.
    fn merge_pieces(
        &self,
        pieces: &[&str],
        model_id: &str,
        budget: usize,
        overlap: usize,
        out: &mut Vec<String>,
    ) {
        let mut start = 0;
        // `pieces[start..known_fit]` is known to fit.
        let mut known_fit = 1;

        while start < pieces.len() {
            let end = self.widest_fit(pieces, start, known_fit, model_id, budget);
            out.push(pieces[start..end].concat());
            if end == pieces.len() {
                break;
            }

            // Carry a tail of at most `overlap` tokens, never the whole
            // window, and leave room for the next piece.
            let mut next = end;
            while next > start + 1 && self.fits(&pieces[next - 1..end], model_id, overlap) {
                next -= 1;
            }
            while next < end && !self.fits(&pieces[next..=end], model_id, budget) {
                next += 1;
            }
            start = next;
            known_fit = end + 1;
        }
    }

    /// Largest `end` such that `pieces[start..end]` fits, given that
    /// `pieces[start..known_fit]` does. Gallops forward, then bisects, so a
    /// window costs a logarithmic number of estimates.
    fn widest_fit(
        &self,
        pieces: &[&str],
        start: usize,
        known_fit: usize,
        model_id: &str,
        budget: usize,
    ) -> usize {
        let mut lo = known_fit;
        let mut step = 1;
        let mut hi = loop {
            let candidate = (lo + step).min(pieces.len());
            if candidate == lo {
                return lo;
            }
            if !self.fits(&pieces[start..candidate], model_id, budget) {
                break candidate;
            }
            lo = candidate;
            step *= 2;
        };
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.fits(&pieces[start..mid], model_id, budget) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        lo
    }

    fn fits(&self, window: &[&str], model_id: &str, limit: usize) -> bool {
        self.estimate(&window.concat(), model_id) <= limit
    }

    fn too_large(&self, text: &str, model_id: &str, budget: usize) -> BriefError {
        BriefError::ChunkTooLarge {
            tokens: self.estimate(text, model_id),
            budget,
            preview: text.chars().take(40).collect(),
        }
    }
}
