//! Stuff vs. map-reduce summarization.
//!
//! A document whose token estimate fits the model's input budget is
//! summarized in one call ("stuff"). Anything larger goes through
//! map-reduce: split into chunks, summarize each chunk in document order,
//! join the partial summaries, and, if the join itself is still over budget,
//! collapse it again with the same split-and-map step. Once the join fits,
//! one final combine call produces the summary.
//!
//! Collapse rounds run in a loop, not by recursion. Each round must shrink
//! the text (by token estimate) and the number of rounds is capped, so the
//! loop always terminates.
//!
//! Calls are issued one at a time. Every completed call is priced into the
//! [`CostAccountant`] before the next one starts, and any failure aborts the
//! whole invocation: a partial summary is never returned.

pub mod prompt;

pub use prompt::{DEFAULT_WEB_SUMMARY_CHARS, PromptTemplate, SummaryPrompts};

use crate::accounting::CostAccountant;
use crate::chunking::{Document, TextSplitter};
use crate::config::{DEFAULT_MAX_COLLAPSE_ROUNDS, PipelineConfig};
use crate::error::{BriefError, Result};
use crate::events::{EventHandler, NoopHandler, SummarizeEvent};
use crate::llm::{LlmClient, invoke_with_timeout};
use crate::tokenizer::Tokenizer;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Separator between partial summaries when they are joined for combining.
const PARTIAL_SEPARATOR: &str = "\n\n";

/// How the summary was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Stuff,
    MapReduce,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Stuff => write!(f, "stuff"),
            Strategy::MapReduce => write!(f, "map-reduce"),
        }
    }
}

/// Caller preference for strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyHint {
    /// Stuff when the document fits the budget, map-reduce otherwise.
    #[default]
    Auto,
    /// Map-reduce even when the document would fit.
    ForceMapReduce,
}

/// Which step a priced call belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Stuff,
    /// Chunk summary; round 0 is the source document, later rounds collapse.
    Map { round: usize },
    Combine,
    Chat,
}

impl fmt::Display for CallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallPhase::Stuff => write!(f, "stuff"),
            CallPhase::Map { round: 0 } => write!(f, "map"),
            CallPhase::Map { round } => write!(f, "collapse[{round}]"),
            CallPhase::Combine => write!(f, "combine"),
            CallPhase::Chat => write!(f, "chat"),
        }
    }
}

/// Result of one `summarize` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    pub summary: String,
    /// Sum of the costs recorded by this invocation.
    pub cost: f64,
    pub strategy: Strategy,
    /// LLM calls issued and recorded.
    pub calls: usize,
    /// Map rounds run (0 for stuff, 1 when no collapse was needed).
    pub rounds: usize,
}

/// Running totals for the invocation in progress.
#[derive(Default)]
struct Tally {
    calls: usize,
    cost: f64,
}

/// Drives summary calls for one model client.
pub struct Summarizer<'a> {
    client: &'a dyn LlmClient,
    splitter: TextSplitter<'a>,
    event_handler: &'a dyn EventHandler,
    prompts: SummaryPrompts,
    overlap: usize,
    temperature: f32,
    call_timeout: Option<Duration>,
    max_collapse_rounds: usize,
}

impl<'a> Summarizer<'a> {
    pub fn new(client: &'a dyn LlmClient, tokenizer: &'a dyn Tokenizer) -> Self {
        Self {
            client,
            splitter: TextSplitter::new(tokenizer),
            event_handler: &NoopHandler,
            prompts: SummaryPrompts::default(),
            overlap: 0,
            temperature: 0.0,
            call_timeout: None,
            max_collapse_rounds: DEFAULT_MAX_COLLAPSE_ROUNDS,
        }
    }

    /// Replace the default splitter (e.g. to change separators).
    pub fn with_splitter(mut self, splitter: TextSplitter<'a>) -> Self {
        self.splitter = splitter;
        self
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    pub fn with_prompts(mut self, prompts: SummaryPrompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Take overlap, temperature, timeout and collapse cap from `config`.
    /// Model and reserve are passed per call to [`summarize`](Self::summarize).
    pub fn with_config(mut self, config: &PipelineConfig) -> Self {
        self.overlap = config.overlap;
        self.temperature = config.temperature;
        self.call_timeout = config.call_timeout;
        self.max_collapse_rounds = config.max_collapse_rounds;
        self
    }

    /// Summarize `document` with `model_id`, keeping `reserve` tokens of the
    /// context window free.
    pub async fn summarize(
        &self,
        accountant: &mut CostAccountant,
        document: &Document,
        model_id: &str,
        reserve: usize,
        hint: StrategyHint,
    ) -> Result<SummaryOutcome> {
        let budget = accountant.registry().budget_tokens(model_id, reserve)?;
        if document.text.trim().is_empty() {
            return Err(BriefError::ContentUnavailable(
                "document has no text".to_string(),
            ));
        }

        let document_tokens = self.estimate(&document.text, model_id);
        let strategy = match hint {
            StrategyHint::Auto if document_tokens <= budget => Strategy::Stuff,
            _ => Strategy::MapReduce,
        };
        info!(
            %strategy,
            document_tokens,
            budget,
            model = model_id,
            "summarizing document"
        );
        self.event_handler.on_event(&SummarizeEvent::StrategySelected {
            strategy,
            document_tokens,
            budget,
        });

        let mut tally = Tally::default();
        let (summary, rounds) = match strategy {
            Strategy::Stuff => {
                let text = self
                    .call(
                        accountant,
                        model_id,
                        &self.prompts.stuff,
                        &document.text,
                        CallPhase::Stuff,
                        &mut tally,
                    )
                    .await?;
                (text, 0)
            }
            Strategy::MapReduce => {
                self.map_reduce(
                    accountant,
                    &document.text,
                    document_tokens,
                    model_id,
                    budget,
                    &mut tally,
                )
                .await?
            }
        };

        self.event_handler.on_event(&SummarizeEvent::Finished {
            calls: tally.calls,
            cost: tally.cost,
        });
        Ok(SummaryOutcome {
            summary,
            cost: tally.cost,
            strategy,
            calls: tally.calls,
            rounds,
        })
    }

    async fn map_reduce(
        &self,
        accountant: &mut CostAccountant,
        source: &str,
        source_tokens: usize,
        model_id: &str,
        budget: usize,
        tally: &mut Tally,
    ) -> Result<(String, usize)> {
        let mut text = source.to_string();
        let mut tokens = source_tokens;
        let mut round = 0;

        loop {
            let chunks = self
                .splitter
                .split_text(&text, model_id, budget, self.overlap)?;
            self.event_handler.on_event(&SummarizeEvent::RoundStarted {
                round,
                chunks: chunks.len(),
                input_tokens: tokens,
            });
            debug!(round, chunks = chunks.len(), tokens, "map round");

            let mut partials: Vec<(usize, String)> = Vec::with_capacity(chunks.len());
            for chunk in &chunks {
                let summary = self
                    .call(
                        accountant,
                        model_id,
                        &self.prompts.map,
                        &chunk.text,
                        CallPhase::Map { round },
                        tally,
                    )
                    .await?;
                self.event_handler.on_event(&SummarizeEvent::ChunkSummarized {
                    round,
                    sequence_index: chunk.sequence_index,
                    chunks: chunks.len(),
                });
                partials.push((chunk.sequence_index, summary));
            }
            partials.sort_by_key(|(index, _)| *index);
            let joined = partials
                .into_iter()
                .map(|(_, summary)| summary)
                .collect::<Vec<_>>()
                .join(PARTIAL_SEPARATOR);
            let joined_tokens = self.estimate(&joined, model_id);
            round += 1;

            if joined_tokens <= budget {
                let summary = self
                    .call(
                        accountant,
                        model_id,
                        &self.prompts.combine,
                        &joined,
                        CallPhase::Combine,
                        tally,
                    )
                    .await?;
                return Ok((summary, round));
            }

            if joined_tokens >= tokens || round > self.max_collapse_rounds {
                return Err(BriefError::ReduceStalled {
                    rounds: round,
                    tokens: joined_tokens,
                    budget,
                });
            }
            debug!(
                round,
                from = tokens,
                to = joined_tokens,
                "partial summaries still over budget, collapsing"
            );
            text = joined;
            tokens = joined_tokens;
        }
    }

    /// One call: render, invoke, price. Nothing is recorded unless the call
    /// returned usage.
    async fn call(
        &self,
        accountant: &mut CostAccountant,
        model_id: &str,
        template: &PromptTemplate,
        text: &str,
        phase: CallPhase,
        tally: &mut Tally,
    ) -> Result<String> {
        let messages = template.to_messages(text);
        let completion = invoke_with_timeout(
            self.client,
            model_id,
            &messages,
            self.temperature,
            self.call_timeout,
        )
        .await?;
        let cost = accountant.record(completion.usage)?;
        tally.calls += 1;
        tally.cost += cost;
        self.event_handler
            .on_event(&SummarizeEvent::CallRecorded { phase, cost });
        Ok(completion.text)
    }

    fn estimate(&self, text: &str, model_id: &str) -> usize {
        self.splitter.tokenizer().estimate_tokens(text, model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::UsageRecord;
    use crate::llm::{ChatMessage, Completion, LlmFuture};
    use crate::registry::{ModelProfile, ModelRegistry};
    use crate::tokenizer::CharEstimator;
    use std::sync::Mutex;

    /// Replies "S<n>" to the n-th call and charges 1000 prompt tokens.
    struct Counting {
        prompts: Mutex<Vec<String>>,
    }

    impl Counting {
        fn new() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl LlmClient for Counting {
        fn invoke<'a>(
            &'a self,
            model_id: &'a str,
            messages: &'a [ChatMessage],
            _temperature: f32,
        ) -> LlmFuture<'a> {
            Box::pin(async move {
                let mut prompts = self.prompts.lock().unwrap();
                prompts.push(messages[0].content.clone());
                Ok(Completion {
                    text: format!("S{}", prompts.len()),
                    usage: UsageRecord::new(model_id, 1_000, 0),
                })
            })
        }
    }

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        registry
            .register(ModelProfile::new("test", 200, 1.0, 2.0))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn fitting_document_is_stuffed() {
        let client = Counting::new();
        let tokenizer = CharEstimator::new();
        let mut acc = CostAccountant::new(registry());
        let doc = Document::new("a short page");
        let outcome = Summarizer::new(&client, &tokenizer)
            .summarize(&mut acc, &doc, "test", 100, StrategyHint::Auto)
            .await
            .unwrap();
        assert_eq!(outcome.strategy, Strategy::Stuff);
        assert_eq!(outcome.calls, 1);
        assert_eq!(outcome.summary, "S1");
        assert_eq!(outcome.cost, 1.0);
        assert_eq!(acc.ledger().len(), 1);
    }

    #[tokio::test]
    async fn forced_map_reduce_maps_then_combines() {
        let client = Counting::new();
        let tokenizer = CharEstimator::new();
        let mut acc = CostAccountant::new(registry());
        let doc = Document::new("a short page");
        let outcome = Summarizer::new(&client, &tokenizer)
            .summarize(&mut acc, &doc, "test", 100, StrategyHint::ForceMapReduce)
            .await
            .unwrap();
        assert_eq!(outcome.strategy, Strategy::MapReduce);
        assert_eq!(outcome.calls, 2);
        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.summary, "S2");
    }

    #[tokio::test]
    async fn blank_document_is_unavailable() {
        let client = Counting::new();
        let tokenizer = CharEstimator::new();
        let mut acc = CostAccountant::new(registry());
        let err = Summarizer::new(&client, &tokenizer)
            .summarize(&mut acc, &Document::new(" \n"), "test", 100, StrategyHint::Auto)
            .await
            .unwrap_err();
        assert!(matches!(err, BriefError::ContentUnavailable(_)));
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reserve_too_large_fails_before_any_call() {
        let client = Counting::new();
        let tokenizer = CharEstimator::new();
        let mut acc = CostAccountant::new(registry());
        let err = Summarizer::new(&client, &tokenizer)
            .summarize(&mut acc, &Document::new("text"), "test", 200, StrategyHint::Auto)
            .await
            .unwrap_err();
        assert!(matches!(err, BriefError::InvalidBudget { .. }));
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    /// Echoes its input back, so partial summaries never shrink.
    struct Echo;

    impl LlmClient for Echo {
        fn invoke<'a>(
            &'a self,
            model_id: &'a str,
            messages: &'a [ChatMessage],
            _temperature: f32,
        ) -> LlmFuture<'a> {
            Box::pin(async move {
                Ok(Completion {
                    text: messages[0].content.clone(),
                    usage: UsageRecord::new(model_id, 1, 1),
                })
            })
        }
    }

    #[tokio::test]
    async fn non_shrinking_collapse_stalls_instead_of_looping() {
        let tokenizer = CharEstimator::new();
        let mut acc = CostAccountant::new(registry());
        let doc = Document::new("word ".repeat(200));
        let err = Summarizer::new(&Echo, &tokenizer)
            .summarize(&mut acc, &doc, "test", 100, StrategyHint::Auto)
            .await
            .unwrap_err();
        assert!(matches!(err, BriefError::ReduceStalled { rounds: 1, .. }), "{err}");
        // Every map call that completed was still paid for.
        assert!(!acc.ledger().is_empty());
    }

    #[test]
    fn phase_display() {
        assert_eq!(CallPhase::Map { round: 0 }.to_string(), "map");
        assert_eq!(CallPhase::Map { round: 2 }.to_string(), "collapse[2]");
        assert_eq!(Strategy::MapReduce.to_string(), "map-reduce");
    }
}
