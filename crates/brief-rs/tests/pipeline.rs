//! End-to-end pipeline tests against a scripted model client.
//!
//! The client never touches the network: each test decides what the "model"
//! answers and what usage it reports, then checks strategy selection, call
//! counts, ordering and the cost ledger.

use std::sync::Mutex;
use std::time::Duration;

use brief_rs::accounting::{CostAccountant, UsageRecord};
use brief_rs::chunking::{Document, TextSplitter};
use brief_rs::events::{FnEventHandler, SummarizeEvent};
use brief_rs::llm::{ChatMessage, Completion, LlmClient, LlmFuture};
use brief_rs::summarize::{Strategy, StrategyHint, Summarizer};
use brief_rs::tokenizer::{CharEstimator, Tokenizer};
use brief_rs::{BriefError, ModelProfile, ModelRegistry, PipelineConfig};

// ── Helpers ──────────────────────────────────────────────────────────

type Reply = Box<dyn Fn(usize, &str) -> Result<String, BriefError> + Send + Sync>;

/// Answers with `reply(call_index, prompt)` and reports 100 prompt + 10
/// completion tokens per successful call.
struct ScriptedClient {
    reply: Reply,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new(reply: impl Fn(usize, &str) -> Result<String, BriefError> + Send + Sync + 'static) -> Self {
        Self {
            reply: Box::new(reply),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn prompt(&self, index: usize) -> String {
        self.prompts.lock().unwrap()[index].clone()
    }
}

impl LlmClient for ScriptedClient {
    fn invoke<'a>(
        &'a self,
        model_id: &'a str,
        messages: &'a [ChatMessage],
        _temperature: f32,
    ) -> LlmFuture<'a> {
        Box::pin(async move {
            let prompt = messages[0].content.clone();
            let index = {
                let mut prompts = self.prompts.lock().unwrap();
                prompts.push(prompt.clone());
                prompts.len() - 1
            };
            // Later calls resolve faster; ordering must not depend on it.
            tokio::time::sleep(Duration::from_millis(50u64.saturating_sub(index as u64 * 5))).await;
            let text = (self.reply)(index, &prompt)?;
            Ok(Completion {
                text,
                usage: UsageRecord::new(model_id, 100, 10),
            })
        })
    }
}

/// "demo": 2,800 token context, so a 1,000 token reserve leaves 1,800.
fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry
        .register(ModelProfile::new("demo", 2_800, 0.5, 1.5))
        .unwrap();
    registry
        .register(ModelProfile::new("tiny", 400, 0.5, 1.5))
        .unwrap();
    registry
}

/// Roughly 5,000 estimated tokens in 56 tagged paragraphs.
fn long_document() -> Document {
    let body = (0..56)
        .map(|i| format!("P{i:02} {}", "The quick brown fox jumps over the lazy dog. ".repeat(6)))
        .collect::<Vec<_>>()
        .join("\n\n");
    Document::new(body)
}

/// Paragraph tags ("P07") in order of appearance.
fn tags(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches('"'))
        .filter(|w| {
            w.strip_prefix('P')
                .is_some_and(|n| n.len() == 2 && n.chars().all(|c| c.is_ascii_digit()))
        })
        .map(str::to_string)
        .collect()
}

fn first_tag(text: &str) -> String {
    tags(text).into_iter().next().unwrap_or_else(|| "?".to_string())
}

// ── Strategy and cost ────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn long_document_maps_three_chunks_then_combines() {
    let tokenizer = CharEstimator::new();
    let doc = long_document();
    let tokens = tokenizer.estimate_tokens(&doc.text, "demo");
    assert!(tokens >= 5_000, "document is {tokens} tokens");

    let chunks = TextSplitter::new(&tokenizer)
        .split(&doc, &registry(), "demo", 1_000, 0)
        .unwrap();
    assert!(chunks.len() >= 3);
    assert!(chunks.iter().all(|c| c.estimated_tokens <= 1_800));
    let indexes: Vec<usize> = chunks.iter().map(|c| c.sequence_index).collect();
    assert_eq!(indexes, (0..chunks.len()).collect::<Vec<_>>());

    let client = ScriptedClient::new(|i, prompt| {
        if prompt.contains("partial summaries") {
            Ok("FINAL".to_string())
        } else {
            Ok(format!("summary {i} of {}", first_tag(prompt)))
        }
    });
    let mut acc = CostAccountant::new(registry());
    let outcome = Summarizer::new(&client, &tokenizer)
        .summarize(&mut acc, &doc, "demo", 1_000, StrategyHint::Auto)
        .await
        .unwrap();

    assert_eq!(outcome.strategy, Strategy::MapReduce);
    assert_eq!(outcome.summary, "FINAL");
    assert_eq!(outcome.calls, chunks.len() + 1);
    assert_eq!(client.calls(), chunks.len() + 1);
    // 100 in at 0.5/1K + 10 out at 1.5/1K per call.
    let per_call = 0.05 + 0.015;
    assert!((outcome.cost - per_call * (chunks.len() + 1) as f64).abs() < 1e-9);
    assert_eq!(outcome.cost, acc.ledger().costs().sum::<f64>());
    assert_eq!(outcome.cost, acc.total());
}

#[tokio::test(start_paused = true)]
async fn short_document_is_one_call() {
    let tokenizer = CharEstimator::new();
    let client = ScriptedClient::new(|_, _| Ok("short".to_string()));
    let mut acc = CostAccountant::new(registry());
    let doc = Document::new("Just one paragraph about Rust ownership.");

    let outcome = Summarizer::new(&client, &tokenizer)
        .summarize(&mut acc, &doc, "demo", 1_000, StrategyHint::Auto)
        .await
        .unwrap();

    assert_eq!(outcome.strategy, Strategy::Stuff);
    assert_eq!(outcome.calls, 1);
    assert_eq!(outcome.summary, "short");
    assert!(client.prompt(0).contains("Just one paragraph about Rust ownership."));
    assert_eq!(acc.ledger().len(), 1);
}

// ── Ordering ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn combine_input_follows_chunk_order() {
    let tokenizer = CharEstimator::new();
    let client = ScriptedClient::new(|_, prompt| {
        if prompt.contains("partial summaries") {
            Ok("done".to_string())
        } else {
            Ok(first_tag(prompt))
        }
    });
    let mut acc = CostAccountant::new(registry());
    let outcome = Summarizer::new(&client, &tokenizer)
        .summarize(&mut acc, &long_document(), "demo", 1_000, StrategyHint::Auto)
        .await
        .unwrap();

    let combine_prompt = client.prompt(outcome.calls - 1);
    let tags = tags(&combine_prompt);
    let mut sorted = tags.clone();
    sorted.sort();
    assert!(tags.len() >= 3, "{combine_prompt}");
    assert_eq!(tags, sorted);
    assert_eq!(tags[0], "P00");
}

// ── Failure ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn second_map_failure_aborts_and_keeps_first_cost() {
    let tokenizer = CharEstimator::new();
    let client = ScriptedClient::new(|i, _| {
        if i == 1 {
            Err(BriefError::provider("http_500", "boom"))
        } else {
            Ok("ok".to_string())
        }
    });
    let mut acc = CostAccountant::new(registry());
    let err = Summarizer::new(&client, &tokenizer)
        .summarize(&mut acc, &long_document(), "demo", 1_000, StrategyHint::Auto)
        .await
        .unwrap_err();

    assert!(matches!(err, BriefError::Provider { ref code, .. } if code == "http_500"));
    assert_eq!(client.calls(), 2);
    assert_eq!(acc.ledger().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn call_timeout_is_a_provider_failure_with_no_cost() {
    struct Hanging;
    impl LlmClient for Hanging {
        fn invoke<'a>(
            &'a self,
            _model_id: &'a str,
            _messages: &'a [ChatMessage],
            _temperature: f32,
        ) -> LlmFuture<'a> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Err(BriefError::provider("unreachable", "unreachable"))
            })
        }
    }

    let tokenizer = CharEstimator::new();
    let config = PipelineConfig::default().with_call_timeout(Duration::from_secs(5));
    let mut acc = CostAccountant::new(registry());
    let err = Summarizer::new(&Hanging, &tokenizer)
        .with_config(&config)
        .summarize(&mut acc, &Document::new("text"), "demo", 1_000, StrategyHint::Auto)
        .await
        .unwrap_err();
    assert!(matches!(err, BriefError::Provider { ref code, .. } if code == "timeout"));
    assert!(acc.ledger().is_empty());
}

// ── Collapse rounds ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn oversized_partials_are_collapsed_before_combining() {
    let tokenizer = CharEstimator::new();
    let doc = Document::new(
        (0..30)
            .map(|_| "alpha ".repeat(50))
            .collect::<Vec<_>>()
            .join("\n\n"),
    );
    let client = ScriptedClient::new(|_, prompt| {
        Ok(if prompt.contains("alpha") {
            "beta ".repeat(30)
        } else if prompt.contains("beta") {
            "ok".to_string()
        } else {
            "final".to_string()
        })
    });
    let seen = Mutex::new(Vec::new());
    let handler = FnEventHandler::new(|e: &SummarizeEvent| seen.lock().unwrap().push(e.clone()));

    let mut acc = CostAccountant::new(registry());
    let outcome = Summarizer::new(&client, &tokenizer)
        .with_event_handler(&handler)
        .summarize(&mut acc, &doc, "tiny", 100, StrategyHint::Auto)
        .await
        .unwrap();

    assert_eq!(outcome.summary, "final");
    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.calls, acc.ledger().len());

    let events = seen.lock().unwrap();
    assert!(matches!(
        events.first(),
        Some(SummarizeEvent::StrategySelected {
            strategy: Strategy::MapReduce,
            budget: 300,
            ..
        })
    ));
    let rounds = events
        .iter()
        .filter(|e| matches!(e, SummarizeEvent::RoundStarted { .. }))
        .count();
    assert_eq!(rounds, 2);
    let priced = events
        .iter()
        .filter(|e| matches!(e, SummarizeEvent::CallRecorded { .. }))
        .count();
    assert_eq!(priced, outcome.calls);
    assert!(matches!(events.last(), Some(SummarizeEvent::Finished { .. })));
}

#[tokio::test(start_paused = true)]
async fn collapse_cap_reports_stall() {
    let tokenizer = CharEstimator::new();
    let doc = Document::new(
        (0..30)
            .map(|_| "alpha ".repeat(50))
            .collect::<Vec<_>>()
            .join("\n\n"),
    );
    // Each round shrinks, but only a little.
    let client = ScriptedClient::new(|_, prompt| {
        let body = prompt.split('"').nth(1).unwrap_or(prompt);
        Ok(body.chars().take(body.chars().count() * 9 / 10).collect())
    });
    let config = PipelineConfig::default().with_max_collapse_rounds(1);
    let mut acc = CostAccountant::new(registry());
    let err = Summarizer::new(&client, &tokenizer)
        .with_config(&config)
        .summarize(&mut acc, &doc, "tiny", 100, StrategyHint::Auto)
        .await
        .unwrap_err();
    assert!(matches!(err, BriefError::ReduceStalled { rounds: 2, .. }), "{err}");
    assert!(err.is_structural());
}

// ── Determinism ──────────────────────────────────────────────────────

#[test]
fn splitting_is_deterministic_with_overlap() {
    let tokenizer = CharEstimator::new();
    let splitter = TextSplitter::new(&tokenizer);
    let doc = long_document();
    let a = splitter.split(&doc, &registry(), "demo", 1_000, 200).unwrap();
    let b = splitter.split(&doc, &registry(), "demo", 1_000, 200).unwrap();
    assert_eq!(a, b);
    assert!(a.iter().all(|c| c.estimated_tokens <= 1_800));
}
