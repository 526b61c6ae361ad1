//! One user's state: conversation history, cost ledger, settings.
//!
//! Every operation that reaches a model goes through a [`Session`], so the
//! ledger of that session sees every priced call. Sessions share nothing but
//! an immutable copy of the model registry.

use crate::accounting::{CostAccountant, CostLedger};
use crate::chunking::{Document, META_SOURCE};
use crate::config::PipelineConfig;
use crate::conversation::{Conversation, Message, Role};
use crate::error::{BriefError, Result};
use crate::events::{EventHandler, NoopHandler, SummarizeEvent};
use crate::llm::{ChatMessage, LlmClient, invoke_with_timeout};
use crate::registry::ModelRegistry;
use crate::source::{ContentFetcher, TranscriptLoader, validate_url};
use crate::summarize::{CallPhase, StrategyHint, SummaryOutcome, SummaryPrompts, Summarizer};
use crate::tokenizer::{BpeTokenizer, Tokenizer};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Generate a unique session id.
pub fn generate_session_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let ts = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("ss-{ts:x}-{count:04x}")
}

/// Reply to one chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub reply: String,
    pub cost: f64,
}

/// A summary together with the document it was made from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedSummary {
    pub document: Document,
    pub outcome: SummaryOutcome,
}

pub struct Session {
    id: String,
    started_at: DateTime<Utc>,
    config: PipelineConfig,
    conversation: Conversation,
    accountant: CostAccountant,
    tokenizer: Box<dyn Tokenizer>,
    event_handler: Box<dyn EventHandler>,
}

impl Session {
    pub fn new(registry: ModelRegistry, config: PipelineConfig) -> Self {
        let id = generate_session_id();
        info!("session {id} started with model {}", config.model);
        Self {
            id,
            started_at: Utc::now(),
            config,
            conversation: Conversation::default(),
            accountant: CostAccountant::new(registry),
            tokenizer: Box::new(BpeTokenizer::default()),
            event_handler: Box::new(NoopHandler),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.conversation = Conversation::new(prompt);
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: impl Tokenizer + 'static) -> Self {
        self.tokenizer = Box::new(tokenizer);
        self
    }

    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.event_handler = Box::new(handler);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Change settings for subsequent calls. History and costs are kept.
    pub fn set_config(&mut self, config: PipelineConfig) {
        self.config = config;
    }

    pub fn history(&self) -> &[Message] {
        self.conversation.history()
    }

    /// Every priced call of this session, in order.
    pub fn costs(&self) -> &CostLedger {
        self.accountant.ledger()
    }

    pub fn total_cost(&self) -> f64 {
        self.accountant.total()
    }

    pub fn accountant(&self) -> &CostAccountant {
        &self.accountant
    }

    /// Clear history (re-seeding the system message) and costs together.
    pub fn reset(&mut self) {
        self.conversation.reset();
        self.accountant.reset();
        info!("session {} reset", self.id);
    }

    /// Send `input` with the whole history and append the reply.
    ///
    /// On failure the user message is removed again, so the history never
    /// ends with an unanswered turn.
    pub async fn chat(&mut self, client: &dyn LlmClient, input: &str) -> Result<ChatTurn> {
        let model_id = self.config.model.clone();
        self.accountant.registry().resolve(&model_id)?;

        self.conversation.append(Role::User, input);
        let messages: Vec<ChatMessage> = self
            .conversation
            .history()
            .iter()
            .map(ChatMessage::from)
            .collect();

        let result = invoke_with_timeout(
            client,
            &model_id,
            &messages,
            self.config.temperature,
            self.config.call_timeout,
        )
        .await
        .and_then(|completion| {
            let cost = self.accountant.record(completion.usage)?;
            Ok(ChatTurn {
                reply: completion.text,
                cost,
            })
        });

        match result {
            Ok(turn) => {
                self.event_handler.on_event(&SummarizeEvent::CallRecorded {
                    phase: CallPhase::Chat,
                    cost: turn.cost,
                });
                self.conversation.append(Role::Assistant, turn.reply.as_str());
                Ok(turn)
            }
            Err(e) => {
                warn!("chat turn failed, rolling back: {e}");
                self.conversation.pop_unanswered();
                Err(e)
            }
        }
    }

    /// Fetch a web page and summarize it. The conversation is not touched.
    pub async fn summarize_web(
        &mut self,
        client: &dyn LlmClient,
        fetcher: &dyn ContentFetcher,
        url: &str,
    ) -> Result<SourcedSummary> {
        if !validate_url(url) {
            return Err(BriefError::InvalidUrl(url.to_string()));
        }
        let text = fetcher.fetch(url).await.ok_or_else(|| {
            BriefError::ContentUnavailable(format!("could not fetch readable text from {url}"))
        })?;
        let document = Document::new(text).with_metadata(META_SOURCE, url);
        let prompts = SummaryPrompts::web(self.config.web_summary_chars);
        let hint = self.config.strategy_hint;
        self.summarize_document(client, document, prompts, hint).await
    }

    /// Load a transcript and summarize it. The conversation is not touched.
    pub async fn summarize_video(
        &mut self,
        client: &dyn LlmClient,
        loader: &dyn TranscriptLoader,
        locator: &str,
    ) -> Result<SourcedSummary> {
        let document = loader.load(locator).await.ok_or_else(|| {
            BriefError::ContentUnavailable(format!("no transcript available for {locator}"))
        })?;
        let hint = self.config.strategy_hint;
        self.summarize_document(client, document, SummaryPrompts::video(), hint)
            .await
    }

    /// Summarize an already-loaded document with explicit prompts.
    pub async fn summarize_document(
        &mut self,
        client: &dyn LlmClient,
        document: Document,
        prompts: SummaryPrompts,
        hint: StrategyHint,
    ) -> Result<SourcedSummary> {
        let summarizer = Summarizer::new(client, self.tokenizer.as_ref())
            .with_event_handler(self.event_handler.as_ref())
            .with_prompts(prompts)
            .with_config(&self.config);
        let outcome = summarizer
            .summarize(
                &mut self.accountant,
                &document,
                &self.config.model,
                self.config.reserve,
                hint,
            )
            .await?;
        Ok(SourcedSummary { document, outcome })
    }
}
