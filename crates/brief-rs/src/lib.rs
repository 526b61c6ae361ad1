//! Budget-aware LLM summarization with per-call cost accounting.
//!
//! `brief-rs` takes a document of any length, decides whether it fits the
//! chosen model's context window, and either summarizes it in one call
//! ("stuff") or splits it into token-bounded chunks and runs map-reduce. Every
//! call is priced from the usage the provider reports and appended to a
//! per-session ledger. A small chat mode shares the same ledger.
//!
//! # Getting started
//!
//! ```ignore
//! use brief_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ChatClient::from_env()?;
//!     let fetcher = HttpContentFetcher::new()?;
//!     let config = PipelineConfig::default().with_model(ModelChoice::Gpt35Turbo16k);
//!
//!     let mut session = Session::new(ModelRegistry::builtin(), config)
//!         .with_event_handler(LoggingHandler);
//!     let result = session
//!         .summarize_web(&client, &fetcher, "https://example.com/article")
//!         .await?;
//!
//!     println!("{}", result.outcome.summary);
//!     println!("Total cost: {}", format_usd(session.total_cost()));
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Model limits and prices:** [`ModelRegistry`](registry::ModelRegistry)
//!   and [`ModelChoice`](registry::ModelChoice). Extra profiles load from JSON.
//! - **Splitting:** [`TextSplitter`](chunking::TextSplitter) with the
//!   [`Tokenizer`](tokenizer::Tokenizer) capability it estimates with.
//! - **Stuff vs. map-reduce:** [`Summarizer`](summarize::Summarizer) and the
//!   prompt presets in [`summarize::prompt`].
//! - **Costs:** [`CostAccountant`](accounting::CostAccountant) and its
//!   append-only [`CostLedger`](accounting::CostLedger).
//! - **Talking to a model:** the [`LlmClient`](llm::LlmClient) trait and its
//!   HTTP implementation [`ChatClient`](api::ChatClient).
//! - **Content:** [`source`] has the web fetcher and transcript loader.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`registry`] | Model profiles, input budgets |
//! | [`tokenizer`] | Exact BPE counts and conservative estimates |
//! | [`chunking`] | Recursive token-bounded splitter |
//! | [`accounting`] | Usage pricing and the cost ledger |
//! | [`conversation`] | Chat history |
//! | [`summarize`] | Strategy selection, map-reduce, prompts |
//! | [`session`] | Per-user state tying the above together |
//! | [`llm`], [`api`] | Model-call seam and the OpenAI-compatible client |
//! | [`source`] | Web page fetching, transcript loading |

pub mod accounting;
pub mod api;
pub mod chunking;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod llm;
pub mod prelude;
pub mod registry;
pub mod session;
pub mod source;
pub mod summarize;
pub mod tokenizer;

pub use config::PipelineConfig;
pub use error::{BriefError, Result};
pub use registry::{ModelChoice, ModelProfile, ModelRegistry};
