//! Per-call cost accounting for a session.
//!
//! Each completed LLM call hands its [`UsageRecord`] to the
//! [`CostAccountant`] exactly once. The accountant prices it against the
//! model registry and appends the result to an append-only [`CostLedger`].
//! The ledger total is always the sum of every value `record` returned:
//! nothing is recorded for a call whose usage the provider never reported.

use crate::error::Result;
use crate::registry::ModelRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Token usage reported by one LLM call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub model_id: String,
}

impl UsageRecord {
    pub fn new(model_id: impl Into<String>, prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            model_id: model_id.into(),
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens as u64 + self.completion_tokens as u64
    }
}

/// One priced call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub cost: f64,
    pub model_id: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only sequence of per-call costs.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct CostLedger {
    entries: Vec<LedgerEntry>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of every entry, in insertion order.
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.cost).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn costs(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|e| e.cost)
    }

    pub fn total_prompt_tokens(&self) -> u64 {
        self.entries.iter().map(|e| e.prompt_tokens as u64).sum()
    }

    pub fn total_completion_tokens(&self) -> u64 {
        self.entries.iter().map(|e| e.completion_tokens as u64).sum()
    }

    fn push(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    /// Only a session reset may clear the ledger.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Prices usage against the registry and keeps the session ledger.
#[derive(Debug, Clone)]
pub struct CostAccountant {
    registry: ModelRegistry,
    ledger: CostLedger,
}

impl CostAccountant {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry,
            ledger: CostLedger::new(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    /// Price one call and append it to the ledger.
    ///
    /// Fails without touching the ledger if the model id is unknown.
    pub fn record(&mut self, usage: UsageRecord) -> Result<f64> {
        let profile = self.registry.resolve(&usage.model_id)?;
        let cost = profile.cost(usage.prompt_tokens, usage.completion_tokens);
        debug!(
            model = %usage.model_id,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cost,
            "recorded call cost"
        );
        self.ledger.push(LedgerEntry {
            cost,
            model_id: usage.model_id,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            recorded_at: Utc::now(),
        });
        Ok(cost)
    }

    pub fn total(&self) -> f64 {
        self.ledger.total()
    }

    /// Format as a short summary string.
    pub fn summary(&self) -> String {
        let prompt = self.ledger.total_prompt_tokens();
        let completion = self.ledger.total_completion_tokens();
        format!(
            "calls: {}, tokens: {} prompt + {} completion = {} total, cost: {}",
            self.ledger.len(),
            prompt,
            completion,
            prompt + completion,
            format_usd(self.total()),
        )
    }

    pub(crate) fn reset(&mut self) {
        self.ledger.clear();
    }
}

/// Dollar amount with five decimals, e.g. `$0.00123`.
pub fn format_usd(cost: f64) -> String {
    format!("${cost:.5}")
}
