//! Model profiles: context window size and per-token pricing.
//!
//! Profiles are registered once, at session construction, and never change
//! afterwards. Every lookup goes through [`ModelRegistry::resolve`], which
//! fails loudly on an unknown id instead of falling back to a guessed price
//! or window size.

use crate::error::{BriefError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Context window and pricing for one model id. Prices are USD per 1K tokens.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelProfile {
    pub id: String,
    pub max_context_tokens: usize,
    pub price_in_per_1k: f64,
    pub price_out_per_1k: f64,
}

impl ModelProfile {
    pub fn new(
        id: impl Into<String>,
        max_context_tokens: usize,
        price_in_per_1k: f64,
        price_out_per_1k: f64,
    ) -> Self {
        Self {
            id: id.into(),
            max_context_tokens,
            price_in_per_1k,
            price_out_per_1k,
        }
    }

    /// Cost of one call with the given token counts.
    pub fn cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 / 1000.0) * self.price_in_per_1k
            + (completion_tokens as f64 / 1000.0) * self.price_out_per_1k
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| BriefError::InvalidProfile {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.id.trim().is_empty() {
            return Err(invalid("empty id"));
        }
        if self.max_context_tokens == 0 {
            return Err(invalid("max_context_tokens must be > 0"));
        }
        for price in [self.price_in_per_1k, self.price_out_per_1k] {
            if !price.is_finite() || price < 0.0 {
                return Err(invalid("prices must be finite and >= 0"));
            }
        }
        Ok(())
    }
}

/// Static id → profile mapping.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    profiles: BTreeMap<String, ModelProfile>,
}

impl ModelRegistry {
    /// An empty registry. Most callers want [`ModelRegistry::builtin`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the OpenAI chat models the front end offers.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for choice in ModelChoice::ALL {
            registry
                .profiles
                .insert(choice.id().to_string(), choice.builtin_profile());
        }
        registry
    }

    /// Add a profile. Duplicate ids are rejected: profiles are immutable once
    /// registered.
    pub fn register(&mut self, profile: ModelProfile) -> Result<()> {
        profile.validate()?;
        if self.profiles.contains_key(&profile.id) {
            return Err(BriefError::InvalidProfile {
                id: profile.id,
                reason: "already registered".into(),
            });
        }
        self.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    /// Builder form of [`register`](Self::register) for a JSON array of
    /// profiles, e.g. the contents of a `models.json` file.
    pub fn with_profiles_json(mut self, json: &str) -> Result<Self> {
        let profiles: Vec<ModelProfile> =
            serde_json::from_str(json).map_err(|e| BriefError::InvalidProfile {
                id: "<json>".into(),
                reason: e.to_string(),
            })?;
        for profile in profiles {
            self.register(profile)?;
        }
        Ok(self)
    }

    pub fn resolve(&self, model_id: &str) -> Result<&ModelProfile> {
        self.profiles
            .get(model_id)
            .ok_or_else(|| BriefError::UnknownModel(model_id.to_string()))
    }

    /// Tokens left for input text after reserving room for prompt overhead
    /// and the response.
    pub fn budget_tokens(&self, model_id: &str, reserve: usize) -> Result<usize> {
        let profile = self.resolve(model_id)?;
        match profile.max_context_tokens.checked_sub(reserve) {
            Some(budget) if budget > 0 => Ok(budget),
            _ => Err(BriefError::InvalidBudget {
                model_id: model_id.to_string(),
                max_context_tokens: profile.max_context_tokens,
                reserve,
            }),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// The models offered to the user, mapped one-to-one onto registry ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelChoice {
    #[default]
    Gpt35Turbo,
    Gpt35Turbo16k,
    Gpt4,
    Gpt4_32k,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 4] = [
        ModelChoice::Gpt35Turbo,
        ModelChoice::Gpt35Turbo16k,
        ModelChoice::Gpt4,
        ModelChoice::Gpt4_32k,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ModelChoice::Gpt35Turbo => "gpt-3.5-turbo",
            ModelChoice::Gpt35Turbo16k => "gpt-3.5-turbo-16k",
            ModelChoice::Gpt4 => "gpt-4",
            ModelChoice::Gpt4_32k => "gpt-4-32k",
        }
    }

    /// Label shown in model pickers.
    pub fn label(self) -> &'static str {
        match self {
            ModelChoice::Gpt35Turbo => "GPT-3.5",
            ModelChoice::Gpt35Turbo16k => "GPT-3.5-16k",
            ModelChoice::Gpt4 => "GPT-4",
            ModelChoice::Gpt4_32k => "GPT-4-32k",
        }
    }

    fn builtin_profile(self) -> ModelProfile {
        // USD per 1K tokens, OpenAI list prices for these snapshots.
        match self {
            ModelChoice::Gpt35Turbo => ModelProfile::new(self.id(), 4_096, 0.0015, 0.002),
            ModelChoice::Gpt35Turbo16k => ModelProfile::new(self.id(), 16_384, 0.003, 0.004),
            ModelChoice::Gpt4 => ModelProfile::new(self.id(), 8_192, 0.03, 0.06),
            ModelChoice::Gpt4_32k => ModelProfile::new(self.id(), 32_768, 0.06, 0.12),
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ModelChoice {
    type Err = BriefError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim();
        ModelChoice::ALL
            .into_iter()
            .find(|c| c.id() == needle || c.label().eq_ignore_ascii_case(needle))
            .ok_or_else(|| BriefError::UnknownModel(needle.to_string()))
    }
}
