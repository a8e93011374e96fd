//! Contracts for the language-model backed services.
//!
//! All three are black boxes to the core: the enrichment stage calls a
//! [`ProfileEnricher`], the ranking loop calls a [`ScoringAgent`] per
//! candidate and a [`LanguageModel`] to critique and rewrite its prompt.

use anyhow::Result;
use async_trait::async_trait;

/// Plain prompt-in, text-out completion.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short identifier used in logs (e.g. `"openai:gpt-4o-mini"`).
    fn name(&self) -> &str;
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Judges one profile against an instruction.
///
/// The returned text is free-form but is expected to contain
/// `Score: <int>` somewhere (see [`crate::score::extract_score`]).
#[async_trait]
pub trait ScoringAgent: Send + Sync {
    async fn run(&self, instruction: &str) -> Result<String>;
}

/// Fetches a profile URL and summarizes it into a short bio.
#[async_trait]
pub trait ProfileEnricher: Send + Sync {
    async fn enrich(&self, url: &str) -> Result<String>;
}
