//! Iterative ranking loop.
//!
//! # Algorithm
//!
//! 1. Embed the idea into a query vector.
//! 2. Retrieve `k = min(max_candidates, indexed)` nearest candidates.
//! 3. Start from a fixed scoring prompt.
//! 4. For each iteration: score every candidate with the agent, average the
//!    scores, and refine the prompt through the language model whenever the
//!    average is below the threshold or more iterations remain. A failed
//!    refinement ends the loop with the scores already collected.
//! 5. Stable sort by score, highest first.
//!
//! Per-candidate failures degrade to a score of 0. With no scoring agent at
//! all, every candidate gets the neutral score instead of an error. Only
//! embedding and index failures reach the caller.

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::agent::{LanguageModel, ScoringAgent};
use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::models::{IndexHit, ScoredCandidate};
use crate::score::{average_score, extract_score};

/// Upper bound on candidates retrieved for LLM scoring.
pub const DEFAULT_MAX_CANDIDATES: usize = 50;
pub const DEFAULT_ITERATIONS: usize = 2;
/// Average score under which the prompt is refined even on the last round.
pub const DEFAULT_REFINE_THRESHOLD: f64 = 7.0;
pub const DEFAULT_NEUTRAL_SCORE: u8 = 5;
/// Scores shown per iteration in logs and reports.
const SAMPLE_SCORES: usize = 5;

/// Reason attached to every candidate when no scoring agent is available.
pub const SCORING_UNAVAILABLE: &str = "Scoring service unavailable; assigned neutral score.";

/// Ranking tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct RankParams {
    pub iterations: usize,
    pub max_candidates: usize,
    pub refine_threshold: f64,
    pub neutral_score: u8,
    /// Candidates scored concurrently within one iteration.
    pub scoring_concurrency: usize,
}

impl Default for RankParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            max_candidates: DEFAULT_MAX_CANDIDATES,
            refine_threshold: DEFAULT_REFINE_THRESHOLD,
            neutral_score: DEFAULT_NEUTRAL_SCORE,
            scoring_concurrency: 1,
        }
    }
}

/// External services the loop calls.
///
/// `agent` and `model` are optional: a missing agent triggers the
/// neutral-score fallback, a missing model makes refinement fail.
#[derive(Clone, Copy)]
pub struct RankServices<'a> {
    pub embedder: &'a dyn Embedder,
    pub index: &'a dyn VectorIndex,
    pub agent: Option<&'a dyn ScoringAgent>,
    pub model: Option<&'a dyn LanguageModel>,
}

/// What happened in one scoring round.
#[derive(Debug, Clone, Serialize)]
pub struct IterationReport {
    pub iteration: usize,
    pub avg_score: f64,
    /// Prompt the candidates were scored with.
    pub prompt: String,
    /// First few scores, in retrieval order.
    pub sample_scores: Vec<u8>,
    /// Whether a refined prompt was produced after this round.
    pub refined: bool,
}

/// Final ranking plus the trail that produced it.
#[derive(Debug, Clone)]
pub struct RankOutcome {
    /// Highest score first.
    pub ranked: Vec<ScoredCandidate>,
    pub iterations: Vec<IterationReport>,
    pub final_prompt: String,
    /// Set when the neutral-score fallback was used.
    pub scoring_unavailable: bool,
    /// Set when refinement failed and the loop stopped early.
    pub stopped_early: Option<String>,
}

/// The prompt the first iteration scores with.
pub fn initial_prompt(idea: &str) -> String {
    format!(
        "Score lead relevance to idea '{}' on 1-10 based on title, company, bio. \
         Provide score and brief reason.",
        idea
    )
}

/// `min(max_candidates, total)`.
pub fn retrieval_limit(max_candidates: usize, total: usize) -> usize {
    max_candidates.min(total)
}

/// Refine unless this is the last iteration and the average cleared the
/// threshold.
pub fn should_refine(avg_score: f64, iteration: usize, iterations: usize, threshold: f64) -> bool {
    avg_score < threshold || iteration + 1 < iterations
}

/// Stable sort, highest score first.
pub fn sort_by_score_desc(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
}

/// Rank the indexed contacts against `idea`.
pub async fn rank(idea: &str, services: RankServices<'_>, params: &RankParams) -> Result<RankOutcome> {
    let query = services
        .embedder
        .embed(idea)
        .await
        .context("Failed to embed idea")?;

    let total = services
        .index
        .count()
        .await
        .context("Failed to count indexed contacts")?;
    let k = retrieval_limit(params.max_candidates, total);
    let hits = if k == 0 {
        Vec::new()
    } else {
        services
            .index
            .nearest(&query, k)
            .await
            .context("Nearest-neighbour search failed")?
    };
    info!(indexed = total, retrieved = hits.len(), "retrieved candidates");

    let mut prompt = initial_prompt(idea);

    let Some(agent) = services.agent else {
        warn!("no scoring agent available, assigning neutral scores");
        return Ok(RankOutcome {
            ranked: neutral_scores(hits, params.neutral_score),
            iterations: Vec::new(),
            final_prompt: prompt,
            scoring_unavailable: true,
            stopped_early: None,
        });
    };

    let iterations = params.iterations.max(1);
    let mut scored: Vec<ScoredCandidate> = Vec::new();
    let mut reports = Vec::with_capacity(iterations);
    let mut stopped_early = None;

    for iteration in 0..iterations {
        scored = score_round(agent, &prompt, &hits, params.scoring_concurrency).await;

        let scores: Vec<u8> = scored.iter().map(|c| c.score).collect();
        let avg_score = average_score(&scores);
        let round_prompt = prompt.clone();
        let mut refined = false;

        if should_refine(avg_score, iteration, iterations, params.refine_threshold) {
            match refine_prompt(services.model, idea, &prompt, &scores).await {
                Ok(next) => {
                    prompt = next;
                    refined = true;
                }
                Err(e) if iteration + 1 < iterations => {
                    warn!(iteration, error = %e, "prompt refinement failed, stopping early");
                    stopped_early = Some(e.to_string());
                }
                Err(e) => {
                    warn!(iteration, error = %e, "prompt refinement after the last round failed");
                }
            }
        }

        let report = IterationReport {
            iteration,
            avg_score,
            prompt: round_prompt,
            sample_scores: scores.iter().take(SAMPLE_SCORES).copied().collect(),
            refined,
        };
        info!(
            iteration = report.iteration,
            avg_score = report.avg_score,
            refined = report.refined,
            sample_scores = ?report.sample_scores,
            "ranking iteration complete"
        );
        reports.push(report);

        if stopped_early.is_some() {
            break;
        }
    }

    sort_by_score_desc(&mut scored);

    Ok(RankOutcome {
        ranked: scored,
        iterations: reports,
        final_prompt: prompt,
        scoring_unavailable: false,
        stopped_early,
    })
}

fn neutral_scores(hits: Vec<IndexHit>, neutral_score: u8) -> Vec<ScoredCandidate> {
    hits.into_iter()
        .map(|hit| ScoredCandidate {
            key: hit.key,
            data: hit.record.data,
            profile_text: hit.record.profile_text,
            score: neutral_score,
            reason: SCORING_UNAVAILABLE.to_string(),
        })
        .collect()
}

/// Score every hit with `prompt`. Output order matches `hits`.
async fn score_round(
    agent: &dyn ScoringAgent,
    prompt: &str,
    hits: &[IndexHit],
    concurrency: usize,
) -> Vec<ScoredCandidate> {
    let futures: Vec<_> = hits
        .iter()
        .map(|hit| score_candidate(agent, prompt, hit))
        .collect();
    stream::iter(futures)
        .buffered(concurrency.max(1))
        .collect()
        .await
}

async fn score_candidate(agent: &dyn ScoringAgent, prompt: &str, hit: &IndexHit) -> ScoredCandidate {
    let instruction = format!("{} Analyze profile: {}", prompt, hit.record.profile_text);
    let (score, reason) = match agent.run(&instruction).await {
        Ok(analysis) => (extract_score(&analysis), analysis),
        Err(e) => {
            warn!(key = %hit.key, error = %e, "scoring failed, defaulting to 0");
            (0, format!("Scoring failed: {}", e))
        }
    };
    ScoredCandidate {
        key: hit.key.clone(),
        data: hit.record.data.clone(),
        profile_text: hit.record.profile_text.clone(),
        score,
        reason,
    }
}

/// Ask the model to critique the score distribution, then rewrite the prompt.
async fn refine_prompt(
    model: Option<&dyn LanguageModel>,
    idea: &str,
    prompt: &str,
    scores: &[u8],
) -> Result<String> {
    let Some(model) = model else {
        bail!("no language model available for prompt refinement");
    };

    let reflection = model
        .complete(&format!(
            "Review scores: {:?}. Suggest prompt improvements for '{}'.",
            scores, idea
        ))
        .await
        .context("Score review failed")?;

    let refined = model
        .complete(&format!("Refine this prompt: {} based on {}", prompt, reflection))
        .await
        .context("Prompt rewrite failed")?;

    let refined = refined.trim();
    if refined.is_empty() {
        bail!("language model returned an empty prompt");
    }
    Ok(refined.to_string())
}
