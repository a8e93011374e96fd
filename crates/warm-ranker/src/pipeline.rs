//! End-to-end runs: contact rows in, ranked contacts out.

use anyhow::Result;
use std::path::Path;

use warm_ranker_core::enrich::{enrich_contacts, EnrichmentSummary};
use warm_ranker_core::models::{column_text, ContactRow, RankedContact};
use warm_ranker_core::rank::{rank, RankOutcome, RankServices};

use crate::context::RankerContext;
use crate::dataset::load_contacts;

/// Result of [`rank_contacts`]: output rows plus the loop's diagnostics.
pub struct PipelineRun {
    pub ranked: Vec<RankedContact>,
    pub outcome: RankOutcome,
    pub enrichment: EnrichmentSummary,
}

/// Enrich and index `rows`, clearing earlier contacts first when
/// `index.clear_before_ingest` is set. Callers must hold the run lock.
async fn ingest_locked(ctx: &RankerContext, rows: Vec<ContactRow>) -> Result<EnrichmentSummary> {
    let index = ctx.index().await?;
    let embedder = ctx.embedder().await?;

    if ctx.config.index.clear_before_ingest {
        index.clear().await?;
    }

    enrich_contacts(
        rows,
        ctx.enricher(),
        embedder.as_ref(),
        index.as_ref(),
        &ctx.config.enrichment.params(),
    )
    .await
}

/// Run only the enrichment stage.
pub async fn ingest_contacts(ctx: &RankerContext, rows: Vec<ContactRow>) -> Result<EnrichmentSummary> {
    let _guard = ctx.lock_run().await;
    ingest_locked(ctx, rows).await
}

/// Enrich, index, and rank `rows` against `idea`.
///
/// `iterations_override` replaces `ranking.iterations` for this run.
pub async fn rank_contacts(
    ctx: &RankerContext,
    idea: &str,
    rows: Vec<ContactRow>,
    iterations_override: Option<usize>,
) -> Result<PipelineRun> {
    let _guard = ctx.lock_run().await;

    tracing::info!(contacts = rows.len(), idea, "starting ranking run");
    let enrichment = ingest_locked(ctx, rows).await?;

    let index = ctx.index().await?;
    let embedder = ctx.embedder().await?;
    let mut params = ctx.config.ranking.params();
    if let Some(iterations) = iterations_override {
        params.iterations = iterations;
    }

    let services = RankServices {
        embedder: embedder.as_ref(),
        index: index.as_ref(),
        agent: ctx.agent(),
        model: ctx.model(),
    };
    let outcome = rank(idea, services, &params).await?;

    let ranked = outcome
        .ranked
        .iter()
        .cloned()
        .map(RankedContact::from)
        .collect();

    Ok(PipelineRun {
        ranked,
        outcome,
        enrichment,
    })
}

/// [`rank_contacts`] over a CSV file.
pub async fn rank_csv(
    ctx: &RankerContext,
    idea: &str,
    path: &Path,
    iterations_override: Option<usize>,
) -> Result<PipelineRun> {
    let rows = load_contacts(path)?;
    rank_contacts(ctx, idea, rows, iterations_override).await
}

/// [`ingest_contacts`] over a CSV file.
pub async fn ingest_csv(ctx: &RankerContext, path: &Path) -> Result<EnrichmentSummary> {
    let rows = load_contacts(path)?;
    ingest_contacts(ctx, rows).await
}

/// Render ranked contacts as a GitHub-flavored markdown table.
///
/// Columns are the first row's columns followed by `score` and `reason`.
/// Pipes and newlines inside cells are escaped.
pub fn render_markdown_table(rows: &[RankedContact]) -> String {
    let Some(first) = rows.first() else {
        return "No contacts ranked.\n".to_string();
    };

    let mut headers: Vec<&str> = first.data.keys().map(String::as_str).collect();
    headers.push("score");
    headers.push("reason");

    let mut out = String::new();
    out.push_str(&format!("| {} |\n", headers.join(" | ")));
    out.push_str(&format!(
        "|{}\n",
        headers.iter().map(|_| "---|").collect::<String>()
    ));

    for row in rows {
        let mut cells: Vec<String> = first
            .data
            .keys()
            .map(|k| escape_cell(&column_text(&row.data, k)))
            .collect();
        cells.push(row.score.to_string());
        cells.push(escape_cell(&row.reason));
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}
