//! Contact enrichment stage.
//!
//! Turns raw contact rows into indexed candidates:
//!
//! 1. Ensure the index schema exists.
//! 2. Enrich every row's profile URL with bounded parallelism. A failed
//!    enrichment becomes [`ENRICHMENT_FAILED`] and the contact stays in.
//! 3. Build the profile text, embed it, and upsert the record under
//!    `contact:{row_index}`. Embedding and index errors abort the stage.

use anyhow::{bail, Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::agent::ProfileEnricher;
use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::models::{
    column_text, contact_key, profile_text, Candidate, ContactRow, IndexRecord, ENRICHMENT_FAILED,
};

/// Default number of enrichment calls in flight at once.
pub const DEFAULT_ENRICH_CONCURRENCY: usize = 5;

/// Column names and parallelism for the enrichment stage.
#[derive(Debug, Clone)]
pub struct EnrichmentParams {
    pub concurrency: usize,
    pub url_column: String,
    pub company_column: String,
    pub position_column: String,
}

impl Default for EnrichmentParams {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_ENRICH_CONCURRENCY,
            url_column: "URL".to_string(),
            company_column: "Company".to_string(),
            position_column: "Position".to_string(),
        }
    }
}

/// Result of [`enrich_contacts`].
#[derive(Debug, Clone)]
pub struct EnrichmentSummary {
    /// One candidate per input row, in row order.
    pub candidates: Vec<Candidate>,
    pub enriched: usize,
    pub failed: usize,
}

/// Enrich, embed, and index every row.
pub async fn enrich_contacts(
    rows: Vec<ContactRow>,
    enricher: &dyn ProfileEnricher,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    params: &EnrichmentParams,
) -> Result<EnrichmentSummary> {
    index
        .ensure_schema()
        .await
        .context("Failed to prepare vector index schema")?;

    let bios = enrich_bios(&rows, enricher, params).await;
    let failed = bios.iter().filter(|b| b.is_none()).count();

    let mut candidates = Vec::with_capacity(rows.len());
    for (i, (data, bio)) in rows.into_iter().zip(bios).enumerate() {
        let enriched_bio = bio.unwrap_or_else(|| ENRICHMENT_FAILED.to_string());
        let text = profile_text(
            &column_text(&data, &params.position_column),
            &column_text(&data, &params.company_column),
            &enriched_bio,
        );
        let vector = embedder
            .embed(&text)
            .await
            .with_context(|| format!("Failed to embed profile for row {}", i))?;

        let key = contact_key(i);
        let record = IndexRecord {
            data,
            vector,
            profile_text: text,
            enriched_bio,
        };
        index
            .upsert(&key, &record)
            .await
            .with_context(|| format!("Failed to store {}", key))?;
        candidates.push(Candidate { key, record });
    }

    let summary = EnrichmentSummary {
        enriched: candidates.len() - failed,
        failed,
        candidates,
    };
    info!(
        contacts = summary.candidates.len(),
        enriched = summary.enriched,
        failed = summary.failed,
        "enrichment stage complete"
    );
    Ok(summary)
}

/// Enrich every row concurrently. `None` marks a failed enrichment.
async fn enrich_bios(
    rows: &[ContactRow],
    enricher: &dyn ProfileEnricher,
    params: &EnrichmentParams,
) -> Vec<Option<String>> {
    let mut bios: Vec<Option<String>> = vec![None; rows.len()];

    let futures: Vec<_> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let url = column_text(row, &params.url_column);
            async move { (i, enrich_one(enricher, &url).await) }
        })
        .collect();
    let mut results = stream::iter(futures).buffer_unordered(params.concurrency.max(1));

    while let Some((i, outcome)) = results.next().await {
        match outcome {
            Ok(bio) => {
                debug!(row = i, "enriched contact");
                bios[i] = Some(bio);
            }
            Err(e) => warn!(row = i, error = %e, "enrichment failed, using sentinel bio"),
        }
    }

    bios
}

async fn enrich_one(enricher: &dyn ProfileEnricher, url: &str) -> Result<String> {
    if url.trim().is_empty() {
        bail!("contact has no profile URL");
    }
    enricher.enrich(url.trim()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::InMemoryIndex;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use serde_json::Value;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context as TaskContext, Poll};

    /// Returns `Pending` once so sibling futures get polled.
    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = ();
        fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    struct FakeEnricher {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeEnricher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProfileEnricher for FakeEnricher {
        async fn enrich(&self, url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            YieldOnce(false).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if url.contains("broken") {
                bail!("scrape timed out");
            }
            Ok(format!("bio for {}", url))
        }
    }

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, text.len() as f32 / 100.0])
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl Embedder for BrokenEmbedder {
        fn model_name(&self) -> &str {
            "broken"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            bail!("embedding service unreachable")
        }
    }

    fn contact(name: &str, company: &str, position: &str, url: &str) -> ContactRow {
        let mut row = ContactRow::new();
        for (k, v) in [
            ("First Name", name),
            ("Company", company),
            ("Position", position),
            ("URL", url),
        ] {
            row.insert(k.to_string(), Value::String(v.to_string()));
        }
        row
    }

    #[test]
    fn test_one_failure_does_not_block_others() {
        let rows = vec![
            contact("John", "AI Marketing Inc", "CTO", "https://example.com/john"),
            contact("Broke", "Nowhere", "Intern", "https://example.com/broken"),
            contact("Jane", "Tech Startup", "Marketer", "https://example.com/jane"),
        ];
        let enricher = FakeEnricher::new();
        let index = InMemoryIndex::new();

        let summary = block_on(enrich_contacts(
            rows,
            &enricher,
            &LengthEmbedder,
            &index,
            &EnrichmentParams::default(),
        ))
        .unwrap();

        assert_eq!(summary.candidates.len(), 3);
        assert_eq!(summary.enriched, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(block_on(index.count()).unwrap(), 3);

        let failed = &summary.candidates[1];
        assert_eq!(failed.key, "contact:1");
        assert_eq!(failed.record.enriched_bio, ENRICHMENT_FAILED);
        assert_eq!(
            failed.record.profile_text,
            "Intern at Nowhere - Bio: Enrichment failed"
        );
        assert_eq!(
            summary.candidates[0].record.profile_text,
            "CTO at AI Marketing Inc - Bio: bio for https://example.com/john"
        );
    }

    #[test]
    fn test_stored_data_is_original_row() {
        let row = contact("Jane", "Tech Startup", "Marketer", "https://example.com/jane");
        let index = InMemoryIndex::new();
        block_on(enrich_contacts(
            vec![row.clone()],
            &FakeEnricher::new(),
            &LengthEmbedder,
            &index,
            &EnrichmentParams::default(),
        ))
        .unwrap();

        let stored = block_on(index.get("contact:0")).unwrap().unwrap();
        assert_eq!(stored.data, row);
        assert_eq!(stored.vector.len(), 2);
    }

    #[test]
    fn test_missing_url_uses_sentinel_without_calling_enricher() {
        let mut row = contact("Nobody", "Acme", "Founder", "");
        row.remove("URL");
        let enricher = FakeEnricher::new();
        let index = InMemoryIndex::new();

        let summary = block_on(enrich_contacts(
            vec![row],
            &enricher,
            &LengthEmbedder,
            &index,
            &EnrichmentParams::default(),
        ))
        .unwrap();

        assert_eq!(enricher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.candidates[0].record.enriched_bio, ENRICHMENT_FAILED);
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let rows: Vec<ContactRow> = (0..12)
            .map(|i| contact("N", "C", "P", &format!("https://example.com/{}", i)))
            .collect();
        let enricher = FakeEnricher::new();
        let params = EnrichmentParams {
            concurrency: 3,
            ..EnrichmentParams::default()
        };

        block_on(enrich_contacts(
            rows,
            &enricher,
            &LengthEmbedder,
            &InMemoryIndex::new(),
            &params,
        ))
        .unwrap();

        assert_eq!(enricher.calls.load(Ordering::SeqCst), 12);
        assert_eq!(enricher.max_in_flight.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_embedding_failure_propagates() {
        let rows = vec![contact("John", "Acme", "CTO", "https://example.com/john")];
        let err = block_on(enrich_contacts(
            rows,
            &FakeEnricher::new(),
            &BrokenEmbedder,
            &InMemoryIndex::new(),
            &EnrichmentParams::default(),
        ))
        .unwrap_err();
        assert!(format!("{:#}", err).contains("embedding service unreachable"));
    }

    #[test]
    fn test_custom_column_names() {
        let mut row = ContactRow::new();
        row.insert("Title".into(), Value::String("VP Sales".into()));
        row.insert("Org".into(), Value::String("Globex".into()));
        row.insert("Profile".into(), Value::String("https://example.com/vp".into()));
        let params = EnrichmentParams {
            url_column: "Profile".into(),
            company_column: "Org".into(),
            position_column: "Title".into(),
            ..EnrichmentParams::default()
        };

        let summary = block_on(enrich_contacts(
            vec![row],
            &FakeEnricher::new(),
            &LengthEmbedder,
            &InMemoryIndex::new(),
            &params,
        ))
        .unwrap();

        assert_eq!(
            summary.candidates[0].record.profile_text,
            "VP Sales at Globex - Bio: bio for https://example.com/vp"
        );
    }

    fn boxed_enrich<'a>(
        rows: Vec<ContactRow>,
        enricher: &'a dyn ProfileEnricher,
        embedder: &'a dyn Embedder,
        index: &'a dyn VectorIndex,
        params: &'a EnrichmentParams,
    ) -> futures::future::BoxFuture<'a, Result<EnrichmentSummary>> {
        Box::pin(enrich_contacts(rows, enricher, embedder, index, params))
    }

    #[test]
    fn test_enrich_future_is_send() {
        let enricher = FakeEnricher::new();
        let index = InMemoryIndex::new();
        let params = EnrichmentParams::default();

        let summary = block_on(boxed_enrich(
            vec![contact("John", "Acme", "CTO", "https://example.com/john")],
            &enricher,
            &LengthEmbedder,
            &index,
            &params,
        ))
        .unwrap();
        assert_eq!(summary.enriched, 1);
    }
}
