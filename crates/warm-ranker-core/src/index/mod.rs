//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the only way the enrichment stage and the
//! ranking loop touch storage. Backends: [`memory::InMemoryIndex`] here,
//! and the SQLite index in the app crate.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{IndexHit, IndexRecord};

/// Keyed store of contact records with k-nearest-neighbour search.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_schema`](VectorIndex::ensure_schema) | Create backing structures if absent |
/// | [`upsert`](VectorIndex::upsert) | Insert or replace a record by key |
/// | [`nearest`](VectorIndex::nearest) | Up to `k` records by ascending cosine distance |
/// | [`count`](VectorIndex::count) | Total stored records |
/// | [`get`](VectorIndex::get) | Fetch one record by key |
/// | [`clear`](VectorIndex::clear) | Remove every record |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the vector and text fields if they do not exist.
    ///
    /// Idempotent; concurrent callers must not fail because another
    /// caller created the schema first.
    async fn ensure_schema(&self) -> Result<()>;

    /// Store `record` under `key`, replacing any previous record.
    async fn upsert(&self, key: &str, record: &IndexRecord) -> Result<()>;

    /// Return at most `k` records ordered by ascending cosine distance to
    /// `query`. Equal distances keep insertion order.
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>>;

    /// Number of records currently stored.
    async fn count(&self) -> Result<usize>;

    async fn get(&self, key: &str) -> Result<Option<IndexRecord>>;

    /// Remove every record, keeping the schema.
    async fn clear(&self) -> Result<()>;
}

/// Sort hits by ascending distance (stable) and keep the first `k`.
pub fn order_hits(mut hits: Vec<IndexHit>, k: usize) -> Vec<IndexHit> {
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContactRow;

    fn hit(key: &str, distance: f32) -> IndexHit {
        IndexHit {
            key: key.to_string(),
            record: IndexRecord {
                data: ContactRow::new(),
                vector: Vec::new(),
                profile_text: String::new(),
                enriched_bio: String::new(),
            },
            distance,
        }
    }

    fn keys(hits: &[IndexHit]) -> Vec<&str> {
        hits.iter().map(|h| h.key.as_str()).collect()
    }

    #[test]
    fn test_order_hits_ascending_and_stable() {
        let hits = vec![hit("a", 0.5), hit("b", 0.1), hit("c", 0.5), hit("d", 0.9)];
        assert_eq!(keys(&order_hits(hits, 3)), ["b", "a", "c"]);
    }

    #[test]
    fn test_order_hits_puts_nan_distances_last() {
        let hits = vec![hit("nan", f32::NAN), hit("far", 0.8), hit("near", 0.2)];
        assert_eq!(keys(&order_hits(hits, 3)), ["near", "far", "nan"]);
    }
}
