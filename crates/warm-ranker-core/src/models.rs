//! Contact, candidate, and ranking result types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One CSV row: column name → cell, in header order.
///
/// Rows pass through the pipeline untouched; derived fields (bio, profile
/// text, score, reason) live beside the row, never inside it.
pub type ContactRow = Map<String, Value>;

/// Bio stored for a contact whose enrichment failed.
pub const ENRICHMENT_FAILED: &str = "Enrichment failed";

/// Deterministic index key for the contact at `row_index`.
pub fn contact_key(row_index: usize) -> String {
    format!("contact:{}", row_index)
}

/// Read a column as text. Missing columns and nulls read as `""`.
pub fn column_text(row: &ContactRow, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Build the text that is both embedded and shown to the scoring agent.
pub fn profile_text(position: &str, company: &str, enriched_bio: &str) -> String {
    format!("{} at {} - Bio: {}", position, company, enriched_bio)
}

/// The JSON document stored per contact in a vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Original row, verbatim.
    pub data: ContactRow,
    /// Embedding of `profile_text`.
    pub vector: Vec<f32>,
    pub profile_text: String,
    #[serde(default)]
    pub enriched_bio: String,
}

/// A record returned from [`VectorIndex::nearest`](crate::index::VectorIndex::nearest).
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub key: String,
    pub record: IndexRecord,
    /// Cosine distance to the query (`1 - similarity`); lower is closer.
    pub distance: f32,
}

/// An enriched, embedded contact eligible for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub key: String,
    pub record: IndexRecord,
}

/// A candidate after the scoring agent has judged it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub key: String,
    pub data: ContactRow,
    pub profile_text: String,
    /// Always within `0..=10`.
    pub score: u8,
    pub reason: String,
}

/// Output row: the original columns plus `score` and `reason`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedContact {
    #[serde(flatten)]
    pub data: ContactRow,
    pub score: u8,
    pub reason: String,
}

impl From<ScoredCandidate> for RankedContact {
    fn from(c: ScoredCandidate) -> Self {
        Self {
            data: c.data,
            score: c.score,
            reason: c.reason,
        }
    }
}
