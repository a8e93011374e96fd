//! SQLite-backed [`VectorIndex`].
//!
//! One row per contact in `contact_vectors`: the JSON document (row,
//! profile text, bio), the embedding as a little-endian `f32` BLOB, and its
//! dimensionality. Nearest-neighbour search loads every vector and ranks by
//! cosine distance in process.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use warm_ranker_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use warm_ranker_core::index::{order_hits, VectorIndex};
use warm_ranker_core::models::{ContactRow, IndexHit, IndexRecord};

/// The JSON stored in the `document` column. The vector lives in its own
/// BLOB column.
#[derive(Serialize, Deserialize)]
struct StoredDocument {
    data: ContactRow,
    profile_text: String,
    #[serde(default)]
    enriched_bio: String,
}

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn decode(document: &str, embedding: &[u8]) -> Result<IndexRecord> {
        let doc: StoredDocument =
            serde_json::from_str(document).context("Corrupt contact document in index")?;
        Ok(IndexRecord {
            data: doc.data,
            vector: blob_to_vec(embedding),
            profile_text: doc.profile_text,
            enriched_bio: doc.enriched_bio,
        })
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS contact_vectors (
                key TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dims INTEGER NOT NULL,
                indexed_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert(&self, key: &str, record: &IndexRecord) -> Result<()> {
        let document = serde_json::to_string(&StoredDocument {
            data: record.data.clone(),
            profile_text: record.profile_text.clone(),
            enriched_bio: record.enriched_bio.clone(),
        })?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO contact_vectors (key, document, embedding, dims, indexed_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                document = excluded.document,
                embedding = excluded.embedding,
                dims = excluded.dims,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(key)
        .bind(&document)
        .bind(vec_to_blob(&record.vector))
        .bind(record.vector.len() as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        let rows = sqlx::query("SELECT key, document, embedding FROM contact_vectors ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let key: String = row.get("key");
            let document: String = row.get("document");
            let blob: Vec<u8> = row.get("embedding");
            let record = Self::decode(&document, &blob)?;
            hits.push(IndexHit {
                distance: cosine_distance(query, &record.vector),
                key,
                record,
            });
        }

        Ok(order_hits(hits, k))
    }

    async fn count(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM contact_vectors")
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n as usize)
    }

    async fn get(&self, key: &str) -> Result<Option<IndexRecord>> {
        let row = sqlx::query("SELECT document, embedding FROM contact_vectors WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let document: String = row.get("document");
                let blob: Vec<u8> = row.get("embedding");
                Ok(Some(Self::decode(&document, &blob)?))
            }
            None => Ok(None),
        }
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM contact_vectors")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
