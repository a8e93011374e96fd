//! In-memory [`VectorIndex`] for tests and single-run CLI use.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`, in insertion order.
//! Nearest-neighbour search is brute-force cosine distance over every
//! stored vector.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::models::{IndexHit, IndexRecord};

use super::{order_hits, VectorIndex};

pub struct InMemoryIndex {
    records: RwLock<Vec<(String, IndexRecord)>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, key: &str, record: &IndexRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        match records.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = record.clone(),
            None => records.push((key.to_string(), record.clone())),
        }
        Ok(())
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        let hits = records
            .iter()
            .map(|(key, record)| IndexHit {
                key: key.clone(),
                distance: cosine_distance(query, &record.vector),
                record: record.clone(),
            })
            .collect();
        Ok(order_hits(hits, k))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self
            .records
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?
            .len())
    }

    async fn get(&self, key: &str) -> Result<Option<IndexRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?;
        Ok(records
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, r)| r.clone()))
    }

    async fn clear(&self) -> Result<()> {
        self.records
            .write()
            .map_err(|_| anyhow!("in-memory index lock poisoned"))?
            .clear();
        Ok(())
    }
}
