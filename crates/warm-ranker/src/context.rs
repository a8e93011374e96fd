//! Shared services for one process: config, index, embedder, models.
//!
//! Built once by the CLI or server and passed by reference. The index and
//! embedder are created on first use, so commands that never touch them
//! (and a server that is only health-checked) never open the database or
//! load a model.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OnceCell};

use warm_ranker_core::agent::{LanguageModel, ProfileEnricher, ScoringAgent};
use warm_ranker_core::embedding::Embedder;
use warm_ranker_core::index::memory::InMemoryIndex;
use warm_ranker_core::index::VectorIndex;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::llm::create_language_model;
use crate::scoring::LlmScoringAgent;
use crate::scrape::WebProfileEnricher;
use crate::sqlite_index::SqliteIndex;

pub struct RankerContext {
    pub config: Config,
    index: OnceCell<Arc<dyn VectorIndex>>,
    embedder: OnceCell<Arc<dyn Embedder>>,
    model: Option<Arc<dyn LanguageModel>>,
    agent: Option<Arc<dyn ScoringAgent>>,
    enricher: Arc<dyn ProfileEnricher>,
    run_lock: Mutex<()>,
}

impl RankerContext {
    /// Build from config. Fails only on invalid language-model settings
    /// (e.g. a missing API key); index and embedder errors surface on first use.
    pub fn new(config: Config) -> Result<Self> {
        let model = create_language_model(&config.llm)?;
        let agent = model
            .clone()
            .map(|m| Arc::new(LlmScoringAgent::new(m)) as Arc<dyn ScoringAgent>);
        let enricher = Arc::new(WebProfileEnricher::new(&config.enrichment, model.clone())?);

        Ok(Self {
            config,
            index: OnceCell::new(),
            embedder: OnceCell::new(),
            model,
            agent,
            enricher,
            run_lock: Mutex::new(()),
        })
    }

    /// Build from explicit services, bypassing config-driven construction.
    pub fn from_parts(
        config: Config,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        model: Option<Arc<dyn LanguageModel>>,
        agent: Option<Arc<dyn ScoringAgent>>,
        enricher: Arc<dyn ProfileEnricher>,
    ) -> Self {
        Self {
            config,
            index: OnceCell::new_with(Some(index)),
            embedder: OnceCell::new_with(Some(embedder)),
            model,
            agent,
            enricher,
            run_lock: Mutex::new(()),
        }
    }

    /// The vector index, connecting and creating the schema on first call.
    pub async fn index(&self) -> Result<Arc<dyn VectorIndex>> {
        let index = self
            .index
            .get_or_try_init(|| async {
                let index: Arc<dyn VectorIndex> = match self.config.index.backend.as_str() {
                    "sqlite" => {
                        let pool = db::connect(&self.config.index.path).await?;
                        Arc::new(SqliteIndex::new(pool))
                    }
                    _ => Arc::new(InMemoryIndex::new()),
                };
                index
                    .ensure_schema()
                    .await
                    .context("Failed to prepare vector index schema")?;
                tracing::debug!(backend = %self.config.index.backend, "vector index ready");
                Ok::<_, anyhow::Error>(index)
            })
            .await?;
        Ok(Arc::clone(index))
    }

    pub async fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        let embedder = self
            .embedder
            .get_or_try_init(|| async { create_embedder(&self.config.embedding) })
            .await?;
        Ok(Arc::clone(embedder))
    }

    pub fn model(&self) -> Option<&dyn LanguageModel> {
        self.model.as_deref()
    }

    pub fn agent(&self) -> Option<&dyn ScoringAgent> {
        self.agent.as_deref()
    }

    pub fn enricher(&self) -> &dyn ProfileEnricher {
        self.enricher.as_ref()
    }

    /// Held for the whole of a pipeline run; runs share the `contact:{i}` keys.
    pub async fn lock_run(&self) -> MutexGuard<'_, ()> {
        self.run_lock.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_minimal_context_has_no_model() {
        let ctx = RankerContext::new(Config::minimal()).unwrap();
        assert!(ctx.model().is_none());
        assert!(ctx.agent().is_none());
        assert_eq!(ctx.embedder().await.unwrap().model_name(), "disabled");
    }

    #[tokio::test]
    async fn test_index_is_created_once() {
        let ctx = RankerContext::new(Config::minimal()).unwrap();
        let a = ctx.index().await.unwrap();
        let b = ctx.index().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_sqlite_backend_creates_database_lazily() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::minimal();
        config.index.backend = "sqlite".to_string();
        config.index.path = tmp.path().join("nested").join("contacts.sqlite");

        let ctx = RankerContext::new(config).unwrap();
        assert!(!tmp.path().join("nested").exists());

        let index = ctx.index().await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        assert!(tmp.path().join("nested").join("contacts.sqlite").exists());
    }
}
