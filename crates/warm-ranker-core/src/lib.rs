//! # Warm Ranker Core
//!
//! Runtime-agnostic logic for Warm Ranker: the contact data model, the
//! traits every external service is reached through, the score extractor,
//! the contact enrichment stage, and the iterative ranking loop.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. Concrete
//! providers (embedding APIs, chat models, the web enricher, the SQLite
//! index) live in the `warm-ranker` app crate.
//!
//! ```text
//! rows ──▶ enrich ──▶ embed ──▶ VectorIndex ──▶ nearest(k) ──▶ score ⟲ refine ──▶ sort
//! ```

pub mod agent;
pub mod embedding;
pub mod enrich;
pub mod index;
pub mod models;
pub mod rank;
pub mod score;
