//! # Warm Ranker
//!
//! **Rank a contact list by how warm a lead each contact is for an idea.**
//!
//! ## Data Flow
//!
//! 1. A CSV contact list is loaded into rows ([`dataset`]).
//! 2. Each contact's profile URL is scraped and summarized into a bio
//!    ([`scrape`]); failures keep the contact with a placeholder bio.
//! 3. `"{position} at {company} - Bio: {bio}"` is embedded ([`embedding`])
//!    and stored in a vector index ([`sqlite_index`] or in memory).
//! 4. The idea is embedded and the nearest contacts are scored by an LLM
//!    ([`scoring`], [`llm`]). Between rounds the scoring prompt is critiqued
//!    and rewritten.
//! 5. Results are returned highest score first, via the CLI or the HTTP
//!    API ([`server`]).
//!
//! The algorithmic core (enrichment stage, ranking loop, score parsing,
//! index contract) lives in `warm-ranker-core` and has no runtime
//! dependency; this crate supplies the concrete services.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`context`] | Shared services, created lazily |
//! | [`dataset`] | CSV loading |
//! | [`db`] | SQLite connection pool |
//! | [`embedding`] | Embedding providers (OpenAI, Ollama, fastembed, hash) |
//! | [`llm`] | Chat-completion clients |
//! | [`pipeline`] | End-to-end runs and table rendering |
//! | [`scoring`] | LLM-backed scoring agent |
//! | [`scrape`] | Profile page fetching and HTML-to-text |
//! | [`server`] | Axum HTTP API |
//! | [`sqlite_index`] | Persistent vector index |

pub mod config;
pub mod context;
pub mod dataset;
pub mod db;
pub mod embedding;
pub mod llm;
pub mod pipeline;
pub mod scoring;
pub mod scrape;
pub mod server;
pub mod sqlite_index;
