//! TOML configuration parsing and validation.
//!
//! Every section is optional; a missing section takes its defaults. See
//! `config/warm-ranker.example.toml` for an annotated example.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use warm_ranker_core::enrich::{EnrichmentParams, DEFAULT_ENRICH_CONCURRENCY};
use warm_ranker_core::rank::{
    RankParams, DEFAULT_ITERATIONS, DEFAULT_MAX_CANDIDATES, DEFAULT_NEUTRAL_SCORE,
    DEFAULT_REFINE_THRESHOLD,
};
use warm_ranker_core::score::MAX_SCORE;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

// ============ [index] ============

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `"sqlite"` or `"memory"`.
    #[serde(default = "default_index_backend")]
    pub backend: String,
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    /// Drop previously indexed contacts before ingesting a new list.
    #[serde(default = "default_true")]
    pub clear_before_ingest: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_index_backend(),
            path: default_index_path(),
            clear_before_ingest: true,
        }
    }
}

fn default_index_backend() -> String {
    "memory".to_string()
}
fn default_index_path() -> PathBuf {
    PathBuf::from("./data/contacts.sqlite")
}
fn default_true() -> bool {
    true
}

// ============ [embedding] ============

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"disabled"`, `"openai"`, `"ollama"`, `"local"`, or `"hash"`.
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for `ollama` (default `http://localhost:11434`) or an
    /// OpenAI-compatible endpoint for `openai`.
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the `openai` provider's API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

// ============ [llm] ============

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `"disabled"`, `"openai"`, or `"ollama"`.
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// OpenAI-compatible base URL including `/v1`, or the Ollama host.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            base_url: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_llm_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_max_tokens() -> u32 {
    512
}
fn default_llm_retries() -> u32 {
    3
}
fn default_llm_timeout_secs() -> u64 {
    60
}

// ============ [enrichment] ============

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichmentConfig {
    #[serde(default = "default_enrich_concurrency")]
    pub concurrency: usize,
    /// Page text beyond this many characters is not sent for summarization.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    #[serde(default = "default_url_column")]
    pub url_column: String,
    #[serde(default = "default_company_column")]
    pub company_column: String,
    #[serde(default = "default_position_column")]
    pub position_column: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            concurrency: default_enrich_concurrency(),
            max_content_chars: default_max_content_chars(),
            url_column: default_url_column(),
            company_column: default_company_column(),
            position_column: default_position_column(),
            timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl EnrichmentConfig {
    pub fn params(&self) -> EnrichmentParams {
        EnrichmentParams {
            concurrency: self.concurrency,
            url_column: self.url_column.clone(),
            company_column: self.company_column.clone(),
            position_column: self.position_column.clone(),
        }
    }
}

fn default_enrich_concurrency() -> usize {
    DEFAULT_ENRICH_CONCURRENCY
}
fn default_max_content_chars() -> usize {
    2000
}
fn default_url_column() -> String {
    "URL".to_string()
}
fn default_company_column() -> String {
    "Company".to_string()
}
fn default_position_column() -> String {
    "Position".to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    20
}
fn default_user_agent() -> String {
    format!("warm-ranker/{}", env!("CARGO_PKG_VERSION"))
}

// ============ [ranking] ============

#[derive(Debug, Deserialize, Clone)]
pub struct RankingConfig {
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_refine_threshold")]
    pub refine_threshold: f64,
    #[serde(default = "default_neutral_score")]
    pub neutral_score: u8,
    #[serde(default = "default_scoring_concurrency")]
    pub scoring_concurrency: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            max_candidates: default_max_candidates(),
            refine_threshold: default_refine_threshold(),
            neutral_score: default_neutral_score(),
            scoring_concurrency: default_scoring_concurrency(),
        }
    }
}

impl RankingConfig {
    pub fn params(&self) -> RankParams {
        RankParams {
            iterations: self.iterations,
            max_candidates: self.max_candidates,
            refine_threshold: self.refine_threshold,
            neutral_score: self.neutral_score,
            scoring_concurrency: self.scoring_concurrency,
        }
    }
}

fn default_iterations() -> usize {
    DEFAULT_ITERATIONS
}
fn default_max_candidates() -> usize {
    DEFAULT_MAX_CANDIDATES
}
fn default_refine_threshold() -> f64 {
    DEFAULT_REFINE_THRESHOLD
}
fn default_neutral_score() -> u8 {
    DEFAULT_NEUTRAL_SCORE
}
fn default_scoring_concurrency() -> usize {
    1
}

// ============ [server] ============

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

impl Config {
    /// All defaults: providers disabled, in-memory index.
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Read, parse, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match config.index.backend.as_str() {
        "sqlite" | "memory" => {}
        other => bail!(
            "Unknown index backend: '{}'. Must be sqlite or memory.",
            other
        ),
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" | "hash" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, local, or hash.",
            other
        ),
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }

    // Validate llm
    match config.llm.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.llm.is_enabled() && config.llm.model.is_none() {
        bail!(
            "llm.model must be specified when provider is '{}'",
            config.llm.provider
        );
    }

    // Validate enrichment
    if config.enrichment.concurrency == 0 {
        bail!("enrichment.concurrency must be >= 1");
    }
    if config.enrichment.max_content_chars == 0 {
        bail!("enrichment.max_content_chars must be > 0");
    }

    // Validate ranking
    let ranking = &config.ranking;
    if ranking.iterations == 0 {
        bail!("ranking.iterations must be >= 1");
    }
    if ranking.max_candidates == 0 {
        bail!("ranking.max_candidates must be >= 1");
    }
    if ranking.scoring_concurrency == 0 {
        bail!("ranking.scoring_concurrency must be >= 1");
    }
    if ranking.neutral_score > MAX_SCORE {
        bail!("ranking.neutral_score must be in [0, {}]", MAX_SCORE);
    }
    if !(0.0..=MAX_SCORE as f64).contains(&ranking.refine_threshold) {
        bail!("ranking.refine_threshold must be in [0.0, {}]", MAX_SCORE);
    }

    Ok(())
}
