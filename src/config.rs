//! TOML configuration.
//!
//! Only `[db]` and `[server]` are required; every other section has
//! defaults. Secrets never live in the file: API keys and access tokens are
//! read from the environment by the providers that need them.
//!
//! ```toml
//! [db]
//! path = "./data/finsight.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [pipeline]
//! mode = "static"          # or "keyword"
//!
//! [corpus]
//! source = "file"
//! path = "./data/corpus.json"
//!
//! [embedding]
//! provider = "ollama"
//! model = "nomic-embed-text"
//!
//! [generation]
//! provider = "gemini"
//! model = "gemini-2.0-flash-lite-001"
//!
//! [stocks]
//! provider = "yahoo"
//! ```

use anyhow::{bail, Context, Result};
use finsight_core::pipeline::{PipelineSettings, RetrievalMode};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub stocks: StocksConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// CORS origins. Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default)]
    pub mode: RetrievalMode,
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::Static,
            topics: default_topics(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_topics() -> Vec<String> {
    ["fraud", "trading", "stocks", "markets", "insurance"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}
fn default_max_entries() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_corpus_source")]
    pub source: String,
    /// JSON file of tagged rows (`file` source).
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Fully qualified `project.dataset.table` (`bigquery` source).
    #[serde(default)]
    pub table: Option<String>,
    /// GCP project that runs the query (`bigquery` source).
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_min_score")]
    pub min_score: i64,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_bigquery_url")]
    pub url: String,
    #[serde(default = "default_corpus_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            source: default_corpus_source(),
            path: None,
            table: None,
            project: None,
            min_score: default_min_score(),
            token_env: default_token_env(),
            url: default_bigquery_url(),
            timeout_secs: default_corpus_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_corpus_source() -> String {
    "file".to_string()
}
fn default_min_score() -> i64 {
    100
}
fn default_token_env() -> String {
    "GOOGLE_OAUTH_ACCESS_TOKEN".to_string()
}
fn default_bigquery_url() -> String {
    "https://bigquery.googleapis.com".to_string()
}
fn default_corpus_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for `ollama` and `gemini`; ignored by `openai`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    5
}
fn default_max_retries() -> u32 {
    1
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            url: None,
            max_output_tokens: default_max_output_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

fn default_max_output_tokens() -> u32 {
    1024
}
fn default_generation_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct StocksConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default = "default_yahoo_url")]
    pub url: String,
    #[serde(default = "default_range")]
    pub range: String,
    #[serde(default = "default_recent_days")]
    pub recent_days: usize,
    #[serde(default = "default_max_symbols")]
    pub max_symbols: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_stocks_timeout")]
    pub timeout_secs: u64,
}

impl Default for StocksConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            url: default_yahoo_url(),
            range: default_range(),
            recent_days: default_recent_days(),
            max_symbols: default_max_symbols(),
            max_retries: default_max_retries(),
            timeout_secs: default_stocks_timeout(),
        }
    }
}

fn default_yahoo_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}
fn default_range() -> String {
    "1mo".to_string()
}
fn default_recent_days() -> usize {
    5
}
fn default_max_symbols() -> usize {
    10
}
fn default_stocks_timeout() -> u64 {
    15
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// Settings handed to the core answer pipeline.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            mode: self.pipeline.mode,
            topics: self.pipeline.topics.clone(),
            max_entries: self.pipeline.max_entries,
            batch_size: self.embedding.batch_size,
            max_output_tokens: self.generation.max_output_tokens,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Pipeline
    if config.pipeline.max_entries == 0 {
        bail!("pipeline.max_entries must be > 0");
    }
    if config.pipeline.mode == RetrievalMode::Static
        && config.pipeline.topics.iter().all(|t| t.trim().is_empty())
    {
        bail!("pipeline.topics must contain at least one topic in static mode");
    }

    // Corpus
    match config.corpus.source.as_str() {
        "file" => {}
        "bigquery" => {
            if config.corpus.table.is_none() {
                bail!("corpus.table must be specified when source is 'bigquery'");
            }
            if config.corpus.project.is_none() {
                bail!("corpus.project must be specified when source is 'bigquery'");
            }
        }
        other => bail!(
            "Unknown corpus source: '{}'. Must be file or bigquery.",
            other
        ),
    }

    // Embedding
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" | "gemini" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, gemini, or local.",
            other
        ),
    }

    // Generation
    if config.generation.max_output_tokens == 0 {
        bail!("generation.max_output_tokens must be > 0");
    }
    match config.generation.provider.as_str() {
        "disabled" | "gemini" => {}
        "openai" | "ollama" => {
            if config.generation.model.is_none() {
                bail!(
                    "generation.model must be specified when provider is '{}'",
                    config.generation.provider
                );
            }
        }
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled, openai, ollama, or gemini.",
            other
        ),
    }

    // Stocks
    match config.stocks.provider.as_str() {
        "disabled" | "yahoo" => {}
        other => bail!(
            "Unknown stocks provider: '{}'. Must be disabled or yahoo.",
            other
        ),
    }
    if config.stocks.recent_days == 0 {
        bail!("stocks.recent_days must be > 0");
    }
    if config.stocks.max_symbols == 0 {
        bail!("stocks.max_symbols must be > 0");
    }

    Ok(())
}
