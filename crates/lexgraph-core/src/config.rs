//! Configuration management for lexgraph.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (LEXGRAPH__ prefix, `__` separator)
//! 2. Config file (lexgraph.toml)
//! 3. Defaults

use serde::Deserialize;

use crate::error::ConfigError;

/// Top-level settings, one section per collaborator plus the engine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub neo4j: Neo4jSettings,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub engine: EngineSettings,
}

/// `[neo4j]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct Neo4jSettings {
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,

    /// Per-round-trip budget in milliseconds.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

/// `[llm]` section. An OpenAI-compatible chat/embeddings endpoint.
///
/// Leaving `endpoint` or `api_key` empty disables synthesis and translation;
/// the engine then answers with deterministic templates only.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Set for Azure deployments; switches URL layout and auth header.
    #[serde(default)]
    pub api_version: Option<String>,

    #[serde(default = "default_llm_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl LlmSettings {
    /// Whether enough is configured to reach an endpoint.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.api_key.trim().is_empty()
    }
}

/// `[engine]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Rows handed to the synthesizer per answer.
    #[serde(default = "default_max_items")]
    pub max_items_for_llm: usize,

    /// Hard row cap appended to unbounded queries.
    #[serde(default = "default_row_limit")]
    pub row_limit: usize,

    /// Page size for the streaming executor.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_max_cache_entries")]
    pub max_cache_entries: usize,

    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    #[serde(default = "default_synthesis_timeout_ms")]
    pub synthesis_timeout_ms: u64,

    /// Samples retained per intent in the performance log.
    #[serde(default = "default_perf_samples")]
    pub perf_samples_per_intent: usize,

    /// Last-resort reference table consulted when nothing else matched.
    #[serde(default)]
    pub known_agreements: Vec<KnownAgreement>,
}

/// A reference-table entry: an agreement expected to exist in the dataset.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct KnownAgreement {
    pub name: String,
    pub contract_id: i64,

    /// Lower-case phrases that identify this agreement in a question.
    #[serde(default)]
    pub aliases: Vec<String>,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

fn default_query_timeout_ms() -> u64 {
    30_000
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_llm_timeout_ms() -> u64 {
    60_000
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_items() -> usize {
    20
}

fn default_row_limit() -> usize {
    1000
}

fn default_batch_size() -> usize {
    100
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_max_cache_entries() -> usize {
    256
}

fn default_store_timeout_ms() -> u64 {
    30_000
}

fn default_synthesis_timeout_ms() -> u64 {
    60_000
}

fn default_perf_samples() -> usize {
    1000
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: String::new(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            api_version: None,
            timeout_ms: default_llm_timeout_ms(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_items_for_llm: default_max_items(),
            row_limit: default_row_limit(),
            batch_size: default_batch_size(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_cache_entries: default_max_cache_entries(),
            store_timeout_ms: default_store_timeout_ms(),
            synthesis_timeout_ms: default_synthesis_timeout_ms(),
            perf_samples_per_intent: default_perf_samples(),
            known_agreements: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from `{file_prefix}.toml` (optional) and the environment.
    pub fn load(file_prefix: &str) -> Result<Self, ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("LEXGRAPH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = cfg.try_deserialize()?;
        settings.validate()?;

        tracing::debug!(
            neo4j_uri = %settings.neo4j.uri,
            llm_configured = settings.llm.is_configured(),
            known_agreements = settings.engine.known_agreements.len(),
            "Settings loaded"
        );
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.batch_size == 0 {
            return Err(ConfigError::Invalid {
                key: "engine.batch_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.engine.max_items_for_llm == 0 {
            return Err(ConfigError::Invalid {
                key: "engine.max_items_for_llm".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
