//! Configuration loading and validation.
//!
//! Settings come from an optional TOML file (every field has a default) plus
//! the process environment. API credentials are never read from the file:
//! they live in [`Credentials`], loaded from `OPENAI_API_KEY` and
//! `PINECONE_API_KEY` after an optional `.env` file has been applied.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:5001"
//!
//! [uploads]
//! dir = "uploads"
//!
//! [embedding]
//! model = "text-embedding-ada-002"
//! dims = 1536
//!
//! [vector_store]
//! index_name = "rag-chatbot-index"
//! dims = 1536
//!
//! [retrieval]
//! top_k = 3
//! greetings = ["hi", "hello", "hey", "hola"]
//! ```

use anyhow::{Context, Result};
use ragchat_core::prompt::DEFAULT_GREETINGS;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the OpenAI API key (embeddings + chat).
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Environment variable holding the Pinecone API key (vector index).
pub const PINECONE_API_KEY_VAR: &str = "PINECONE_API_KEY";
/// Environment variable overriding the port of `server.bind`.
pub const PORT_VAR: &str = "PORT";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5001".to_string()
}
fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadsConfig {
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Extra attempts after a retryable failure (429, 5xx, network).
    #[serde(default)]
    pub max_retries: u32,
    /// Per-request timeout. `None` waits indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            base_url: default_openai_base_url(),
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: None,
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            system_prompt: default_system_prompt(),
            base_url: default_openai_base_url(),
            max_retries: 0,
            timeout_secs: None,
        }
    }
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_control_url")]
    pub control_url: String,
    /// Data-plane URL of the index. Resolved through the control plane
    /// when absent.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            index_name: default_index_name(),
            dims: default_dims(),
            metric: default_metric(),
            cloud: default_cloud(),
            region: default_region(),
            control_url: default_control_url(),
            host: None,
            max_retries: 0,
            timeout_secs: None,
        }
    }
}

fn default_index_name() -> String {
    "rag-chatbot-index".to_string()
}
fn default_metric() -> String {
    "cosine".to_string()
}
fn default_cloud() -> String {
    "aws".to_string()
}
fn default_region() -> String {
    "us-west-2".to_string()
}
fn default_control_url() -> String {
    "https://api.pinecone.io".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_greetings")]
    pub greetings: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            greetings: default_greetings(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_greetings() -> Vec<String> {
    DEFAULT_GREETINGS.iter().map(|g| g.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ChunkingConfig {
    /// `0` embeds each document whole as a single record.
    #[serde(default)]
    pub max_tokens: usize,
}

impl ChunkingConfig {
    pub fn is_enabled(&self) -> bool {
        self.max_tokens > 0
    }
}

/// Fatal start-up error: a required credential is absent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing API key: {0} is not set (check your environment or .env file)")]
    MissingCredential(&'static str),
}

/// API credentials for the hosted services.
#[derive(Clone)]
pub struct Credentials {
    pub openai_api_key: String,
    pub pinecone_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &"<redacted>")
            .field("pinecone_api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read both keys from the environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build credentials from an arbitrary variable lookup. Empty values
    /// count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingCredential(name))
        };
        Ok(Self {
            openai_api_key: read(OPENAI_API_KEY_VAR)?,
            pinecone_api_key: read(PINECONE_API_KEY_VAR)?,
        })
    }
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist, then apply the `PORT` override and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        Config::default()
    };

    if let Ok(port) = std::env::var(PORT_VAR) {
        config.server.bind = apply_port_override(&config.server.bind, &port)?;
    }

    validate(&config)?;
    Ok(config)
}

/// Parse a TOML document into a [`Config`] without validating it.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

/// Replace the port of a `host:port` bind address.
pub fn apply_port_override(bind: &str, port: &str) -> Result<String> {
    let port: u16 = port
        .trim()
        .parse()
        .with_context(|| format!("{} must be a port number, got '{}'", PORT_VAR, port))?;
    let host = bind.rsplit_once(':').map(|(h, _)| h).unwrap_or(bind);
    Ok(format!("{}:{}", host, port))
}

pub fn validate(config: &Config) -> Result<()> {
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.vector_store.dims == 0 {
        anyhow::bail!("vector_store.dims must be > 0");
    }
    if config.embedding.dims != config.vector_store.dims {
        anyhow::bail!(
            "embedding.dims ({}) must equal vector_store.dims ({})",
            config.embedding.dims,
            config.vector_store.dims
        );
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    match config.vector_store.metric.as_str() {
        "cosine" | "euclidean" | "dotproduct" => {}
        other => anyhow::bail!(
            "Unknown vector_store.metric: '{}'. Must be cosine, euclidean, or dotproduct.",
            other
        ),
    }
    Ok(())
}
