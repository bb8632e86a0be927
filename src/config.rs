use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the corpus server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Directory holding uploaded documents and corpus snapshots.
    pub data_dir: PathBuf,
    /// Base URL of the Ollama runtime used for embeddings and generation.
    pub ollama_url: String,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Default model used for chat completions when the request omits one.
    pub generation_model: String,
    /// Chunk size (in characters) applied when a request does not override it.
    pub chunk_size: usize,
    /// Number of chunks retrieved per query when the request omits a count.
    pub retrieval_top_k: usize,
    /// Upper bound on the per-query chunk count.
    pub retrieval_max_top_k: usize,
    /// Timeout applied to embedding and generation requests, in seconds.
    pub request_timeout_secs: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
const DEFAULT_GENERATION_MODEL: &str = "tinyllama";
const DEFAULT_CHUNK_SIZE: usize = 500;
const DEFAULT_TOP_K: usize = 5;
const DEFAULT_MAX_TOP_K: usize = 50;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            data_dir: load_env_optional("CORPUSD_DATA_DIR")
                .map_or_else(|| PathBuf::from("data"), PathBuf::from),
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: parse_env_or("EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION)?,
            generation_model: load_env_optional("GENERATION_MODEL")
                .unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string()),
            chunk_size: parse_env_or("CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            retrieval_top_k: parse_env_or("RETRIEVAL_TOP_K", DEFAULT_TOP_K)?,
            retrieval_max_top_k: parse_env_or("RETRIEVAL_MAX_TOP_K", DEFAULT_MAX_TOP_K)?,
            request_timeout_secs: parse_env_or(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key).map_or(Ok(default), |value| {
        value
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string()))
    })
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Install a fixed configuration for unit tests. Safe to call from multiple
/// tests; only the first call wins, so every test sees the same values.
#[cfg(test)]
pub fn init_test_config() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = CONFIG.set(Config {
            data_dir: "unused".into(),
            ollama_url: "http://127.0.0.1:11434".into(),
            embedding_model: "test-model".into(),
            embedding_dimension: 8,
            generation_model: "test-gen".into(),
            chunk_size: 500,
            retrieval_top_k: 5,
            retrieval_max_top_k: 50,
            request_timeout_secs: 5,
            server_port: None,
        });
    });
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        data_dir = %config.data_dir.display(),
        ollama_url = %config.ollama_url,
        embedding_model = %config.embedding_model,
        embedding_dimension = config.embedding_dimension,
        chunk_size = config.chunk_size,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
