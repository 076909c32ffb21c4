use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the SkillScope server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the completion service used for summarization and analysis.
    pub completion_api_url: String,
    /// Optional bearer token sent to the completion service.
    pub completion_api_key: Option<String>,
    /// Model identifier passed with every completion request.
    pub completion_model: String,
    /// Sampling temperature passed with every completion request.
    pub completion_temperature: f32,
    /// Per-request timeout for completion calls, in seconds.
    pub completion_timeout_secs: u64,
    /// Maximum retries for transient completion failures.
    pub completion_max_retries: u32,
    /// Maximum characters per chunk in the map phase.
    pub chunk_max_chars: usize,
    /// Number of chunk summarization calls allowed in flight at once.
    pub map_concurrency: usize,
    /// Base URL of the object storage gateway.
    pub blob_store_url: String,
    /// Bucket holding original documents and analysis results.
    pub blob_bucket: String,
    /// Optional API key required by the object storage gateway.
    pub blob_api_key: Option<String>,
    /// Base URL of the metadata index service.
    pub metadata_store_url: String,
    /// Table holding analysis records, keyed by owner and timestamp.
    pub metadata_table: String,
    /// Optional API key required by the metadata index service.
    pub metadata_api_key: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            completion_api_url: load_env("COMPLETION_API_URL")?,
            completion_api_key: load_env_optional("COMPLETION_API_KEY"),
            completion_model: load_env("COMPLETION_MODEL")?,
            completion_temperature: parse_or_default("COMPLETION_TEMPERATURE", 0.7)?,
            completion_timeout_secs: parse_or_default("COMPLETION_TIMEOUT_SECS", 30)?,
            completion_max_retries: parse_or_default("COMPLETION_MAX_RETRIES", 2)?,
            chunk_max_chars: parse_or_default("CHUNK_MAX_CHARS", 1000)?,
            map_concurrency: parse_or_default("MAP_CONCURRENCY", 4)?,
            blob_store_url: load_env("BLOB_STORE_URL")?,
            blob_bucket: load_env("BLOB_BUCKET")?,
            blob_api_key: load_env_optional("BLOB_STORE_API_KEY"),
            metadata_store_url: load_env("METADATA_STORE_URL")?,
            metadata_table: load_env("METADATA_TABLE")?,
            metadata_api_key: load_env_optional("METADATA_STORE_API_KEY"),
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

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or_default<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        completion_api_url = %config.completion_api_url,
        completion_model = %config.completion_model,
        blob_bucket = %config.blob_bucket,
        metadata_table = %config.metadata_table,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
