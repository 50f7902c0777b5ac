#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;
use crate::retrieval::{RetrievalConfig, SearchType};

pub const CONFIG_FILE_NAME: &str = "local-rag.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
    /// File these settings were read from, if any
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

/// Connection to the Ollama-compatible embedding runtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
        }
    }
}

/// Generative model settings. `model_type` is kept as a raw string: an
/// unrecognized value is reported when the query session starts, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub model_type: String,
    pub model_path: String,
    pub n_ctx: u32,
    pub temperature: f32,
    pub stop: Vec<String>,
    pub use_mlock: bool,
    pub n_threads: u32,
    pub n_batch: u32,
    pub llama_cpp_url: Url,
    pub gpt4all_url: Url,
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_type: "LlamaCpp".to_string(),
            model_path: "llama3.2:latest".to_string(),
            n_ctx: 1000,
            temperature: 0.8,
            stop: Vec::new(),
            use_mlock: false,
            n_threads: 6,
            n_batch: 1000,
            llama_cpp_url: Url::parse("http://localhost:11434").expect("default url is valid"),
            gpt4all_url: Url::parse("http://localhost:4891").expect("default url is valid"),
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub persist_directory: PathBuf,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            persist_directory: PathBuf::from("db"),
            collection: "test".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IngestConfig {
    pub source_directory: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source_directory: PathBuf::from("source_documents"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Print a notice when an empty query is skipped
    pub announce_empty_queries: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            announce_empty_queries: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid context size: {0} (must be greater than 0)")]
    InvalidContextSize(u32),
    #[error("Invalid temperature: {0} (must be a finite value >= 0)")]
    InvalidTemperature(f32),
    #[error("Invalid collection name: '{0}' (cannot be empty)")]
    InvalidCollection(String),
    #[error("Invalid retrieval count: k = {0} (must be greater than 0)")]
    InvalidRetrievalCount(usize),
    #[error("fetch_k ({0}) must be at least k ({1})")]
    FetchCountTooSmall(usize, usize),
    #[error("Invalid lambda_mult: {0} (must be between 0.0 and 1.0)")]
    InvalidLambda(f32),
    #[error("Invalid value for {key}: '{value}'")]
    InvalidEnvValue { key: &'static str, value: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            embeddings: EmbeddingConfig::default(),
            model: ModelConfig::default(),
            store: StoreConfig::default(),
            ingest: IngestConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            session: SessionConfig::default(),
            base_dir: PathBuf::from("."),
            config_file: None,
        }
    }
}

impl Config {
    /// Per-user configuration directory, searched when the working directory
    /// has no config file
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("local-rag"))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Locate the config file: the working directory first, then the user
    /// configuration directory
    #[inline]
    pub fn discover_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }

        Self::config_dir()
            .ok()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .filter(|path| path.is_file())
    }

    /// Load configuration from `path`, or built-in defaults rooted at the
    /// working directory when no file is given
    #[inline]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(config_path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        config.config_file = Some(config_path.to_path_buf());

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Override settings from process environment keys (see `apply_env`)
    #[inline]
    pub fn with_process_env(self) -> Result<Self, ConfigError> {
        self.with_env(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides through `lookup`, then re-validate
    ///
    /// Recognized keys: `LLAMA_EMBEDDINGS_MODEL`, `PERSIST_DIRECTORY`, `MODEL_TYPE`,
    /// `MODEL_PATH`, `MODEL_N_CTX`, `MODEL_TEMP`, `MODEL_STOP`, `USE_MLOCK`,
    /// `SOURCE_DIRECTORY`, `EMBEDDINGS_URL`, `LLAMA_CPP_URL`, `GPT4ALL_URL`.
    #[inline]
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("LLAMA_EMBEDDINGS_MODEL") {
            self.embeddings.set_model(model)?;
        }
        if let Some(url) = lookup("EMBEDDINGS_URL") {
            self.embeddings.set_url(&url)?;
        }
        if let Some(dir) = lookup("PERSIST_DIRECTORY") {
            self.store.persist_directory = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("SOURCE_DIRECTORY") {
            self.ingest.source_directory = PathBuf::from(dir);
        }
        if let Some(model_type) = lookup("MODEL_TYPE") {
            self.model.model_type = model_type;
        }
        if let Some(model_path) = lookup("MODEL_PATH") {
            self.model.model_path = model_path;
        }
        if let Some(n_ctx) = lookup("MODEL_N_CTX") {
            self.model.n_ctx = parse_env("MODEL_N_CTX", &n_ctx)?;
        }
        if let Some(temp) = lookup("MODEL_TEMP") {
            self.model.temperature = parse_env("MODEL_TEMP", &temp)?;
        }
        if let Some(stop) = lookup("MODEL_STOP") {
            self.model.stop = parse_stop_list(&stop);
        }
        if let Some(mlock) = lookup("USE_MLOCK") {
            self.model.use_mlock = parse_bool("USE_MLOCK", &mlock)?;
        }
        if let Some(url) = lookup("LLAMA_CPP_URL") {
            self.model.llama_cpp_url = parse_url(&url)?;
        }
        if let Some(url) = lookup("GPT4ALL_URL") {
            self.model.gpt4all_url = parse_url(&url)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Get the base directory relative paths are resolved against
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embeddings.validate()?;
        self.model.validate()?;
        self.validate_chunking_config()?;
        self.validate_retrieval_config()?;

        if self.store.collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollection(
                self.store.collection.clone(),
            ));
        }

        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if config.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(config.chunk_size));
        }

        if config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                config.chunk_overlap,
                config.chunk_size,
            ));
        }

        Ok(())
    }

    fn validate_retrieval_config(&self) -> Result<(), ConfigError> {
        let config = &self.retrieval;

        if config.k == 0 {
            return Err(ConfigError::InvalidRetrievalCount(config.k));
        }

        if config.search_type == SearchType::Mmr && config.fetch_k < config.k {
            return Err(ConfigError::FetchCountTooSmall(config.fetch_k, config.k));
        }

        if !(0.0..=1.0).contains(&config.lambda_mult) {
            return Err(ConfigError::InvalidLambda(config.lambda_mult));
        }

        Ok(())
    }

    /// Get the path for the vector database directory
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join(&self.store.persist_directory)
    }

    /// Get the directory scanned for documents during ingestion
    #[inline]
    pub fn source_directory_path(&self) -> PathBuf {
        self.get_base_dir().join(&self.ingest.source_directory)
    }

    #[inline]
    pub fn embeddings_url(&self) -> Result<Url, ConfigError> {
        self.embeddings.embeddings_url()
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        Ok(())
    }

    pub fn embeddings_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    /// Set protocol, host and port from a single URL such as `http://gpu-box:11434`
    pub fn set_url(&mut self, url: &str) -> Result<(), ConfigError> {
        let parsed = parse_url(url)?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ConfigError::InvalidUrl(url.to_string()))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| ConfigError::InvalidUrl(url.to_string()))?;

        self.protocol = parsed.scheme().to_string();
        self.host = host.to_string();
        self.port = port;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model_path.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model_path.clone()));
        }

        if self.n_ctx == 0 {
            return Err(ConfigError::InvalidContextSize(self.n_ctx));
        }

        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        for url in [&self.llama_cpp_url, &self.gpt4all_url] {
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
            }
        }

        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnvValue {
            key,
            value: value.to_string(),
        })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Ok(true),
        "false" | "0" | "no" | "n" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnvValue {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_url(value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim()).map_err(|_| ConfigError::InvalidUrl(value.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
    }
    Ok(url)
}

/// Split a comma-separated stop list, dropping empty entries
#[inline]
pub fn parse_stop_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
