
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::chunking::{ChunkingConfig, HEADER_BUFFER_TOKENS};
use crate::retrieval::RetrievalConfig;

/// Overrides the default `~/.kb-search` configuration directory
pub const HOME_ENV_VAR: &str = "KB_SEARCH_HOME";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DATABASE_FILE_NAME: &str = "knowledge.db";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid max tokens: {0} (must be between 100 and 4096)")]
    InvalidMaxTokens(usize),
    #[error("Min tokens ({0}) must be smaller than max tokens ({1})")]
    MinTokensTooLarge(usize, usize),
    #[error("Invalid overlap tokens: {0} (must be between 0 and 512)")]
    InvalidOverlapTokens(usize),
    #[error("Max tokens ({0}) leave no room for body text after header and overlap ({1})")]
    NoBodyBudget(usize, usize),
    #[error("Invalid default limit: {0} (must be between 1 and 50)")]
    InvalidDefaultLimit(usize),
    #[error("Invalid max query terms: {0} (must be between 1 and 64)")]
    InvalidMaxQueryTerms(usize),
    #[error("Invalid cache TTL: {0} seconds (must be at most 86400)")]
    InvalidCacheTtl(u64),
    #[error("Invalid cache capacity: {0} (must be at least 1)")]
    InvalidCacheCapacity(usize),
    #[error("Invalid search timeout: {0} ms (must be at least 1)")]
    InvalidSearchTimeout(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// `$KB_SEARCH_HOME` when set, `~/.kb-search` otherwise
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(home) = std::env::var_os(HOME_ENV_VAR).filter(|value| !value.is_empty()) {
            return Ok(PathBuf::from(home));
        }

        dirs::home_dir()
            .map(|home| home.join(".kb-search"))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("kb-search"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_chunking_config()?;
        self.validate_retrieval_config()?;
        Ok(())
    }

    fn validate_chunking_config(&self) -> Result<(), ConfigError> {
        let config = &self.chunking;

        if !(100..=4096).contains(&config.max_tokens) {
            return Err(ConfigError::InvalidMaxTokens(config.max_tokens));
        }

        if config.min_tokens >= config.max_tokens {
            return Err(ConfigError::MinTokensTooLarge(
                config.min_tokens,
                config.max_tokens,
            ));
        }

        if config.overlap_tokens > 512 {
            return Err(ConfigError::InvalidOverlapTokens(config.overlap_tokens));
        }

        let reserved = HEADER_BUFFER_TOKENS + config.overlap_tokens;
        if config.max_tokens <= reserved {
            return Err(ConfigError::NoBodyBudget(config.max_tokens, reserved));
        }

        Ok(())
    }

    fn validate_retrieval_config(&self) -> Result<(), ConfigError> {
        let config = &self.retrieval;

        if !(1..=50).contains(&config.default_limit) {
            return Err(ConfigError::InvalidDefaultLimit(config.default_limit));
        }

        if !(1..=64).contains(&config.max_query_terms) {
            return Err(ConfigError::InvalidMaxQueryTerms(config.max_query_terms));
        }

        if config.cache_ttl_secs > 86_400 {
            return Err(ConfigError::InvalidCacheTtl(config.cache_ttl_secs));
        }

        if config.cache_capacity == 0 {
            return Err(ConfigError::InvalidCacheCapacity(config.cache_capacity));
        }

        if config.search_timeout_ms == 0 {
            return Err(ConfigError::InvalidSearchTimeout(config.search_timeout_ms));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// Get the path for the SQLite database
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.get_base_dir().join(DATABASE_FILE_NAME)
    }
}
