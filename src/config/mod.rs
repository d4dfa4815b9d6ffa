// Configuration management: TOML settings in the kb-search home directory

pub mod settings;

pub use settings::{Config, ConfigError};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
