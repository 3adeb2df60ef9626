use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, parsing or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to create default config: {0}")]
    CreateDefault(String),

    #[error("TOML parse error: {0}")]
    Parse(String),

    /// A value is out of range. `field` is the dotted path, e.g.
    /// `connection.connect_timeout_ms`.
    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
