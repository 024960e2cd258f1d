//! Configuration errors.

use thiserror::Error;

/// Anything that stops a config layer from being used.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("cannot read {path}: {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`crate::SandpitConfig`].
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be rendered back to TOML.
    #[error("cannot render config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `PORT` or `SANDPIT_BIND` holds an unusable value.
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
