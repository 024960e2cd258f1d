//! Configuration types for sandpit.
//!
//! ```toml
//! [server]
//! port = 3000
//! bind = "0.0.0.0"
//! static_dir = "editor/dist"
//!
//! [interpreter]
//! allow_looping = true
//! max_operations = 10000000
//! timeout = 10
//!
//! [logging]
//! json = false
//! file_dir = "/var/log/sandpit"
//! ```

use std::path::PathBuf;

use sandpit_script::Capabilities;
use serde::{Deserialize, Serialize};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default bind address.
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Default API requests per minute when rate limiting is enabled.
pub const DEFAULT_API_RPM: u32 = 120;

/// Default maximum request body size (1 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Default directory served under `/js`.
pub const DEFAULT_STATIC_DIR: &str = "editor/dist";

// ─────────────────────────────────────────────────────────────────────────────
// Root
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration.
///
/// Every section is optional in the file; absent sections fall back to their
/// defaults through the accessor methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SandpitConfig {
    /// HTTP server settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerSection>,

    /// Interpreter capabilities and limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<Capabilities>,

    /// Log output settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingSection>,
}

impl SandpitConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections replace whole; fields inside a section are not merged.
    pub fn merge(&mut self, other: SandpitConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }

        if other.interpreter.is_some() {
            self.interpreter = other.interpreter;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Server section, or defaults.
    pub fn server(&self) -> ServerSection {
        self.server.clone().unwrap_or_default()
    }

    /// Mutable server section, created with defaults if absent.
    pub fn server_mut(&mut self) -> &mut ServerSection {
        self.server.get_or_insert_with(ServerSection::default)
    }

    /// Interpreter section, or defaults.
    pub fn interpreter(&self) -> Capabilities {
        self.interpreter.clone().unwrap_or_default()
    }

    /// Logging section, or defaults.
    pub fn logging(&self) -> LoggingSection {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
    /// Enable request logging.
    pub request_logging: bool,
    /// Enable rate limiting.
    pub rate_limiting: bool,
    /// API rate limit: requests per minute.
    pub api_rpm: u32,
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
    /// Directory served under `/js`.
    pub static_dir: PathBuf,
    /// Directory scripts are staged into; the system temp dir when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            request_logging: true,
            rate_limiting: false,
            api_rpm: DEFAULT_API_RPM,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            staging_dir: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Emit console logs as JSON.
    pub json: bool,
    /// Directory for daily-rotated JSON log files. No file logging if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_dir: Option<PathBuf>,
    /// Tracing filter directive (e.g. `sandpit=debug`). `RUST_LOG` wins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
