//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use sandpit_config::{
    DEFAULT_API_RPM, DEFAULT_MAX_BODY_SIZE, DEFAULT_PORT, DEFAULT_STATIC_DIR, ServerSection,
};

use crate::error::{Result, ServerError};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Enable rate limiting.
    pub rate_limiting: bool,

    /// Rate limit: requests per minute across all clients.
    pub api_rpm: u32,

    /// Enable request logging.
    pub request_logging: bool,

    /// Maximum request body size in bytes. Larger scripts get `413`.
    pub max_body_size: usize,

    /// Directory served under `/js`.
    pub static_dir: PathBuf,

    /// Directory `/exec` and `/qri` scripts are staged into.
    pub staging_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            rate_limiting: false,
            api_rpm: DEFAULT_API_RPM,
            request_logging: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            staging_dir: std::env::temp_dir(),
        }
    }
}

impl ServerConfig {
    /// Create a server config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[server]` section of the loaded config.
    pub fn from_section(section: &ServerSection) -> Result<Self> {
        let addr = format!("{}:{}", section.bind, section.port);
        let bind_address = addr
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address {addr:?}: {e}")))?;

        Ok(Self {
            bind_address,
            rate_limiting: section.rate_limiting,
            api_rpm: section.api_rpm,
            request_logging: section.request_logging,
            max_body_size: section.max_body_size,
            static_dir: section.static_dir.clone(),
            staging_dir: section
                .staging_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
        })
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Enable or disable rate limiting.
    pub fn with_rate_limiting(mut self, enabled: bool) -> Self {
        self.rate_limiting = enabled;
        self
    }

    /// Set the API rate limit (requests per minute).
    pub fn with_api_rpm(mut self, rpm: u32) -> Self {
        self.api_rpm = rpm;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    /// Set the maximum request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Set the static asset directory.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = dir.into();
        self
    }

    /// Set the directory scripts are staged into.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }
}
