//! Configuration system for sandpit.
//!
//! Provides TOML-based configuration with:
//! - `[server]`, `[interpreter]` and `[logging]` sections, each optional
//! - Config file layering (XDG user config + project-local overrides)
//! - `PORT` / `SANDPIT_BIND` environment overrides

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    BIND_ENV, LoadedConfig, PORT_ENV, apply_env_overrides, load_config, load_config_file,
    load_config_with_options, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
