//! CLI command handlers.

pub mod run;
pub mod start;

use std::path::Path;

use anyhow::{Context as _, Result};
use sandpit_config::discovery::ConfigSource;
use sandpit_config::{LoadedConfig, SandpitConfig};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Merged configuration (files, then environment).
    pub config: SandpitConfig,
    /// Verbose output enabled.
    pub verbose: bool,
}

/// Load configuration from `explicit` if given, otherwise by discovery.
pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let Some(path) = explicit else {
        return Ok(sandpit_config::load_config(None)?);
    };

    let mut config = sandpit_config::load_config_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    sandpit_config::apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;

    Ok(LoadedConfig {
        config,
        sources: vec![ConfigSource {
            path: path.to_path_buf(),
            loaded: true,
        }],
        warnings: Vec::new(),
    })
}
