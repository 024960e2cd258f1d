//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/sandpit/config.toml` (XDG user config)
//! 2. `./sandpit.toml` (project-local)
//! 3. Environment (`PORT`, `SANDPIT_BIND`)
//! 4. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ConfigError, Result, SandpitConfig};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "sandpit.toml";

/// Default config filename within XDG config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "sandpit";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "SANDPIT_CONFIG_DIR";

/// Environment variable overriding `server.port`.
pub const PORT_ENV: &str = "PORT";

/// Environment variable overriding `server.bind`.
pub const BIND_ENV: &str = "SANDPIT_BIND";

/// One config file that discovery looked at.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// File that was checked.
    pub path: PathBuf,
    /// `true` if the file existed, parsed and was merged.
    pub loaded: bool,
}

/// Merged configuration plus how it was assembled.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Effective configuration.
    pub config: SandpitConfig,
    /// Every layer checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Layers that existed but could not be used.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Files that actually contributed to the config.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter_map(|s| s.loaded.then_some(s.path.as_path()))
            .collect()
    }
}

/// Discover, merge and env-override using the process environment.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None, |var| std::env::var(var).ok())
}

/// [`load_config`] with an explicit user config directory and env lookup.
///
/// `config_dir` replaces both `SANDPIT_CONFIG_DIR` and the platform
/// directory; `env` replaces the process environment.
pub fn load_config_with_options<F>(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
    env: F,
) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let user_layer = config_dir
        .map(|dir| dir.join(USER_CONFIG_FILE))
        .or_else(xdg_config_path);
    let project_layer = project_dir
        .unwrap_or_else(|| Path::new("."))
        .join(PROJECT_CONFIG_FILE);

    let mut loaded = LoadedConfig {
        config: SandpitConfig::new(),
        sources: Vec::new(),
        warnings: Vec::new(),
    };
    for path in user_layer.into_iter().chain([project_layer]) {
        let source = merge_layer(&mut loaded.config, &path, &mut loaded.warnings);
        loaded.sources.push(source);
    }

    apply_env_overrides(&mut loaded.config, env)?;
    Ok(loaded)
}

/// Apply `PORT` and `SANDPIT_BIND` from `env`. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut SandpitConfig, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |var: &str| env(var).filter(|v| !v.trim().is_empty());

    if let Some(raw) = lookup(PORT_ENV) {
        config.server_mut().port =
            raw.trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidEnv {
                    var: PORT_ENV.to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
    }
    if let Some(bind) = lookup(BIND_ENV) {
        config.server_mut().bind = bind.trim().to_string();
    }
    Ok(())
}

/// Parse one config file, without discovery or env overrides.
pub fn load_config_file(path: &Path) -> Result<SandpitConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => SandpitConfig::from_toml(&text),
        Err(source) => Err(ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// `<user config dir>/config.toml`.
pub fn xdg_config_path() -> Option<PathBuf> {
    Some(xdg_config_dir()?.join(USER_CONFIG_FILE))
}

/// `SANDPIT_CONFIG_DIR` if set and non-empty, else `<platform config>/sandpit`.
pub fn xdg_config_dir() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join(APP_NAME)),
    }
}

/// Merge `path` into `config` if it is a readable, valid config file.
/// Absent files are skipped silently; broken ones add a warning.
fn merge_layer(config: &mut SandpitConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    let loaded = path.is_file()
        && match load_config_file(path) {
            Ok(layer) => {
                config.merge(layer);
                true
            }
            Err(e) => {
                warnings.push(format!("ignoring {}: {}", path.display(), e));
                false
            }
        };
    ConfigSource {
        path: path.to_path_buf(),
        loaded,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
