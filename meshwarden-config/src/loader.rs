use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use tracing::warn;

use crate::agent::AgentConfig;
use crate::error::ConfigLoadError;
use crate::server::ServerConfig;
use crate::validation::{apply_agent_guard_rails, apply_server_guard_rails, ConfigWarnings};

/// Where a resolved config path came from, kept for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigPathSource {
    Explicit,
    Env,
    Default,
}

static DEFAULT_SERVER_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    let mut locations = Vec::new();
    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(".meshwarden").join("server.json"));
    }
    locations.push(PathBuf::from("/etc/meshwarden/server.json"));
    locations
});

static DEFAULT_AGENT_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    let mut locations = Vec::new();
    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(".meshwarden").join("agent.json"));
    }
    locations.push(PathBuf::from("/etc/meshwarden/agent.json"));
    locations
});

fn resolve_path(
    explicit: Option<PathBuf>,
    env_var: &str,
    defaults: &[PathBuf],
) -> (Option<PathBuf>, ConfigPathSource) {
    if let Some(path) = explicit {
        return (Some(path), ConfigPathSource::Explicit);
    }
    if let Ok(path) = std::env::var(env_var) {
        if !path.is_empty() {
            return (Some(PathBuf::from(path)), ConfigPathSource::Env);
        }
    }
    let found = defaults.iter().find(|p| p.exists()).cloned();
    (found, ConfigPathSource::Default)
}

fn read_json_file(path: &Path) -> Result<serde_json::Value, ConfigLoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loader options mirroring the explicit-path / env-var override the process
/// accepts from its CLI flags.
#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
}

pub struct LoadedServerConfig {
    pub config: ServerConfig,
    pub warnings: ConfigWarnings,
    pub path: Option<PathBuf>,
}

pub fn load_server_config(
    options: ConfigLoaderOptions,
) -> Result<LoadedServerConfig, ConfigLoadError> {
    let (path, source) = resolve_path(
        options.config_path,
        "MESHWARDEN_SERVER_CONFIG",
        &DEFAULT_SERVER_LOCATIONS,
    );

    let config = match &path {
        Some(path) => {
            let value = read_json_file(path)?;
            serde_json::from_value(value).map_err(|source| ConfigLoadError::Parse {
                path: path.clone(),
                source,
            })?
        }
        None => {
            warn!("no server config file found (source={source:?}); using built-in defaults");
            ServerConfig::default()
        }
    };

    let warnings = apply_server_guard_rails(&config, path.as_deref())?;
    Ok(LoadedServerConfig {
        config,
        warnings,
        path,
    })
}

pub struct LoadedAgentConfig {
    pub config: AgentConfig,
    pub warnings: ConfigWarnings,
    pub path: Option<PathBuf>,
}

pub fn load_agent_config(
    options: ConfigLoaderOptions,
) -> Result<LoadedAgentConfig, ConfigLoadError> {
    let (path, source) = resolve_path(
        options.config_path,
        "MESHWARDEN_AGENT_CONFIG",
        &DEFAULT_AGENT_LOCATIONS,
    );

    let config = match &path {
        Some(path) => {
            let value = read_json_file(path)?;
            serde_json::from_value(value).map_err(|source| ConfigLoadError::Parse {
                path: path.clone(),
                source,
            })?
        }
        None => {
            warn!("no agent config file found (source={source:?}); using built-in defaults");
            AgentConfig::default()
        }
    };

    let warnings = apply_agent_guard_rails(&config)?;
    Ok(LoadedAgentConfig {
        config,
        warnings,
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let loaded = load_server_config(ConfigLoaderOptions {
            config_path: Some(PathBuf::from("/nonexistent/path/does-not-exist.json")),
        });
        // explicit path that doesn't exist is an error, not a silent fallback
        assert!(loaded.is_err());
    }

    #[test]
    fn explicit_path_loads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.json");
        std::fs::write(&path, r#"{"port": 9000, "ping_interval_sec": 30}"#).unwrap();
        let loaded = load_server_config(ConfigLoaderOptions {
            config_path: Some(path.clone()),
        })
        .unwrap();
        assert_eq!(loaded.config.port, 9000);
        assert_eq!(loaded.path, Some(path));
    }
}
