use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::level::LogLevel;

/// Fields an operator can edit by hand. Only the fields named in
/// [`RELOADABLE_FIELDS`] may be changed by the hot-reload watcher at runtime;
/// everything else requires a process restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub ping_interval_sec: u64,
    pub ping_timeout_sec: u64,
    pub ping_stagger_sec: f64,
    pub max_concurrent_pings: usize,
    pub client_offline_threshold_sec: u64,
    pub save_interval_sec: u64,
    pub data_file: PathBuf,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
    pub api_key: Option<String>,
    pub enable_api_auth: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            ping_interval_sec: 60,
            ping_timeout_sec: 2,
            ping_stagger_sec: 0.5,
            max_concurrent_pings: 10,
            client_offline_threshold_sec: 300,
            save_interval_sec: 30,
            data_file: PathBuf::from("clients.json"),
            log_level: LogLevel::Info,
            log_file: None,
            api_key: None,
            enable_api_auth: false,
        }
    }
}

/// Fields the hot-reload watcher is permitted to overwrite. Anything else
/// (listen address, data file path, auth toggle) requires a restart because
/// changing it at runtime would invalidate state already built around it
/// (bound socket, open file handle, auth middleware wiring).
pub const RELOADABLE_FIELDS: &[&str] = &[
    "ping_interval_sec",
    "ping_timeout_sec",
    "ping_stagger_sec",
    "max_concurrent_pings",
    "client_offline_threshold_sec",
    "save_interval_sec",
    "log_level",
];
