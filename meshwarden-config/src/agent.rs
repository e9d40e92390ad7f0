use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::level::LogLevel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub server_base: String,
    pub api_key: Option<String>,
    pub target_ip: Option<String>,
    pub ping_interval_sec: u64,
    pub ping_timeout_sec: u64,
    pub restart_cooldown_sec: u64,
    pub auto_heal_enabled: bool,
    pub service_names: Vec<String>,
    pub service_paths: Vec<String>,
    pub gui_paths: Vec<String>,
    /// Substrings matched case-insensitively against local network interface
    /// names to pick out the overlay adapter when discovering this agent's
    /// own address to report to the server.
    pub adapter_keywords: Vec<String>,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_base: "http://127.0.0.1:8787".to_string(),
            api_key: None,
            target_ip: None,
            ping_interval_sec: 60,
            ping_timeout_sec: 2,
            restart_cooldown_sec: 30,
            auto_heal_enabled: true,
            service_names: default_service_names(),
            service_paths: default_service_paths(),
            gui_paths: default_gui_paths(),
            adapter_keywords: default_adapter_keywords(),
            log_level: LogLevel::Info,
            log_file: None,
        }
    }
}

fn default_adapter_keywords() -> Vec<String> {
    vec![
        "ZeroTier One".to_string(),
        "ZeroTier".to_string(),
        "zt".to_string(),
    ]
}

pub const RELOADABLE_FIELDS: &[&str] = &[
    "ping_interval_sec",
    "ping_timeout_sec",
    "restart_cooldown_sec",
    "auto_heal_enabled",
    "log_level",
];

#[cfg(target_os = "windows")]
fn default_service_names() -> Vec<String> {
    vec![
        "ZeroTier One".to_string(),
        "ZeroTierOneService".to_string(),
        "zerotier-one".to_string(),
    ]
}

#[cfg(not(target_os = "windows"))]
fn default_service_names() -> Vec<String> {
    vec!["zerotier-one".to_string()]
}

#[cfg(target_os = "windows")]
fn default_service_paths() -> Vec<String> {
    vec![
        r"C:\ProgramData\ZeroTier\One".to_string(),
        r"C:\Program Files\ZeroTier\One".to_string(),
    ]
}

#[cfg(not(target_os = "windows"))]
fn default_service_paths() -> Vec<String> {
    vec![
        "/usr/sbin/zerotier-one".to_string(),
        "/usr/local/sbin/zerotier-one".to_string(),
        "/opt/zerotier-one/zerotier-one".to_string(),
    ]
}

#[cfg(target_os = "windows")]
fn default_gui_paths() -> Vec<String> {
    vec![r"C:\Program Files\ZeroTier\One".to_string()]
}

#[cfg(not(target_os = "windows"))]
fn default_gui_paths() -> Vec<String> {
    vec!["/Applications/ZeroTier One.app".to_string()]
}
