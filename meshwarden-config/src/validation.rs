use std::path::Path;

use crate::agent::AgentConfig;
use crate::error::GuardRailError;
use crate::server::ServerConfig;
use crate::level::LogLevel;

/// Non-fatal recommendations surfaced to the operator but not enforced.
#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings(pub Vec<String>);

impl ConfigWarnings {
    pub fn push(&mut self, msg: impl Into<String>) {
        self.0.push(msg.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// `config_path` is the resolved path the config itself was loaded from (if
/// any); it must not equal `data_file`, matching the original's
/// `cfg_path.resolve() == data_path.resolve()` check. This is distinct from
/// the optional log_file/data_file collision checked separately below.
pub fn apply_server_guard_rails(
    config: &ServerConfig,
    config_path: Option<&Path>,
) -> Result<ConfigWarnings, GuardRailError> {
    if config.port == 0 {
        return Err(GuardRailError::PortOutOfRange(0));
    }
    if config.ping_interval_sec < 5 {
        return Err(GuardRailError::PingIntervalTooLow(config.ping_interval_sec));
    }
    if !(1..=30).contains(&config.ping_timeout_sec) {
        return Err(GuardRailError::PingTimeoutOutOfRange(
            config.ping_timeout_sec,
        ));
    }
    if !(0.1..=10.0).contains(&config.ping_stagger_sec) {
        return Err(GuardRailError::PingStaggerOutOfRange(
            config.ping_stagger_sec,
        ));
    }
    if !(1..=100).contains(&config.max_concurrent_pings) {
        return Err(GuardRailError::MaxConcurrentPingsOutOfRange(
            config.max_concurrent_pings,
        ));
    }
    if config.save_interval_sec < 5 {
        return Err(GuardRailError::SaveIntervalTooLow(config.save_interval_sec));
    }
    if config.client_offline_threshold_sec < 60 {
        return Err(GuardRailError::OfflineThresholdTooLow(
            config.client_offline_threshold_sec,
        ));
    }
    if config.enable_api_auth {
        match &config.api_key {
            None => return Err(GuardRailError::ApiKeyMissing),
            Some(key) if key.len() < 16 => return Err(GuardRailError::ApiKeyTooShort),
            Some(_) => {}
        }
    }
    if let Some(path) = config_path {
        if path == config.data_file {
            return Err(GuardRailError::DataFileSameAsConfigPath);
        }
    }
    if let Some(log_file) = &config.log_file {
        if log_file == &config.data_file {
            return Err(GuardRailError::DataFileSameAsLogFile);
        }
    }

    let mut warnings = ConfigWarnings::default();
    if config.ping_interval_sec < 10 {
        warnings.push(format!(
            "ping_interval_sec={} is below the recommended minimum of 10",
            config.ping_interval_sec
        ));
    }
    if (config.ping_timeout_sec as f64) > 0.8 * config.ping_interval_sec as f64 {
        warnings.push(
            "ping_timeout_sec is more than 80% of ping_interval_sec; probes may overlap",
        );
    }
    if config.client_offline_threshold_sec < 3 * config.ping_interval_sec {
        warnings.push(
            "client_offline_threshold_sec is less than 3x ping_interval_sec; clients may flap offline",
        );
    }
    Ok(warnings)
}

pub fn apply_agent_guard_rails(config: &AgentConfig) -> Result<ConfigWarnings, GuardRailError> {
    if config.ping_interval_sec < 5 {
        return Err(GuardRailError::PingIntervalTooLow(config.ping_interval_sec));
    }
    if !(1..=30).contains(&config.ping_timeout_sec) {
        return Err(GuardRailError::PingTimeoutOutOfRange(
            config.ping_timeout_sec,
        ));
    }
    if let Some(key) = &config.api_key {
        if !key.is_empty() && key.len() < 16 {
            return Err(GuardRailError::ApiKeyTooShort);
        }
    }

    let mut warnings = ConfigWarnings::default();
    if config.target_ip.is_none() {
        warnings.push("no target_ip configured; auto-heal will idle until one is set");
    }
    if config.restart_cooldown_sec < 10 {
        warnings.push(format!(
            "restart_cooldown_sec={} is below the effective floor of 10 and will be clamped",
            config.restart_cooldown_sec
        ));
    }
    Ok(warnings)
}

pub fn parse_log_level(raw: &str) -> Result<LogLevel, GuardRailError> {
    match raw.to_ascii_uppercase().as_str() {
        "DEBUG" => Ok(LogLevel::Debug),
        "INFO" => Ok(LogLevel::Info),
        "WARNING" | "WARN" => Ok(LogLevel::Warning),
        "ERROR" => Ok(LogLevel::Error),
        "CRITICAL" => Ok(LogLevel::Critical),
        other => Err(GuardRailError::InvalidLogLevel(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_low_ping_interval() {
        let mut config = ServerConfig::default();
        config.ping_interval_sec = 4;
        assert!(matches!(
            apply_server_guard_rails(&config, None),
            Err(GuardRailError::PingIntervalTooLow(4))
        ));
    }

    #[test]
    fn accepts_floor_ping_interval() {
        let mut config = ServerConfig::default();
        config.ping_interval_sec = 5;
        assert!(apply_server_guard_rails(&config, None).is_ok());
    }

    #[test]
    fn rejects_short_api_key_when_auth_enabled() {
        let mut config = ServerConfig::default();
        config.enable_api_auth = true;
        config.api_key = Some("short".to_string());
        assert!(matches!(
            apply_server_guard_rails(&config, None),
            Err(GuardRailError::ApiKeyTooShort)
        ));
    }

    #[test]
    fn accepts_long_enough_api_key() {
        let mut config = ServerConfig::default();
        config.enable_api_auth = true;
        config.api_key = Some("a".repeat(16));
        assert!(apply_server_guard_rails(&config, None).is_ok());
    }

    #[test]
    fn rejects_data_file_equal_to_log_file() {
        let mut config = ServerConfig::default();
        config.log_file = Some(config.data_file.clone());
        assert!(matches!(
            apply_server_guard_rails(&config, None),
            Err(GuardRailError::DataFileSameAsLogFile)
        ));
    }

    #[test]
    fn rejects_data_file_equal_to_config_path() {
        let config = ServerConfig::default();
        let path = config.data_file.clone();
        assert!(matches!(
            apply_server_guard_rails(&config, Some(&path)),
            Err(GuardRailError::DataFileSameAsConfigPath)
        ));
    }

    #[test]
    fn accepts_distinct_config_path() {
        let config = ServerConfig::default();
        let path = std::path::Path::new("/etc/meshwarden/server.json");
        assert!(apply_server_guard_rails(&config, Some(path)).is_ok());
    }

    #[test]
    fn warns_on_tight_offline_threshold() {
        let mut config = ServerConfig::default();
        config.ping_interval_sec = 100;
        config.client_offline_threshold_sec = 120;
        let warnings = apply_server_guard_rails(&config, None).unwrap();
        assert!(!warnings.is_empty());
    }
}
