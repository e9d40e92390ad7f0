use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path} as JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    GuardRail(#[from] GuardRailError),
}

/// Validation failures for composed configuration. Each variant names the
/// offending field so callers (API handlers, hot-reload) can report exactly
/// what was rejected.
#[derive(Debug, Error)]
pub enum GuardRailError {
    #[error("port {0} is out of range 1-65535")]
    PortOutOfRange(u32),

    #[error("ping_interval_sec must be >= 5, got {0}")]
    PingIntervalTooLow(u64),

    #[error("ping_timeout_sec must be within 1-30, got {0}")]
    PingTimeoutOutOfRange(u64),

    #[error("ping_stagger_sec must be within 0.1-10, got {0}")]
    PingStaggerOutOfRange(f64),

    #[error("max_concurrent_pings must be within 1-100, got {0}")]
    MaxConcurrentPingsOutOfRange(usize),

    #[error("save_interval_sec must be >= 5, got {0}")]
    SaveIntervalTooLow(u64),

    #[error("client_offline_threshold_sec must be >= 60, got {0}")]
    OfflineThresholdTooLow(u64),

    #[error("api_key must be at least 16 characters when api auth is enabled")]
    ApiKeyTooShort,

    #[error("enable_api_auth is set but no api_key was provided")]
    ApiKeyMissing,

    #[error("data_file must not be the same path as the config file")]
    DataFileSameAsConfigPath,

    #[error("data_file must not be the same path as the log file")]
    DataFileSameAsLogFile,

    #[error("log_level '{0}' is not one of DEBUG, INFO, WARNING, ERROR, CRITICAL")]
    InvalidLogLevel(String),
}
