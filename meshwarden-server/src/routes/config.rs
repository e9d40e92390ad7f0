use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::app_state::AppState;

/// Tunables as they currently stand, minus the secret itself — only whether
/// one is configured, so an operator can confirm auth is armed without the
/// response ever carrying the key.
pub async fn config(State(state): State<AppState>) -> Json<Value> {
    let config = state.config_snapshot();
    Json(json!({
        "host": config.host,
        "port": config.port,
        "ping_interval_sec": config.ping_interval_sec,
        "ping_timeout_sec": config.ping_timeout_sec,
        "ping_stagger_sec": config.ping_stagger_sec,
        "max_concurrent_pings": config.max_concurrent_pings,
        "client_offline_threshold_sec": config.client_offline_threshold_sec,
        "save_interval_sec": config.save_interval_sec,
        "data_file": config.data_file.display().to_string(),
        "log_level": config.log_level,
        "log_file": config.log_file.as_ref().map(|p| p.display().to_string()),
        "enable_api_auth": config.enable_api_auth,
        "api_key_configured": config.api_key.is_some(),
    }))
}
