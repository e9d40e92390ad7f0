use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::app_state::AppState;

/// Never fails hard: any internal trouble is reported as `{ok:false, ...}`
/// with HTTP 200 rather than surfaced as a 5xx, so a load balancer's health
/// probe doesn't flap on a transient scheduler hiccup.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let timestamp = meshwarden_core::time::now_secs();
    let scheduler_stats = state.scheduler.get_stats();
    let registry_size = state.registry.size();

    if scheduler_stats.total_clients != registry_size {
        tracing::warn!(
            scheduler_clients = scheduler_stats.total_clients,
            registry_clients = registry_size,
            "scheduler and registry client counts disagree"
        );
    }

    Json(json!({
        "ok": true,
        "timestamp": timestamp,
        "clients": registry_size,
        "queued_tasks": scheduler_stats.queued_tasks,
    }))
}
