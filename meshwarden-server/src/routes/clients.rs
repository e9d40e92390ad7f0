use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use meshwarden_model::{validate_member_address, address::MAX_ADDRESSES_PER_REQUEST};

use crate::app_state::AppState;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct RememberRequest {
    pub ips: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RememberResponse {
    pub ok: bool,
    pub count: usize,
    pub total_clients: usize,
    pub filtered_count: usize,
}

pub async fn remember(
    State(state): State<AppState>,
    Json(request): Json<RememberRequest>,
) -> AppResult<Json<RememberResponse>> {
    if request.ips.is_empty() {
        return Err(AppError::bad_request("ips must contain at least one address"));
    }
    if request.ips.len() > MAX_ADDRESSES_PER_REQUEST {
        return Err(AppError::bad_request(format!(
            "ips must contain at most {MAX_ADDRESSES_PER_REQUEST} addresses"
        )));
    }

    let mut accepted = 0usize;
    let mut filtered = 0usize;
    for raw in &request.ips {
        match validate_member_address(raw) {
            Ok(_) => {
                state.registry.add_or_update(raw, true, None);
                state.scheduler.add_client(raw, None);
                accepted += 1;
            }
            Err(err) => {
                tracing::debug!(ip = %raw, error = %err, "rejected member address");
                filtered += 1;
            }
        }
    }

    if accepted == 0 {
        return Err(AppError::bad_request("no valid addresses in request"));
    }

    Ok(Json(RememberResponse {
        ok: true,
        count: accepted,
        total_clients: state.registry.size(),
        filtered_count: filtered,
    }))
}

pub async fn list_all(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.registry.get_all()))
}

pub async fn list_active(State(state): State<AppState>) -> Json<Value> {
    let threshold = state.config_snapshot().client_offline_threshold_sec as f64;
    Json(json!(state.registry.get_active(threshold)))
}

pub async fn stats(State(state): State<AppState>) -> Json<Value> {
    let threshold = state.config_snapshot().client_offline_threshold_sec as f64;
    Json(json!(state.registry.get_stats(threshold)))
}
