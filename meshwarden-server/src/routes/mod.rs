pub mod clients;
pub mod config;
pub mod health;
pub mod metrics;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::auth::require_bearer_token;

pub fn build_router(state: AppState) -> Router {
    let authenticated = Router::new()
        .route("/clients/remember", post(clients::remember))
        .route("/clients", get(clients::list_all))
        .route("/clients/active", get(clients::list_active))
        .route("/clients/stats", get(clients::stats))
        .route("/config", get(config::config))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer_token,
        ));

    let public = Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(metrics::metrics));

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
