use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::app_state::AppState;

pub async fn metrics(State(state): State<AppState>) -> Response {
    let threshold = state.config_snapshot().client_offline_threshold_sec as f64;
    let client_stats = state.registry.get_stats(threshold);
    state.metrics.set_client_gauges(meshwarden_core::metrics::ClientGauges {
        total: client_stats.total as u64,
        active: client_stats.active as u64,
        online: client_stats.online as u64,
        offline: client_stats.offline as u64,
        never_pinged: client_stats.never_pinged as u64,
    });
    state.metrics.set_executor_gauges(meshwarden_core::metrics::ExecutorGauges {
        max_workers: state.worker_pool.max_workers() as u64,
        active_threads: state.worker_pool.active_workers() as u64,
        is_shutdown: state.shutdown.is_triggered(),
    });

    let body = state.metrics.render_prometheus();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}
