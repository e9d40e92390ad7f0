use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

use meshwarden_config::ServerConfig;
use meshwarden_core::{ClientRegistry, Metrics, PingScheduler, ShutdownHandle, WorkerPool};

/// Shared state reachable from every route handler. `config` is behind an
/// `RwLock` because hot-reload swaps it out from under the running server;
/// everything else is already internally synchronized and cheaply `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<ServerConfig>>,
    pub registry: ClientRegistry,
    pub scheduler: PingScheduler,
    pub worker_pool: WorkerPool,
    pub metrics: Arc<Metrics>,
    pub shutdown: ShutdownHandle,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl AppState {
    pub fn config_snapshot(&self) -> ServerConfig {
        self.config.read().clone()
    }

    pub fn is_auth_required(&self) -> bool {
        self.config.read().enable_api_auth
    }

    pub fn api_key(&self) -> Option<String> {
        self.config.read().api_key.clone()
    }
}
