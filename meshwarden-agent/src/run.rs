use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::warn;

use meshwarden_config::AgentConfig;

use crate::auto_heal::{self, AutoHealConfig, IpReporter, ProcessOps, RealHealActions};
use crate::http_session::HttpSessionManager;
use crate::ip_discovery::discover_own_ips;
use crate::process_controller::{self, OverlayLocations};

struct AgentProcessOps {
    locations: OverlayLocations,
}

#[async_trait]
impl ProcessOps for AgentProcessOps {
    async fn stop_gui(&self) -> bool {
        let Some(path) = self.locations.gui_paths.first() else {
            return true;
        };
        let name = process_name(path);
        process_controller::stop_gui(name).await.unwrap_or(false)
    }

    async fn stop_service(&self) -> bool {
        let Some(name) = self.locations.service_names.first() else {
            return true;
        };
        process_controller::stop_service(name).await.unwrap_or(false)
    }

    async fn start_service(&self) -> bool {
        let Some(name) = self.locations.service_names.first() else {
            return true;
        };
        process_controller::start_service(name).await.unwrap_or(false)
    }

    async fn start_gui(&self) -> bool {
        let Some(path) = self.locations.gui_paths.first() else {
            return true;
        };
        process_controller::start_gui(path).await.unwrap_or(false)
    }
}

fn process_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

struct AgentIpReporter {
    session: Arc<HttpSessionManager>,
    adapter_keywords: Vec<String>,
}

#[async_trait]
impl IpReporter for AgentIpReporter {
    async fn report_ips(&self) -> bool {
        let ips = discover_own_ips(&self.adapter_keywords);
        if ips.is_empty() {
            warn!("no local overlay network IPs found; confirm the overlay network is joined");
            return false;
        }
        let body = serde_json::json!({ "ips": ips });
        match self.session.post_json("/clients/remember", body).await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                warn!("failed to report ip to server: {err}");
                false
            }
        }
    }
}

/// Runs the agent's auto-heal loop until shutdown fires. This is the entry
/// point the `client` CLI subcommand calls into.
pub async fn run_client(config: AgentConfig, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let session = Arc::new(HttpSessionManager::new(
        config.server_base.clone(),
        config.api_key.clone(),
    )?);

    let locations = OverlayLocations {
        service_names: config.service_names.clone(),
        service_paths: config.service_paths.clone(),
        gui_paths: config.gui_paths.clone(),
    };

    let heal_config = AutoHealConfig {
        target_ip: config.target_ip.clone(),
        ping_interval_sec: config.ping_interval_sec,
        ping_timeout_sec: config.ping_timeout_sec,
        restart_cooldown_sec: config.restart_cooldown_sec,
    };

    if !config.auto_heal_enabled {
        warn!("auto-heal disabled in config; agent will idle without restarting the overlay service");
        let mut shutdown = shutdown;
        while !*shutdown.borrow() {
            if meshwarden_core::shutdown::interruptible_sleep(
                std::time::Duration::from_secs(5),
                &mut shutdown,
            )
            .await
            {
                break;
            }
        }
        return Ok(());
    }

    let actions = RealHealActions {
        process: AgentProcessOps { locations },
        reporter: AgentIpReporter {
            session,
            adapter_keywords: config.adapter_keywords.clone(),
        },
    };

    auto_heal::run(heal_config, actions, shutdown).await;
    Ok(())
}
