use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::watch;

use meshwarden_config::ServerConfig;
use meshwarden_core::{ClientRegistry, Metrics, PingScheduler, Persister, WorkerPool};

const RECONCILE_INTERVAL: Duration = Duration::from_secs(30);

/// Drives the scheduler/registry/worker-pool/persistence quartet. Computes
/// its own wait each tick rather than a fixed interval timer: `min(max(next_ready_in, 0.2), 2.0)`
/// when nothing is due, else ticks immediately. Reads `ping_timeout_sec`,
/// `ping_stagger_sec`, `save_interval_sec`, and `client_offline_threshold_sec`
/// from the shared config on every tick, so a hot reload takes effect on
/// this loop's very next iteration rather than only at the next restart.
pub async fn run(
    registry: ClientRegistry,
    scheduler: PingScheduler,
    worker_pool: WorkerPool,
    persister: Arc<Persister>,
    metrics: Arc<Metrics>,
    config: Arc<RwLock<ServerConfig>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut last_reconcile = Instant::now();
    let mut last_save = Instant::now();

    loop {
        if *shutdown.borrow() {
            return;
        }

        let (ping_timeout_sec, ping_stagger_sec, save_interval_sec, client_offline_threshold_sec) = {
            let config = config.read();
            (
                config.ping_timeout_sec,
                config.ping_stagger_sec,
                config.save_interval_sec,
                config.client_offline_threshold_sec,
            )
        };
        let save_interval = Duration::from_secs(save_interval_sec.max(1));

        if last_reconcile.elapsed() >= RECONCILE_INTERVAL {
            reconcile(&registry, &scheduler);
            registry.cleanup_offline(client_offline_threshold_sec as f64);
            last_reconcile = Instant::now();
        }

        if last_save.elapsed() >= save_interval {
            if let Err(err) = persister.save_if_dirty(&registry).await {
                tracing::warn!("periodic save failed: {err}");
            }
            last_save = Instant::now();
        }

        let ready = scheduler.get_ready_ips();
        if !ready.is_empty() {
            let registry = registry.clone();
            let scheduler = scheduler.clone();
            let metrics = metrics.clone();
            for ip in &ready {
                metrics.record_ping_submitted();
            }
            worker_pool
                .submit_batch(ready, ping_stagger_sec, shutdown.clone(), move |ip| {
                    let registry = registry.clone();
                    let scheduler = scheduler.clone();
                    let metrics = metrics.clone();
                    async move {
                        let result = meshwarden_core::probe(&ip, ping_timeout_sec).await;
                        registry.update_ping_result(&ip, result.ok);
                        scheduler.update_ping_result(&ip, result.ok);
                        metrics.record_ping_completed(result.ok);
                    }
                })
                .await;
            continue;
        }

        let wait = scheduler.next_ready_in().clamp(0.2, 2.0);
        if meshwarden_core::shutdown::interruptible_sleep(
            Duration::from_secs_f64(wait),
            &mut shutdown,
        )
        .await
        {
            return;
        }
    }
}

fn reconcile(registry: &ClientRegistry, scheduler: &PingScheduler) {
    let registry_clients = registry.get_all();
    let scheduler_clients = scheduler.get_all_clients();

    for (ip, record) in &registry_clients {
        if !scheduler_clients.contains_key(ip) {
            scheduler.add_client(ip, Some(*record));
        }
    }
    for ip in scheduler_clients.keys() {
        if !registry_clients.contains_key(ip) {
            scheduler.remove_client(ip);
        }
    }
}
