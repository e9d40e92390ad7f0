use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};

use meshwarden_core::probe;
use meshwarden_core::shutdown::interruptible_sleep;
use meshwarden_core::time::now_secs;

const MAX_RESTART_FAILURES: u32 = 5;
const MAX_BACKOFF_EXPONENT: u32 = 4;
const MAX_BACKOFF_TIME_SEC: f64 = 240.0;
const NETWORK_RECOVERY_WAIT_SEC: u64 = 300;
const HEARTBEAT_INTERVAL_SEC: f64 = 300.0;
const POST_RESTART_REPORT_DELAY_SEC: u64 = 10;

/// The restart sequence and IP-reporting call, abstracted behind a trait so
/// the control loop's policy (when/how often to restart) can be tested
/// without touching real processes or the network.
#[async_trait]
pub trait HealActions: Send + Sync {
    async fn probe_peer(&self, target_ip: &str, timeout_sec: u64) -> bool;
    /// Runs stop-GUI -> wait 1s -> stop-service -> wait 2s -> start-service
    /// -> wait 3s -> start-GUI. Returns true only if both starts succeeded.
    async fn restart_strategy(&self) -> bool;
    async fn report_ips(&self) -> bool;
}

pub struct RealHealActions<P, R> {
    pub process: P,
    pub reporter: R,
}

#[async_trait]
pub trait ProcessOps: Send + Sync {
    async fn stop_gui(&self) -> bool;
    async fn stop_service(&self) -> bool;
    async fn start_service(&self) -> bool;
    async fn start_gui(&self) -> bool;
}

#[async_trait]
pub trait IpReporter: Send + Sync {
    async fn report_ips(&self) -> bool;
}

#[async_trait]
impl<P, R> HealActions for RealHealActions<P, R>
where
    P: ProcessOps,
    R: IpReporter,
{
    async fn probe_peer(&self, target_ip: &str, timeout_sec: u64) -> bool {
        probe::probe(target_ip, timeout_sec).await.ok
    }

    async fn restart_strategy(&self) -> bool {
        self.process.stop_gui().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.process.stop_service().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        let service_ok = self.process.start_service().await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        let gui_ok = self.process.start_gui().await;
        service_ok && gui_ok
    }

    async fn report_ips(&self) -> bool {
        self.reporter.report_ips().await
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AutoHealConfig {
    pub target_ip: Option<String>,
    pub ping_interval_sec: u64,
    pub ping_timeout_sec: u64,
    pub restart_cooldown_sec: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct AutoHealState {
    consecutive_ping_failures: u32,
    restart_failure_count: u32,
    cooldown_until: f64,
}

fn compute_backoff(base_cooldown_sec: u64, restart_failure_count: u32) -> f64 {
    let base = (base_cooldown_sec as f64).max(10.0);
    let exponent = restart_failure_count.min(MAX_BACKOFF_EXPONENT);
    let multiplier = (2u32.pow(exponent) as f64).min(16.0);
    (base * multiplier).min(MAX_BACKOFF_TIME_SEC)
}

/// Runs until the shutdown signal fires. Never exits on an internal error —
/// any failure inside one iteration is logged and followed by a 10s
/// interruptible wait before the loop resumes.
pub async fn run(
    config: AutoHealConfig,
    actions: impl HealActions,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut state = AutoHealState::default();
    let mut last_heartbeat = now_secs();

    loop {
        if *shutdown.borrow() {
            return;
        }

        let now = now_secs();
        if now - last_heartbeat >= HEARTBEAT_INTERVAL_SEC {
            info!(
                consecutive_ping_failures = state.consecutive_ping_failures,
                restart_failure_count = state.restart_failure_count,
                "auto-heal heartbeat"
            );
            last_heartbeat = now;
        }

        let Some(target_ip) = &config.target_ip else {
            if interruptible_sleep(Duration::from_secs(5), &mut shutdown).await {
                return;
            }
            continue;
        };

        if state.restart_failure_count >= MAX_RESTART_FAILURES {
            if interruptible_sleep(Duration::from_secs(NETWORK_RECOVERY_WAIT_SEC), &mut shutdown).await {
                return;
            }
            if actions.probe_peer(target_ip, config.ping_timeout_sec).await {
                info!("network recovered, resetting restart failure count");
                state.restart_failure_count = 0;
                state.consecutive_ping_failures = 0;
            }
            continue;
        }

        let reachable = actions.probe_peer(target_ip, config.ping_timeout_sec).await;
        if reachable {
            if state.consecutive_ping_failures > 0 {
                state.consecutive_ping_failures = 0;
            }
            if state.restart_failure_count > 0 {
                info!("target reachable again, resetting restart failure count");
                state.restart_failure_count = 0;
            }
        } else {
            state.consecutive_ping_failures += 1;
        }

        let now = now_secs();
        if !reachable && state.consecutive_ping_failures >= 3 && now >= state.cooldown_until {
            let backoff = compute_backoff(config.restart_cooldown_sec, state.restart_failure_count);
            warn!(
                target_ip,
                consecutive_ping_failures = state.consecutive_ping_failures,
                restart_failure_count = state.restart_failure_count,
                backoff,
                "target unreachable, executing restart strategy"
            );

            let restart_success = actions.restart_strategy().await;
            if restart_success {
                state.restart_failure_count = 0;
            } else {
                state.restart_failure_count += 1;
            }
            state.cooldown_until = now_secs() + backoff;

            if interruptible_sleep(Duration::from_secs(POST_RESTART_REPORT_DELAY_SEC), &mut shutdown).await {
                return;
            }
            if restart_success && actions.report_ips().await {
                info!("reported IPs after successful restart");
                state.consecutive_ping_failures = 0;
            }
        }

        let wait = Duration::from_secs(config.ping_interval_sec.max(5));
        if interruptible_sleep(wait, &mut shutdown).await {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn backoff_matches_formula_at_zero_failures() {
        assert_eq!(compute_backoff(30, 0), 30.0);
    }

    #[test]
    fn backoff_caps_at_max() {
        assert_eq!(compute_backoff(30, 10), MAX_BACKOFF_TIME_SEC);
    }

    #[test]
    fn backoff_floors_base_at_ten() {
        assert_eq!(compute_backoff(1, 0), 10.0);
    }

    #[test]
    fn backoff_exponent_caps_at_four() {
        // 2^4 = 16, further failures must not multiply further
        assert_eq!(compute_backoff(10, 4), compute_backoff(10, 9));
    }

    struct CountingActions {
        reachable: std::sync::atomic::AtomicBool,
        restart_calls: AtomicU32,
        report_calls: AtomicU32,
    }

    #[async_trait]
    impl HealActions for Arc<CountingActions> {
        async fn probe_peer(&self, _target_ip: &str, _timeout_sec: u64) -> bool {
            self.reachable.load(Ordering::SeqCst)
        }
        async fn restart_strategy(&self) -> bool {
            self.restart_calls.fetch_add(1, Ordering::SeqCst);
            true
        }
        async fn report_ips(&self) -> bool {
            self.report_calls.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[tokio::test]
    async fn no_target_ip_idles_without_restarting() {
        let actions = Arc::new(CountingActions {
            reachable: std::sync::atomic::AtomicBool::new(false),
            restart_calls: AtomicU32::new(0),
            report_calls: AtomicU32::new(0),
        });
        let (tx, rx) = watch::channel(false);
        let config = AutoHealConfig {
            target_ip: None,
            ping_interval_sec: 5,
            ping_timeout_sec: 1,
            restart_cooldown_sec: 10,
        };
        let handle = tokio::spawn(run(config, actions.clone(), rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        let _ = handle.await;
        assert_eq!(actions.restart_calls.load(Ordering::SeqCst), 0);
    }
}
