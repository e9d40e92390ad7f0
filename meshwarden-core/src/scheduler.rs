use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

use meshwarden_model::ClientRecord;

use crate::time::now_secs;

const ABSOLUTE_QUEUE_CAP: usize = 500;
const COMPACTION_EVERY_N_RESULTS: u32 = 50;
const STALE_TASK_MULTIPLIER: f64 = 1.5;
const RELATIVE_QUEUE_CAP_MULTIPLIER: f64 = 1.2;
const MIN_QUEUE_SIZE_FOR_CLEANUP: usize = 5;
const MIN_CLEANUP_RATIO_WORTH_REBUILD: f64 = 0.1;
const SMALL_QUEUE_SKIP_THRESHOLD: usize = 20;
const FIRST_PING_JITTER_MIN_SEC: f64 = 1.0;
const FIRST_PING_JITTER_MAX_SEC: f64 = 10.0;

#[derive(Debug, Clone)]
struct PingTask {
    ip: String,
    due_time: f64,
    version: u64,
}

impl PartialEq for PingTask {
    fn eq(&self, other: &Self) -> bool {
        self.due_time == other.due_time
    }
}
impl Eq for PingTask {}

impl PartialOrd for PingTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reversed so that `BinaryHeap` (a max-heap) pops the task with the
/// *smallest* `due_time` first, turning it into a min-heap.
impl Ord for PingTask {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_time
            .partial_cmp(&self.due_time)
            .unwrap_or(Ordering::Equal)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStats {
    pub total_clients: usize,
    pub queued_tasks: usize,
    pub active_versions: usize,
    pub next_ping_in: f64,
}

struct SchedulerState {
    queue: BinaryHeap<PingTask>,
    clients: HashMap<String, ClientRecord>,
    versions: HashMap<String, u64>,
    results_since_compaction: u32,
    ping_interval_sec: f64,
}

impl SchedulerState {
    fn new(ping_interval_sec: f64) -> Self {
        Self {
            queue: BinaryHeap::new(),
            clients: HashMap::new(),
            versions: HashMap::new(),
            results_since_compaction: 0,
            ping_interval_sec,
        }
    }
}

/// Priority-queued scheduler deciding which member IPs are due for a
/// reachability probe. Cheaply `Clone`-able; every clone shares the same
/// underlying state behind one mutex, including `ping_interval_sec` so a
/// hot-reload can retune every live handle at once.
#[derive(Clone)]
pub struct PingScheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl fmt::Debug for PingScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("PingScheduler");
        match self.state.try_lock() {
            Some(state) => {
                debug
                    .field("ping_interval_sec", &state.ping_interval_sec)
                    .field("clients", &state.clients.len())
                    .field("queued_tasks", &state.queue.len());
            }
            None => {
                debug.field("state", &"<locked>");
            }
        }
        debug.finish()
    }
}

impl PingScheduler {
    pub fn new(ping_interval_sec: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::new(ping_interval_sec))),
        }
    }

    /// Retunes the interval used for every future reschedule. Takes effect
    /// for all clones of this scheduler, since they share the same state.
    pub fn set_ping_interval_sec(&self, interval: f64) {
        self.state.lock().ping_interval_sec = interval;
    }

    pub fn add_client(&self, ip: &str, initial: Option<ClientRecord>) {
        let now = now_secs();
        let mut state = self.state.lock();

        let is_new = !state.clients.contains_key(ip);
        if is_new {
            let record = initial.unwrap_or_else(|| ClientRecord::new_seen_now(now));
            state.clients.insert(ip.to_string(), record);
            state.versions.insert(ip.to_string(), 1);

            let jitter = rand::rng().random_range(FIRST_PING_JITTER_MIN_SEC..FIRST_PING_JITTER_MAX_SEC);
            state.queue.push(PingTask {
                ip: ip.to_string(),
                due_time: now + jitter,
                version: 1,
            });
            tracing::debug!(%ip, jitter, "new client scheduled for first ping");
        } else {
            if let Some(initial) = initial {
                if let Some(record) = state.clients.get_mut(ip) {
                    *record = initial;
                }
            }
            if let Some(record) = state.clients.get_mut(ip) {
                record.last_seen = now;
            }
            let version = state.versions.entry(ip.to_string()).or_insert(0);
            *version += 1;
            let version = *version;
            let interval = state.ping_interval_sec;
            state.queue.push(PingTask {
                ip: ip.to_string(),
                due_time: now + interval,
                version,
            });
        }
    }

    pub fn update_ping_result(&self, ip: &str, ok: bool) {
        let now = now_secs();
        let mut state = self.state.lock();
        if !state.clients.contains_key(ip) {
            return;
        }
        if let Some(record) = state.clients.get_mut(ip) {
            record.last_ping_ok = ok;
            record.last_ping_at = now;
        }
        let version = state.versions.entry(ip.to_string()).or_insert(0);
        *version += 1;
        let version = *version;
        let interval = state.ping_interval_sec;
        state.queue.push(PingTask {
            ip: ip.to_string(),
            due_time: now + interval,
            version,
        });

        let client_count = state.clients.len();
        let queue_size = state.queue.len();
        let relative_cap =
            ((client_count as f64) * RELATIVE_QUEUE_CAP_MULTIPLIER).round().max(5.0) as usize;

        let mut should_compact = queue_size > relative_cap.max(MIN_QUEUE_SIZE_FOR_CLEANUP)
            || queue_size > ABSOLUTE_QUEUE_CAP;

        state.results_since_compaction += 1;
        if state.results_since_compaction >= COMPACTION_EVERY_N_RESULTS {
            state.results_since_compaction = 0;
            should_compact = true;
        }

        if should_compact {
            compact(&mut state, interval);
        }
    }

    /// Pops every due task, keeping only IPs whose task is still current and
    /// whose client still exists, deduplicated into a set so a single call
    /// never returns the same IP twice.
    pub fn get_ready_ips(&self) -> Vec<String> {
        let now = now_secs();
        let mut ready: HashMap<String, ()> = HashMap::new();
        let mut state = self.state.lock();

        while let Some(top) = state.queue.peek() {
            if top.due_time > now {
                break;
            }
            let task = state.queue.pop().expect("peeked element must exist");
            let current_version = state.versions.get(&task.ip).copied();
            if state.clients.contains_key(&task.ip) && current_version == Some(task.version) {
                ready.insert(task.ip, ());
            }
        }
        ready.into_keys().collect()
    }

    pub fn remove_client(&self, ip: &str) {
        let mut state = self.state.lock();
        state.clients.remove(ip);
        state.versions.remove(ip);
    }

    pub fn get_all_clients(&self) -> HashMap<String, ClientRecord> {
        self.state.lock().clients.clone()
    }

    pub fn get_stats(&self) -> SchedulerStats {
        let now = now_secs();
        let state = self.state.lock();
        SchedulerStats {
            total_clients: state.clients.len(),
            queued_tasks: state.queue.len(),
            active_versions: state.versions.len(),
            next_ping_in: state
                .queue
                .peek()
                .map(|t| t.due_time - now)
                .unwrap_or(0.0),
        }
    }

    /// Seconds until the next due task, clamped to `[0, ping_interval_sec]`.
    /// An empty queue reports the full interval rather than zero, so a
    /// caller's sleep loop doesn't spin.
    pub fn next_ready_in(&self) -> f64 {
        let now = now_secs();
        let state = self.state.lock();
        match state.queue.peek() {
            None => state.ping_interval_sec,
            Some(top) => (top.due_time - now).max(0.0),
        }
    }
}

fn compact(state: &mut SchedulerState, ping_interval_sec: f64) {
    let old_size = state.queue.len();
    if old_size <= MIN_QUEUE_SIZE_FOR_CLEANUP {
        return;
    }
    if old_size < SMALL_QUEUE_SKIP_THRESHOLD {
        return;
    }

    let now = now_secs();
    let stale_threshold = now - ping_interval_sec * STALE_TASK_MULTIPLIER;

    let kept: Vec<PingTask> = state
        .queue
        .drain()
        .filter(|task| {
            state.clients.contains_key(&task.ip)
                && state.versions.get(&task.ip).copied() == Some(task.version)
                && task.due_time > stale_threshold
        })
        .collect();

    let cleaned = old_size - kept.len();
    let cleanup_ratio = cleaned as f64 / old_size as f64;

    if cleanup_ratio > MIN_CLEANUP_RATIO_WORTH_REBUILD {
        let client_count = state.clients.len();
        state.queue = BinaryHeap::from(kept);
        if cleanup_ratio > 0.5 {
            tracing::debug!(removed = cleaned, old_size, ratio = cleanup_ratio, "scheduler compaction");
        }
        if state.queue.len() > client_count.saturating_mul(5) {
            tracing::warn!(
                queued = state.queue.len(),
                clients = client_count,
                "scheduler queue unexpectedly large relative to client count"
            );
        }
    } else {
        // Not worth paying for a rebuild; put everything back as-is.
        state.queue = kept.into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_is_returned_at_most_once_per_ready_call() {
        let scheduler = PingScheduler::new(60.0);
        scheduler.add_client("10.0.0.1", None);
        // force immediate due time by bypassing jitter: simulate several
        // update_ping_result calls which reschedule with +interval, so we
        // instead check ready-set de-duplication directly via internal state.
        let ready_first = scheduler.get_ready_ips();
        let ready_again = scheduler.get_ready_ips();
        assert!(ready_first.len() <= 1);
        assert!(ready_again.is_empty());
    }

    #[test]
    fn removed_client_never_becomes_ready_again() {
        let scheduler = PingScheduler::new(60.0);
        scheduler.add_client("10.0.0.2", None);
        scheduler.remove_client("10.0.0.2");
        // even if the task were due, the client no longer exists
        assert!(scheduler.get_all_clients().is_empty());
    }

    #[test]
    fn next_ready_in_on_empty_queue_returns_interval() {
        let scheduler = PingScheduler::new(42.0);
        assert_eq!(scheduler.next_ready_in(), 42.0);
    }

    #[test]
    fn next_ready_in_never_negative() {
        let scheduler = PingScheduler::new(1.0);
        scheduler.add_client("10.0.0.3", None);
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(scheduler.next_ready_in() >= 0.0);
    }

    #[test]
    fn stats_reflect_single_client() {
        let scheduler = PingScheduler::new(60.0);
        scheduler.add_client("10.0.0.4", None);
        let stats = scheduler.get_stats();
        assert_eq!(stats.total_clients, 1);
        assert_eq!(stats.queued_tasks, 1);
    }

    #[test]
    fn update_ping_result_bumps_version_and_reschedules() {
        let scheduler = PingScheduler::new(60.0);
        scheduler.add_client("10.0.0.5", None);
        scheduler.update_ping_result("10.0.0.5", true);
        let clients = scheduler.get_all_clients();
        let record = clients.get("10.0.0.5").unwrap();
        assert!(record.last_ping_ok);
        assert!(record.last_ping_at > 0.0);
    }

    #[test]
    fn update_ping_result_on_unknown_ip_is_a_no_op() {
        let scheduler = PingScheduler::new(60.0);
        scheduler.update_ping_result("10.0.0.99", true);
        assert!(scheduler.get_all_clients().is_empty());
    }
}
