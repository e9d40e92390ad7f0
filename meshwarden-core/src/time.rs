use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock seconds as an f64, matching the granularity the scheduler and
/// registry reason about (`last_seen`, `due_time`, …).
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
