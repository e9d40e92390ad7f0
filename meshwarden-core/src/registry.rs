use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use meshwarden_model::{ClientRecord, ClientStats, StoredClient};

use crate::time::now_secs;

struct RegistryState {
    clients: HashMap<String, ClientRecord>,
    dirty: bool,
}

/// Thread-safe client registry. All mutation and read operations take the
/// same mutex; none perform I/O while holding it.
#[derive(Clone)]
pub struct ClientRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState {
                clients: HashMap::new(),
                dirty: false,
            })),
        }
    }

    pub fn add_or_update(&self, ip: &str, seen_now: bool, fields: Option<ClientRecord>) {
        let now = now_secs();
        let mut state = self.state.lock();
        let mut changed = false;

        let entry = state.clients.entry(ip.to_string()).or_insert_with(|| {
            changed = true;
            ClientRecord::new_seen_now(now)
        });

        if let Some(fields) = fields {
            if *entry != fields {
                *entry = fields;
                changed = true;
            }
        }
        if seen_now && entry.last_seen != now {
            entry.last_seen = now;
            changed = true;
        }

        if changed {
            state.dirty = true;
        }
    }

    pub fn update_ping_result(&self, ip: &str, ok: bool) -> bool {
        let now = now_secs();
        let mut state = self.state.lock();
        match state.clients.get_mut(ip) {
            Some(record) => {
                record.last_ping_ok = ok;
                record.last_ping_at = now;
                state.dirty = true;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, ip: &str) -> bool {
        let mut state = self.state.lock();
        let removed = state.clients.remove(ip).is_some();
        if removed {
            state.dirty = true;
        }
        removed
    }

    pub fn cleanup_offline(&self, threshold_sec: f64) -> usize {
        let now = now_secs();
        let mut state = self.state.lock();
        let stale: Vec<String> = state
            .clients
            .iter()
            .filter(|(_, record)| now - record.last_seen > threshold_sec)
            .map(|(ip, _)| ip.clone())
            .collect();
        for ip in &stale {
            state.clients.remove(ip);
        }
        if !stale.is_empty() {
            state.dirty = true;
        }
        stale.len()
    }

    pub fn get_all(&self) -> HashMap<String, ClientRecord> {
        self.state.lock().clients.clone()
    }

    pub fn get_active(&self, offline_threshold_sec: f64) -> HashMap<String, ClientRecord> {
        let now = now_secs();
        self.state
            .lock()
            .clients
            .iter()
            .filter(|(_, record)| record.is_active(now, offline_threshold_sec))
            .map(|(ip, record)| (ip.clone(), *record))
            .collect()
    }

    pub fn get_stats(&self, offline_threshold_sec: f64) -> ClientStats {
        let now = now_secs();
        let state = self.state.lock();
        let mut stats = ClientStats {
            total: state.clients.len(),
            ..Default::default()
        };
        for record in state.clients.values() {
            if record.is_active(now, offline_threshold_sec) {
                stats.active += 1;
            }
            match record.classification() {
                meshwarden_model::Classification::Online => stats.online += 1,
                meshwarden_model::Classification::Offline => stats.offline += 1,
                meshwarden_model::Classification::NeverPinged => stats.never_pinged += 1,
            }
        }
        stats
    }

    pub fn size(&self) -> usize {
        self.state.lock().clients.len()
    }

    /// Atomically returns a snapshot of current data and clears the dirty
    /// flag in one critical section, or returns `None` if nothing changed
    /// since the last snapshot. Splitting this into separate
    /// "is-dirty-then-snapshot-then-clear" calls would let a mutation race
    /// between the check and the clear and be silently lost.
    pub fn get_data_snapshot_and_mark_clean(&self) -> Option<HashMap<String, ClientRecord>> {
        let mut state = self.state.lock();
        if !state.dirty {
            return None;
        }
        let snapshot = state.clients.clone();
        state.dirty = false;
        Some(snapshot)
    }

    pub fn mark_dirty(&self) {
        self.state.lock().dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Replaces all contents, tolerating the legacy bare-number shape via
    /// [`StoredClient`]. Clears the dirty flag since this represents a known
    /// on-disk state, not an in-memory mutation pending a save.
    pub fn load_from_dict(&self, data: HashMap<String, StoredClient>) -> usize {
        let mut state = self.state.lock();
        state.clients.clear();
        for (ip, stored) in data {
            state.clients.insert(ip, stored.into());
        }
        state.dirty = false;
        state.clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_returns_none_when_clean() {
        let registry = ClientRegistry::new();
        assert!(registry.get_data_snapshot_and_mark_clean().is_none());
    }

    #[test]
    fn snapshot_then_immediate_second_call_is_none() {
        let registry = ClientRegistry::new();
        registry.add_or_update("10.0.0.1", true, None);
        assert!(registry.get_data_snapshot_and_mark_clean().is_some());
        assert!(registry.get_data_snapshot_and_mark_clean().is_none());
    }

    #[test]
    fn mark_dirty_after_failed_save_makes_it_dirty_again() {
        let registry = ClientRegistry::new();
        registry.add_or_update("10.0.0.1", true, None);
        registry.get_data_snapshot_and_mark_clean();
        assert!(!registry.is_dirty());
        registry.mark_dirty();
        assert!(registry.is_dirty());
    }

    #[test]
    fn stats_are_mutually_exclusive_and_sum_to_total() {
        let registry = ClientRegistry::new();
        registry.add_or_update("10.0.0.1", true, None);
        registry.add_or_update("10.0.0.2", true, None);
        registry.update_ping_result("10.0.0.2", true);
        let stats = registry.get_stats(300.0);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.online + stats.offline + stats.never_pinged, stats.total);
    }

    #[test]
    fn legacy_load_treats_number_as_last_seen() {
        let registry = ClientRegistry::new();
        let mut data = HashMap::new();
        data.insert(
            "10.0.0.1".to_string(),
            StoredClient::LegacyTimestamp(1700000000.0),
        );
        registry.load_from_dict(data);
        let all = registry.get_all();
        let record = all.get("10.0.0.1").unwrap();
        assert_eq!(record.last_seen, 1700000000.0);
        assert_eq!(record.last_ping_at, 0.0);
        assert!(!registry.is_dirty());
    }

    #[test]
    fn cleanup_offline_removes_and_marks_dirty() {
        let registry = ClientRegistry::new();
        registry.add_or_update("10.0.0.1", true, None);
        registry.get_data_snapshot_and_mark_clean();
        // backdate via load_from_dict to simulate an old client
        let mut data = HashMap::new();
        data.insert(
            "10.0.0.1".to_string(),
            StoredClient::Full(ClientRecord {
                last_seen: 0.0,
                last_ping_ok: false,
                last_ping_at: 0.0,
            }),
        );
        registry.load_from_dict(data);
        let removed = registry.cleanup_offline(60.0);
        assert_eq!(removed, 1);
        assert!(registry.is_dirty());
        assert_eq!(registry.size(), 0);
    }
}
