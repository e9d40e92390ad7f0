use serde::{Deserialize, Serialize};

/// In-memory record for one overlay-network member, keyed externally by its
/// textual address. Mirrors the three-field shape of the original's
/// `ClientInfo` exactly: no more, no less.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub last_seen: f64,
    pub last_ping_ok: bool,
    pub last_ping_at: f64,
}

impl Default for ClientRecord {
    fn default() -> Self {
        Self {
            last_seen: 0.0,
            last_ping_ok: false,
            last_ping_at: 0.0,
        }
    }
}

impl ClientRecord {
    pub fn new_seen_now(now: f64) -> Self {
        Self {
            last_seen: now,
            last_ping_ok: false,
            last_ping_at: 0.0,
        }
    }

    /// `active` and ping-classification are independent axes: a client can be
    /// inactive (hasn't re-registered recently) yet still `online` from its
    /// last successful probe, or active yet `never_pinged` if no probe has
    /// completed since it reported in.
    pub fn is_active(&self, now: f64, offline_threshold_sec: f64) -> bool {
        now - self.last_seen <= offline_threshold_sec
    }

    pub fn classification(&self) -> Classification {
        if self.last_ping_at == 0.0 {
            Classification::NeverPinged
        } else if self.last_ping_ok {
            Classification::Online
        } else {
            Classification::Offline
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Online,
    Offline,
    NeverPinged,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ClientStats {
    pub total: usize,
    pub active: usize,
    pub online: usize,
    pub offline: usize,
    pub never_pinged: usize,
}

/// On-disk shape for one entry in the persisted snapshot. Tolerates the
/// legacy format, where the value was a bare timestamp number rather than an
/// object, by treating the number as `last_seen` with the rest defaulted.
/// This tolerance is permanent, not a one-time migration step: the loader
/// will keep accepting both shapes indefinitely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredClient {
    Full(ClientRecord),
    LegacyTimestamp(f64),
}

impl From<StoredClient> for ClientRecord {
    fn from(value: StoredClient) -> Self {
        match value {
            StoredClient::Full(record) => record,
            StoredClient::LegacyTimestamp(last_seen) => ClientRecord {
                last_seen,
                last_ping_ok: false,
                last_ping_at: 0.0,
            },
        }
    }
}

impl From<ClientRecord> for StoredClient {
    fn from(value: ClientRecord) -> Self {
        StoredClient::Full(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_numeric_shape_becomes_last_seen_only() {
        let parsed: StoredClient = serde_json::from_str("1700000000.0").unwrap();
        let record: ClientRecord = parsed.into();
        assert_eq!(record.last_seen, 1700000000.0);
        assert_eq!(record.last_ping_at, 0.0);
        assert!(!record.last_ping_ok);
    }

    #[test]
    fn full_shape_round_trips() {
        let record = ClientRecord {
            last_seen: 10.0,
            last_ping_ok: true,
            last_ping_at: 9.0,
        };
        let stored: StoredClient = record.into();
        let json = serde_json::to_string(&stored).unwrap();
        let parsed: StoredClient = serde_json::from_str(&json).unwrap();
        let back: ClientRecord = parsed.into();
        assert_eq!(back, record);
    }

    #[test]
    fn classification_is_independent_of_activity() {
        let record = ClientRecord {
            last_seen: 0.0,
            last_ping_ok: true,
            last_ping_at: 5.0,
        };
        assert_eq!(record.classification(), Classification::Online);
        assert!(!record.is_active(1000.0, 60.0));
    }
}
