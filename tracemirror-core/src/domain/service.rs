use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A service as the remote directory reports it.
///
/// `last_seen` is kept as the raw RFC 3339 text; parsing happens in the
/// reconciler so a single malformed entry does not fail the whole listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteService {
    pub name: String,
    pub last_seen: String,
}

impl RemoteService {
    pub fn new(name: impl Into<String>, last_seen: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_seen: last_seen.into(),
        }
    }
}

/// One keyed upsert against the registry: set `name` and `last_seen` on the
/// record whose key is `name`, creating it when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUpsert {
    pub name: String,
    pub last_seen: DateTime<Utc>,
}

/// A persisted registry row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    pub last_seen: DateTime<Utc>,
    /// Cleared by the staleness sweep, set again by the next upsert.
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of one registry batch write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// Operations handed to the store.
    pub submitted: usize,
    pub inserted: u64,
    pub updated: u64,
}

impl BatchResult {
    pub fn applied(&self) -> u64 {
        self.inserted + self.updated
    }
}

/// Listing filter for registry reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceFilter {
    /// `Some(true)` keeps only active rows, `Some(false)` only stale ones.
    pub active: Option<bool>,
}

impl ServiceFilter {
    pub fn matches(&self, record: &ServiceRecord) -> bool {
        self.active.is_none_or(|active| record.active == active)
    }
}
