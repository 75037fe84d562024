use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{BatchResult, ServiceFilter, ServiceRecord, ServiceUpsert},
    error::RegistryError,
};

/// Persistent owner of service records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Apply every upsert as one batch. Operations are applied in order, so
    /// a name repeated within the batch ends with the last value.
    async fn bulk_upsert(
        &self,
        ops: Vec<ServiceUpsert>,
    ) -> Result<BatchResult, RegistryError>;

    /// Flag rows whose `last_seen` is older than `cutoff` as inactive.
    /// Returns the number of rows that changed.
    async fn mark_stale(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RegistryError>;

    async fn list_services(
        &self,
        filter: ServiceFilter,
    ) -> Result<Vec<ServiceRecord>, RegistryError>;

    /// Cheapest round trip that proves the store is reachable.
    async fn ping(&self) -> Result<(), RegistryError>;
}
