#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tracemirror_core::{
    RegistryError,
    domain::{BatchResult, ServiceFilter, ServiceRecord, ServiceUpsert},
    ports::RegistryStore,
    sync::{DriverState, SyncStatus, SyncStatusHandle},
};
use tracemirror_server::{AppState, create_app};

pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap()
}

pub fn record(name: &str, active: bool) -> ServiceRecord {
    ServiceRecord {
        name: name.to_string(),
        last_seen: at(0),
        active,
        updated_at: at(1),
    }
}

/// Registry returning a fixed set of rows.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    records: Mutex<Vec<ServiceRecord>>,
    list_calls: AtomicUsize,
    pings: AtomicUsize,
}

impl StaticRegistry {
    pub fn with(records: Vec<ServiceRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryStore for StaticRegistry {
    async fn bulk_upsert(
        &self,
        ops: Vec<ServiceUpsert>,
    ) -> Result<BatchResult, RegistryError> {
        Ok(BatchResult {
            submitted: ops.len(),
            ..BatchResult::default()
        })
    }

    async fn mark_stale(
        &self,
        _cutoff: DateTime<Utc>,
    ) -> Result<u64, RegistryError> {
        Ok(0)
    }

    async fn list_services(
        &self,
        filter: ServiceFilter,
    ) -> Result<Vec<ServiceRecord>, RegistryError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Registry whose every read fails with the given error kind.
#[derive(Debug)]
pub struct BrokenRegistry {
    pub unreachable: bool,
}

#[async_trait]
impl RegistryStore for BrokenRegistry {
    async fn bulk_upsert(
        &self,
        _ops: Vec<ServiceUpsert>,
    ) -> Result<BatchResult, RegistryError> {
        Err(RegistryError::BatchWrite("broken".into()))
    }

    async fn mark_stale(
        &self,
        _cutoff: DateTime<Utc>,
    ) -> Result<u64, RegistryError> {
        Err(RegistryError::Query("broken".into()))
    }

    async fn list_services(
        &self,
        _filter: ServiceFilter,
    ) -> Result<Vec<ServiceRecord>, RegistryError> {
        if self.unreachable {
            Err(RegistryError::Connection("connection refused".into()))
        } else {
            Err(RegistryError::Query("relation does not exist".into()))
        }
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        if self.unreachable {
            Err(RegistryError::Connection("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

pub fn disabled_status() -> SyncStatusHandle {
    SyncStatusHandle::new(SyncStatus::new(DriverState::Disabled, 20))
}

pub fn app(
    registry: Option<Arc<dyn RegistryStore>>,
    status: SyncStatusHandle,
) -> axum::Router {
    create_app(AppState::new(registry, status))
}
