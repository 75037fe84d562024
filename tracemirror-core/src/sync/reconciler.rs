use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::{fmt, sync::Arc, time::Duration};
use tracing::{Span, error, info, warn};

use crate::{
    domain::{BatchResult, RemoteService, ServiceUpsert},
    error::SyncError,
    ports::{CatalogClient, RegistryStore},
};

/// Outcome of one service reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Entries returned by the remote directory.
    pub fetched: usize,
    /// Entries dropped because the name was blank or the timestamp unreadable.
    pub skipped: usize,
    pub batch: BatchResult,
    /// Rows flagged inactive by the staleness sweep.
    pub marked_stale: u64,
}

/// Mirrors the remote service directory into the registry store.
pub struct ServiceReconciler {
    catalog: Arc<dyn CatalogClient>,
    registry: Arc<dyn RegistryStore>,
    stale_after: Option<Duration>,
}

impl fmt::Debug for ServiceReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceReconciler")
            .field(
                "catalog",
                &std::any::type_name_of_val(self.catalog.as_ref()),
            )
            .field(
                "registry",
                &std::any::type_name_of_val(self.registry.as_ref()),
            )
            .field("stale_after", &self.stale_after)
            .finish()
    }
}

impl ServiceReconciler {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        registry: Arc<dyn RegistryStore>,
    ) -> Self {
        Self {
            catalog,
            registry,
            stale_after: None,
        }
    }

    pub fn with_stale_after(mut self, stale_after: Option<Duration>) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Fetch the full directory, submit one upsert per entry as a single
    /// batch, then sweep stale rows when configured.
    ///
    /// A fetch failure returns before anything is written.
    pub async fn reconcile(&self) -> Result<ReconcileReport, SyncError> {
        let services = match self.catalog.list_services().await {
            Ok(services) => services,
            Err(err) => {
                Span::current().record("error", true);
                error!(error = %err, "failed to fetch service directory");
                return Err(err.into());
            }
        };
        info!(services = services.len(), "fetched service directory");

        let fetched = services.len();
        let (ops, skipped) = build_upserts(services);

        let batch = match self.registry.bulk_upsert(ops).await {
            Ok(batch) => batch,
            Err(err) => {
                Span::current().record("error", true);
                error!(error = %err, "service batch write failed");
                return Err(err.into());
            }
        };
        info!(
            submitted = batch.submitted,
            inserted = batch.inserted,
            updated = batch.updated,
            skipped,
            "services upserted"
        );

        let marked_stale = match self.stale_cutoff(Utc::now()) {
            Some(cutoff) => match self.registry.mark_stale(cutoff).await {
                Ok(count) => {
                    if count > 0 {
                        info!(count, cutoff = %cutoff, "marked stale services inactive");
                    }
                    count
                }
                Err(err) => {
                    Span::current().record("error", true);
                    error!(error = %err, "staleness sweep failed");
                    return Err(err.into());
                }
            },
            None => 0,
        };

        Ok(ReconcileReport {
            fetched,
            skipped,
            batch,
            marked_stale,
        })
    }

    fn stale_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let window = TimeDelta::from_std(self.stale_after?).ok()?;
        now.checked_sub_signed(window)
    }
}

/// Turn remote entries into keyed upserts, preserving order so repeated
/// names resolve last-write-wins in the store.
pub fn build_upserts(services: Vec<RemoteService>) -> (Vec<ServiceUpsert>, usize) {
    let mut skipped = 0;
    let mut ops = Vec::with_capacity(services.len());

    for service in services {
        let name = service.name.trim();
        if name.is_empty() {
            warn!("skipping service with blank name");
            skipped += 1;
            continue;
        }

        match DateTime::parse_from_rfc3339(service.last_seen.trim()) {
            Ok(last_seen) => ops.push(ServiceUpsert {
                name: name.to_string(),
                last_seen: last_seen.with_timezone(&Utc),
            }),
            Err(err) => {
                warn!(
                    service = name,
                    last_seen = %service.last_seen,
                    error = %err,
                    "skipping service with unreadable last_seen"
                );
                skipped += 1;
            }
        }
    }

    (ops, skipped)
}
