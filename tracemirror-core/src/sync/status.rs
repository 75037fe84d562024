use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{fanout::FanOutReport, reconciler::ReconcileReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    /// Synchronization is off; no pass is ever scheduled.
    Disabled,
    /// An immediate pass ran at start and passes recur on the rule.
    Scheduled,
    /// Cancelled; no further passes start.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Services,
    Streams,
}

impl Track {
    pub fn as_str(&self) -> &'static str {
        match self {
            Track::Services => "services",
            Track::Streams => "streams",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackOutcome {
    Running,
    Reconciled { report: ReconcileReport },
    FannedOut { report: FanOutReport, had_errors: bool },
    Failed { error: String },
}

impl TrackOutcome {
    pub fn is_failure(&self) -> bool {
        match self {
            TrackOutcome::Failed { .. } => true,
            TrackOutcome::FannedOut { had_errors, .. } => *had_errors,
            TrackOutcome::Running | TrackOutcome::Reconciled { .. } => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackRun {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: TrackOutcome,
}

/// Per-track counters plus the most recent run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackStatus {
    pub runs: u64,
    pub failures: u64,
    /// Ticks dropped because the previous run of this track was still going.
    pub skipped: u64,
    pub last_run: Option<TrackRun>,
}

impl TrackStatus {
    pub fn is_running(&self) -> bool {
        matches!(
            self.last_run,
            Some(TrackRun {
                outcome: TrackOutcome::Running,
                ..
            })
        )
    }
}

/// Snapshot of the recurrence driver served over the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub state: DriverState,
    pub interval_minutes: u32,
    pub passes_started: u64,
    pub next_fire_at: Option<DateTime<Utc>>,
    pub services: TrackStatus,
    pub streams: TrackStatus,
}

impl SyncStatus {
    pub fn new(state: DriverState, interval_minutes: u32) -> Self {
        Self {
            state,
            interval_minutes,
            passes_started: 0,
            next_fire_at: None,
            services: TrackStatus::default(),
            streams: TrackStatus::default(),
        }
    }

    pub fn track(&self, track: Track) -> &TrackStatus {
        match track {
            Track::Services => &self.services,
            Track::Streams => &self.streams,
        }
    }

    pub fn track_mut(&mut self, track: Track) -> &mut TrackStatus {
        match track {
            Track::Services => &mut self.services,
            Track::Streams => &mut self.streams,
        }
    }
}

/// Shared, cloneable handle to the driver's status.
#[derive(Debug, Clone)]
pub struct SyncStatusHandle {
    inner: Arc<RwLock<SyncStatus>>,
}

impl SyncStatusHandle {
    pub fn new(status: SyncStatus) -> Self {
        Self {
            inner: Arc::new(RwLock::new(status)),
        }
    }

    pub async fn snapshot(&self) -> SyncStatus {
        self.inner.read().await.clone()
    }

    /// Non-blocking read; `None` while a writer holds the lock.
    pub fn try_snapshot(&self) -> Option<SyncStatus> {
        self.inner.try_read().ok().map(|guard| guard.clone())
    }

    pub async fn update<F>(&self, apply: F)
    where
        F: FnOnce(&mut SyncStatus),
    {
        let mut guard = self.inner.write().await;
        apply(&mut guard);
    }

    pub(crate) async fn track_started(
        &self,
        track: Track,
        pass_id: Uuid,
        started_at: DateTime<Utc>,
    ) {
        self.update(|status| {
            let entry = status.track_mut(track);
            entry.runs += 1;
            entry.last_run = Some(TrackRun {
                pass_id,
                started_at,
                finished_at: None,
                outcome: TrackOutcome::Running,
            });
        })
        .await;
    }

    pub(crate) async fn track_finished(
        &self,
        track: Track,
        pass_id: Uuid,
        outcome: TrackOutcome,
    ) {
        let failed = outcome.is_failure();
        self.update(|status| {
            let entry = status.track_mut(track);
            if failed {
                entry.failures += 1;
            }
            // A later pass may have replaced the slot; only close our own.
            if let Some(run) = entry.last_run.as_mut()
                && run.pass_id == pass_id
            {
                run.finished_at = Some(Utc::now());
                run.outcome = outcome;
            }
        })
        .await;
    }

    pub(crate) async fn track_skipped(&self, track: Track) {
        self.update(|status| status.track_mut(track).skipped += 1)
            .await;
    }
}
