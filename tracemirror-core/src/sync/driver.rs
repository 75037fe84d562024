use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::{
    any::Any,
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, error, field, info, info_span, warn};
use uuid::Uuid;

use crate::ports::{CatalogClient, RegistryStore, WorkChannel};

use super::{
    config::SyncConfig,
    fanout::StreamFanOut,
    reconciler::ServiceReconciler,
    recurrence::{InvalidRecurrence, RecurrenceRule},
    retry::RetryPolicy,
    status::{
        DriverState, SyncStatus, SyncStatusHandle, Track, TrackOutcome,
    },
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Runs the reconciler and the fan-out once at start and then on every
/// minute the recurrence rule allows.
///
/// Each track keeps at most one run in flight. A tick that finds the
/// previous run of a track still going skips that track only.
pub struct SyncDriver {
    reconciler: Arc<ServiceReconciler>,
    fan_out: Arc<StreamFanOut>,
    rule: RecurrenceRule,
    enabled: bool,
    status: SyncStatusHandle,
    services_busy: Arc<AtomicBool>,
    streams_busy: Arc<AtomicBool>,
    shutdown_token: CancellationToken,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for SyncDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncDriver")
            .field("reconciler", &self.reconciler)
            .field("fan_out", &self.fan_out)
            .field("rule", &self.rule)
            .field("enabled", &self.enabled)
            .field("services_busy", &self.services_busy.load(Ordering::Relaxed))
            .field("streams_busy", &self.streams_busy.load(Ordering::Relaxed))
            .field("shutdown_cancelled", &self.shutdown_token.is_cancelled())
            .finish()
    }
}

impl SyncDriver {
    pub fn new(
        reconciler: ServiceReconciler,
        fan_out: StreamFanOut,
        rule: RecurrenceRule,
        enabled: bool,
    ) -> Self {
        let state = if enabled {
            DriverState::Scheduled
        } else {
            DriverState::Disabled
        };

        Self {
            reconciler: Arc::new(reconciler),
            fan_out: Arc::new(fan_out),
            rule,
            enabled,
            status: SyncStatusHandle::new(SyncStatus::new(state, rule.step())),
            services_busy: Arc::new(AtomicBool::new(false)),
            streams_busy: Arc::new(AtomicBool::new(false)),
            shutdown_token: CancellationToken::new(),
            loop_handle: Mutex::new(None),
        }
    }

    /// Wire both tracks from configuration and injected collaborators.
    pub fn from_config(
        config: &SyncConfig,
        catalog: Arc<dyn CatalogClient>,
        registry: Arc<dyn RegistryStore>,
        channel: Arc<dyn WorkChannel>,
    ) -> Result<Self, InvalidRecurrence> {
        let rule = config.recurrence()?;

        let reconciler = ServiceReconciler::new(Arc::clone(&catalog), registry)
            .with_stale_after(config.stale_after());
        let fan_out = StreamFanOut::new(
            catalog,
            channel,
            config.lookback_window(),
            config.topic.clone(),
        )
        .with_max_concurrent(config.max_concurrent_streams)
        .with_retry(RetryPolicy::from(&config.publish_retry));

        Ok(Self::new(reconciler, fan_out, rule, config.enabled))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rule(&self) -> RecurrenceRule {
        self.rule
    }

    pub fn status(&self) -> SyncStatusHandle {
        self.status.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Start the recurrence loop. A disabled driver never runs a pass and
    /// this returns `false`.
    pub async fn start(self: &Arc<Self>) -> bool {
        if !self.enabled {
            info!("Synchronization disabled; no passes will be scheduled");
            return false;
        }

        let mut guard = self.loop_handle.lock().await;
        if guard.is_some() {
            warn!("Sync driver already started");
            return true;
        }

        let driver = Arc::clone(self);
        *guard = Some(tokio::spawn(async move { driver.run().await }));
        true
    }

    async fn run(&self) {
        info!(
            interval_minutes = self.rule.step(),
            "Sync driver started"
        );

        // Passes are dispatched, not awaited, so a slow track cannot delay
        // the next tick.
        self.trigger_pass().await;

        let mut last_fire: Option<DateTime<Utc>> = None;
        loop {
            let now = Utc::now();
            // The timer may wake a hair before the wall-clock boundary; never
            // schedule the same slot twice.
            let reference = last_fire.map_or(now, |fired| fired.max(now));
            let next = self.rule.next_after(reference);
            let delay = (next - now).to_std().unwrap_or_default();
            self.status
                .update(|status| status.next_fire_at = Some(next))
                .await;

            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    info!("Sync driver shutting down");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    last_fire = Some(next);
                    self.trigger_pass().await;
                }
            }
        }

        self.status
            .update(|status| {
                status.state = DriverState::Stopped;
                status.next_fire_at = None;
            })
            .await;
    }

    /// Dispatch one pass: both tracks start independently and are not
    /// awaited against each other. Use [`PassDispatch::join`] to wait.
    pub async fn trigger_pass(&self) -> PassDispatch {
        let pass_id = Uuid::now_v7();
        let started_at = Utc::now();
        self.status
            .update(|status| status.passes_started += 1)
            .await;
        info!(pass.id = %pass_id, "Starting synchronization pass");

        let reconciler = Arc::clone(&self.reconciler);
        let services = self
            .dispatch(
                Track::Services,
                pass_id,
                started_at,
                info_span!("sync_services", pass.id = %pass_id, error = field::Empty),
                async move {
                    match reconciler.reconcile().await {
                        Ok(report) => TrackOutcome::Reconciled { report },
                        Err(err) => TrackOutcome::Failed {
                            error: err.to_string(),
                        },
                    }
                },
            )
            .await;

        let fan_out = Arc::clone(&self.fan_out);
        let streams = self
            .dispatch(
                Track::Streams,
                pass_id,
                started_at,
                info_span!("sync_streams", pass.id = %pass_id, error = field::Empty),
                async move {
                    match fan_out.fan_out().await {
                        Ok(report) => TrackOutcome::FannedOut {
                            report,
                            had_errors: report.had_errors(),
                        },
                        Err(err) => TrackOutcome::Failed {
                            error: err.to_string(),
                        },
                    }
                },
            )
            .await;

        PassDispatch {
            pass_id,
            services,
            streams,
        }
    }

    async fn dispatch<Fut>(
        &self,
        track: Track,
        pass_id: Uuid,
        started_at: DateTime<Utc>,
        span: Span,
        work: Fut,
    ) -> Option<JoinHandle<TrackOutcome>>
    where
        Fut: Future<Output = TrackOutcome> + Send + 'static,
    {
        let Some(busy) = BusyGuard::acquire(self.busy_flag(track)) else {
            warn!(
                pass.id = %pass_id,
                track = track.as_str(),
                "Previous run still in progress; skipping track"
            );
            self.status.track_skipped(track).await;
            return None;
        };

        self.status.track_started(track, pass_id, started_at).await;
        let status = self.status.clone();

        Some(tokio::spawn(
            async move {
                // A panicking track still closes its run so the status never
                // reports it as running forever.
                let outcome = match AssertUnwindSafe(work).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        Span::current().record("error", true);
                        error!(
                            track = track.as_str(),
                            error = %message,
                            "track panicked"
                        );
                        TrackOutcome::Failed {
                            error: format!("track panicked: {message}"),
                        }
                    }
                };
                status
                    .track_finished(track, pass_id, outcome.clone())
                    .await;
                drop(busy);
                outcome
            }
            .instrument(span),
        ))
    }

    fn busy_flag(&self, track: Track) -> &Arc<AtomicBool> {
        match track {
            Track::Services => &self.services_busy,
            Track::Streams => &self.streams_busy,
        }
    }

    /// Stop scheduling new passes and wait for the loop to exit. Runs
    /// already dispatched are left to finish on their own.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of sync driver");
        self.shutdown_token.cancel();

        let handle = self.loop_handle.lock().await.take();
        if let Some(handle) = handle {
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Sync driver task failed: {:?}", e),
                Err(_) => warn!("Sync driver task timed out during shutdown"),
            }
        }

        if self.enabled {
            self.status
                .update(|status| {
                    status.state = DriverState::Stopped;
                    status.next_fire_at = None;
                })
                .await;
        }
        info!("Sync driver shutdown complete");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Clears the in-flight flag when the track's task ends, including on
/// panic.
#[derive(Debug)]
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handles to the tracks started by one pass. `None` means the track was
/// skipped because a previous run was still in flight.
#[derive(Debug)]
pub struct PassDispatch {
    pub pass_id: Uuid,
    services: Option<JoinHandle<TrackOutcome>>,
    streams: Option<JoinHandle<TrackOutcome>>,
}

impl PassDispatch {
    pub fn services_skipped(&self) -> bool {
        self.services.is_none()
    }

    pub fn streams_skipped(&self) -> bool {
        self.streams.is_none()
    }

    /// Wait for both tracks to finish.
    pub async fn join(self) -> PassSummary {
        let (services, streams) =
            tokio::join!(join_track(self.services), join_track(self.streams));

        PassSummary {
            pass_id: self.pass_id,
            services,
            streams,
        }
    }
}

async fn join_track(
    handle: Option<JoinHandle<TrackOutcome>>,
) -> Option<TrackOutcome> {
    let handle = handle?;
    Some(match handle.await {
        Ok(outcome) => outcome,
        Err(err) => TrackOutcome::Failed {
            error: format!("track task aborted: {err}"),
        },
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub pass_id: Uuid,
    pub services: Option<TrackOutcome>,
    pub streams: Option<TrackOutcome>,
}

impl PassSummary {
    pub fn had_errors(&self) -> bool {
        [&self.services, &self.streams]
            .into_iter()
            .flatten()
            .any(TrackOutcome::is_failure)
    }
}
