//! The synchronization job: service reconciliation, stream fan-out and the
//! recurrence driver that runs both.

pub mod config;
pub mod driver;
pub mod fanout;
pub mod reconciler;
pub mod recurrence;
pub mod retry;
pub mod status;

pub use config::{PublishRetryConfig, SyncConfig};
pub use driver::{PassDispatch, PassSummary, SyncDriver};
pub use fanout::{FanOutReport, StreamFanOut};
pub use reconciler::{ReconcileReport, ServiceReconciler};
pub use recurrence::{InvalidRecurrence, RecurrenceRule};
pub use retry::RetryPolicy;
pub use status::{
    DriverState, SyncStatus, SyncStatusHandle, Track, TrackOutcome, TrackRun,
    TrackStatus,
};
