//! # tracemirror core
//!
//! Keeps a local service registry in step with a remote tracing platform and
//! forwards recently sampled trace identifiers to downstream workers.
//!
//! ## Overview
//!
//! - **Service reconciliation**: the remote service directory is fetched and
//!   upserted into the registry store as one batch, keyed on service name.
//! - **Stream fan-out**: every saved stream is asked for exemplars in a fixed
//!   lookback window and each exemplar's span id is published to a work
//!   channel.
//! - **Recurrence**: both tracks run once at startup and then on
//!   minute-of-hour boundaries.
//!
//! ## Feature Flags
//!
//! - `postgres`: PostgreSQL registry store and embedded migrations (SQLx)
//! - `redis`: Redis pub/sub work channel
//! - `e2e`: tests that require a live PostgreSQL instance
//!
//! ## Architecture
//!
//! - [`domain`]: data carried between the catalog, the core and the sinks
//! - [`ports`]: collaborator traits the sync core is written against
//! - [`infrastructure`]: concrete adapters for those traits
//! - [`sync`]: reconciler, fan-out and the recurrence driver

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ports;
pub mod sync;

pub use error::{CatalogError, ChannelError, RegistryError, SyncError};

/// Embedded schema migrations for the registry store.
#[cfg(feature = "postgres")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
