use thiserror::Error;

use crate::domain::WindowOutOfRange;

/// Failures talking to the remote catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog rejected credentials")]
    Unauthorized,

    #[error("Catalog rate limited the request")]
    RateLimited,

    #[error("Catalog resource not found: {0}")]
    NotFound(String),

    #[error("Catalog returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid catalog endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Failures delivering a work item.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel unavailable: {0}")]
    Unavailable(String),

    #[error("Publish failed: {0}")]
    Publish(String),
}

/// Failures reading or writing the service registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry connection failed: {0}")]
    Connection(String),

    #[error("Registry batch write failed: {0}")]
    BatchWrite(String),

    #[error("Registry query failed: {0}")]
    Query(String),

    #[error("Registry migration failed: {0}")]
    Migration(String),
}

/// Error surfaced by a single synchronization track.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("catalog fetch failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("registry write failed: {0}")]
    Registry(#[from] RegistryError),

    #[error("work channel failed: {0}")]
    Channel(#[from] ChannelError),

    #[error("invalid exemplar window: {0}")]
    Window(#[from] WindowOutOfRange),
}

pub type Result<T> = std::result::Result<T, SyncError>;
