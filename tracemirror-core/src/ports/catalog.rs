use async_trait::async_trait;

use crate::{
    domain::{Exemplar, RemoteService, StreamId, TimeWindow},
    error::CatalogError,
};

/// Read access to the remote platform's service directory and streams.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn list_services(&self) -> Result<Vec<RemoteService>, CatalogError>;

    async fn list_streams(&self) -> Result<Vec<StreamId>, CatalogError>;

    /// Exemplars recorded for `stream` inside `window`.
    ///
    /// `None` means the response carried no exemplar list at all, which is
    /// not an error.
    async fn stream_exemplars(
        &self,
        stream: &StreamId,
        window: &TimeWindow,
    ) -> Result<Option<Vec<Exemplar>>, CatalogError>;
}
