use std::{fmt, sync::Arc};

use tracemirror_core::{ports::RegistryStore, sync::SyncStatusHandle};

/// Shared handler state.
///
/// The registry is optional: with synchronization disabled and no database
/// configured the process still serves health and status.
#[derive(Clone)]
pub struct AppState {
    registry: Option<Arc<dyn RegistryStore>>,
    sync_status: SyncStatusHandle,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("registry", &self.registry.is_some())
            .field("sync_status", &self.sync_status)
            .finish()
    }
}

impl AppState {
    pub fn new(
        registry: Option<Arc<dyn RegistryStore>>,
        sync_status: SyncStatusHandle,
    ) -> Self {
        Self {
            registry,
            sync_status,
        }
    }

    pub fn registry(&self) -> Option<&Arc<dyn RegistryStore>> {
        self.registry.as_ref()
    }

    pub fn sync_status(&self) -> &SyncStatusHandle {
        &self.sync_status
    }
}
