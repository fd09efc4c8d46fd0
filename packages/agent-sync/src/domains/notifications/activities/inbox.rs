//! Inbox activities over materialized events.
//!
//! User-facing reads and the read/unread toggle. The sync loop never deletes
//! materialized events; only [`NotificationInbox::delete`] does.

use tracing::debug;

use crate::common::SyncError;
use crate::domains::notifications::models::MaterializedEvent;
use crate::kernel::SyncDeps;

pub struct NotificationInbox {
    deps: SyncDeps,
}

impl NotificationInbox {
    pub fn new(deps: SyncDeps) -> Self {
        Self { deps }
    }

    pub async fn all(&self) -> Result<Vec<MaterializedEvent>, SyncError> {
        self.deps.events.get_all().await.map_err(SyncError::store)
    }

    pub async fn find_by_correlation(
        &self,
        correlation_id: &str,
    ) -> Result<Vec<MaterializedEvent>, SyncError> {
        self.deps
            .events
            .find_by_correlation(correlation_id)
            .await
            .map_err(SyncError::store)
    }

    pub async fn mark_read(&self, id: &str) -> Result<(), SyncError> {
        self.set_read(id, true).await
    }

    pub async fn mark_unread(&self, id: &str) -> Result<(), SyncError> {
        self.set_read(id, false).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
        debug!(event_id = %id, "deleting notification");
        self.deps
            .events
            .delete_by_id(id)
            .await
            .map_err(SyncError::store)
    }

    async fn set_read(&self, id: &str, read: bool) -> Result<(), SyncError> {
        let mut event = self
            .deps
            .events
            .find_by_id(id)
            .await
            .map_err(SyncError::store)?
            .ok_or_else(|| SyncError::NotificationNotFound(id.to_string()))?;

        event.read = read;
        self.deps
            .events
            .update(&event)
            .await
            .map_err(SyncError::store)
    }
}
