//! Sync dependencies (using traits for testability)
//!
//! Central container handed to both loops. Every external collaborator sits
//! behind a trait object so tests can swap in the doubles from
//! [`crate::kernel::test_dependencies`].

use std::sync::Arc;

use crate::kernel::{
    BaseConnectivity, BaseCursorStore, BaseEventFeed, BaseEventStore, BaseExchanges,
    BaseGroupActions, BaseGroupRequests, BaseIdentifierStore, BaseOperationStatus,
    BasePendingOperationStore,
};

#[derive(Clone)]
pub struct SyncDeps {
    pub feed: Arc<dyn BaseEventFeed>,
    pub group_requests: Arc<dyn BaseGroupRequests>,
    pub exchanges: Arc<dyn BaseExchanges>,
    pub operations: Arc<dyn BaseOperationStatus>,
    pub connectivity: Arc<dyn BaseConnectivity>,
    pub cursors: Arc<dyn BaseCursorStore>,
    pub events: Arc<dyn BaseEventStore>,
    pub identifiers: Arc<dyn BaseIdentifierStore>,
    pub pending_operations: Arc<dyn BasePendingOperationStore>,
    pub group_actions: Arc<dyn BaseGroupActions>,
}

impl SyncDeps {
    /// Create new SyncDeps with the given dependencies
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        feed: Arc<dyn BaseEventFeed>,
        group_requests: Arc<dyn BaseGroupRequests>,
        exchanges: Arc<dyn BaseExchanges>,
        operations: Arc<dyn BaseOperationStatus>,
        connectivity: Arc<dyn BaseConnectivity>,
        cursors: Arc<dyn BaseCursorStore>,
        events: Arc<dyn BaseEventStore>,
        identifiers: Arc<dyn BaseIdentifierStore>,
        pending_operations: Arc<dyn BasePendingOperationStore>,
        group_actions: Arc<dyn BaseGroupActions>,
    ) -> Self {
        Self {
            feed,
            group_requests,
            exchanges,
            operations,
            connectivity,
            cursors,
            events,
            identifiers,
            pending_operations,
            group_actions,
        }
    }
}
