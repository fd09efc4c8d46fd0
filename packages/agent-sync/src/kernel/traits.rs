// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Routing and polling logic lives in the domains and is written against these traits.
//
// Naming convention: Base* for trait names (e.g., BaseEventFeed, BaseCursorStore)

use anyhow::Result;
use async_trait::async_trait;

use crate::common::{GroupRequestError, TransportError};
use crate::domains::notifications::models::{
    GroupRequest, IdentifierRecord, MaterializedEvent, RawEvent, SyncCursor,
};
use crate::domains::operations::models::{PendingOperation, RemoteOperation};

// =============================================================================
// Remote Agent Traits
// =============================================================================

#[async_trait]
pub trait BaseEventFeed: Send + Sync {
    /// Feed items in `[offset, limit)`, in feed order
    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<RawEvent>, TransportError>;

    /// Acknowledge an event. Idempotent on the agent.
    async fn mark_consumed(&self, event_id: &str) -> Result<(), TransportError>;
}

#[async_trait]
pub trait BaseGroupRequests: Send + Sync {
    /// Look up the group request referenced by an event digest
    async fn get_by_digest(&self, digest: &str) -> Result<GroupRequest, GroupRequestError>;
}

#[async_trait]
pub trait BaseExchanges: Send + Sync {
    /// Identifier that sent the exchange message with this digest
    async fn sender_of(&self, digest: &str) -> Result<String>;
}

#[async_trait]
pub trait BaseOperationStatus: Send + Sync {
    async fn get(&self, operation_id: &str) -> Result<RemoteOperation, TransportError>;
}

// =============================================================================
// Connectivity Trait
// =============================================================================

#[async_trait]
pub trait BaseConnectivity: Send + Sync {
    fn is_online(&self) -> bool;

    fn is_logged_in(&self) -> bool;

    /// Block until the agent connection is re-established.
    ///
    /// Implementations serialize concurrent callers so only one reconnect is in flight.
    async fn reconnect(&self);
}

// =============================================================================
// Local Store Traits
// =============================================================================

#[async_trait]
pub trait BaseCursorStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<SyncCursor>>;

    async fn put(&self, key: &str, cursor: &SyncCursor) -> Result<()>;
}

#[async_trait]
pub trait BaseEventStore: Send + Sync {
    async fn save(&self, event: &MaterializedEvent) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<MaterializedEvent>>;

    async fn find_by_correlation(&self, correlation_id: &str) -> Result<Vec<MaterializedEvent>>;

    async fn update(&self, event: &MaterializedEvent) -> Result<()>;

    async fn delete_by_id(&self, id: &str) -> Result<()>;

    async fn get_all(&self) -> Result<Vec<MaterializedEvent>>;
}

#[async_trait]
pub trait BaseIdentifierStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<IdentifierRecord>>;

    async fn set_pending(&self, id: &str, pending: bool) -> Result<()>;
}

#[async_trait]
pub trait BasePendingOperationStore: Send + Sync {
    async fn get_all(&self) -> Result<Vec<PendingOperation>>;

    async fn save(&self, operation: &PendingOperation) -> Result<()>;

    async fn delete_by_id(&self, operation_id: &str) -> Result<()>;
}

// =============================================================================
// Group Domain Actions
// =============================================================================

/// Side effects on group identifiers. Both must be idempotent: the loops
/// guarantee at-least-once invocation, not exactly-once.
#[async_trait]
pub trait BaseGroupActions: Send + Sync {
    /// Join another member's endpoint-role authorization for a group
    async fn join_role_authorization(&self, request: &GroupRequest) -> Result<()>;

    /// Start endpoint-role authorization for a newly formed group
    async fn start_role_authorization(&self, group_name: &str) -> Result<()>;
}
