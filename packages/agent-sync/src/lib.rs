//! # agent-sync
//!
//! Keeps a local store consistent with the notification feed of a remote
//! identity agent, and tracks long-running operations issued against that
//! same agent until they complete.
//!
//! ## Architecture
//!
//! ```text
//! FeedSync (loop)                         OperationPoller (loop)
//!     │                                       │
//!     ├─► BaseConnectivity (online? login?)   ├─► BaseConnectivity (online?)
//!     ├─► BaseEventFeed.list(window)          ├─► BaseOperationStatus.get(op)
//!     ├─► EventRouter.route(event)            ├─► BaseIdentifierStore.set_pending
//!     │       ├─► BaseEventStore.save         ├─► BaseGroupActions (group formation)
//!     │       ├─► on_new_event callback       ├─► on_complete callback
//!     │       └─► BaseEventFeed.mark_consumed └─► BasePendingOperationStore.delete_by_id
//!     └─► BaseCursorStore.put(cursor)
//! ```
//!
//! Both loops run as [`Service`]s and stop when their cancellation token fires.
//! Every external collaborator sits behind a `Base*` trait in [`kernel`] so the
//! loops can be driven by the doubles in [`kernel::test_dependencies`].

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod telemetry;

pub use common::{GroupRequestError, SyncError, TransportError};
pub use config::SyncConfig;
pub use domains::notifications::{
    EventCallback, EventRouter, FeedSync, NotificationInbox, StepOutcome,
};
pub use domains::operations::{CompletionCallback, OperationPoller, OperationQueue};
pub use kernel::{Service, ServiceHandle, ServiceHost, SyncDeps};
