pub mod activities;
pub mod models;
pub mod queue;

pub use activities::{CompletionCallback, OperationPoller, OperationPollerService, PollSummary};
pub use models::{OperationCompleted, OperationKind, PendingOperation};
pub use queue::OperationQueue;
