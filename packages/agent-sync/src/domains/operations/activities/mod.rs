pub mod poller;

pub use poller::{CompletionCallback, OperationPoller, OperationPollerService, PollSummary};
