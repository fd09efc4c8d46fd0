pub mod pending_operation;

pub use pending_operation::{OperationCompleted, OperationKind, PendingOperation, RemoteOperation};
