// Common types shared by the notification and operation domains

pub mod errors;

pub use errors::{GroupRequestError, SyncError, TransportError};
