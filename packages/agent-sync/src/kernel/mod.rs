//! Kernel module - sync infrastructure and dependencies.

pub mod deps;
pub mod service_host;
pub mod test_dependencies;
pub mod traits;

pub use deps::SyncDeps;
pub use service_host::{Service, ServiceHandle, ServiceHost};
pub use test_dependencies::TestDependencies;
pub use traits::*;
