// Domains: notification feed sync and long-running operation tracking

pub mod notifications;
pub mod operations;
