pub mod activities;
pub mod models;

pub use activities::{
    Disposition, EventCallback, EventRouter, FeedState, FeedSync, FeedSyncService,
    NotificationInbox, StepOutcome,
};
pub use models::{MaterializedEvent, NotificationRoute, RawEvent, SyncCursor};
