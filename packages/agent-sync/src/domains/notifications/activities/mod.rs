pub mod feed_sync;
pub mod inbox;
pub mod router;

pub use feed_sync::{FeedState, FeedSync, FeedSyncService, StepOutcome};
pub use inbox::NotificationInbox;
pub use router::{Disposition, EventCallback, EventRouter};
