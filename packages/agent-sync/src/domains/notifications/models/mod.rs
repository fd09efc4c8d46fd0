pub mod cursor;
pub mod event;
pub mod group;

pub use cursor::SyncCursor;
pub use event::{EventAction, MaterializedEvent, NotificationRoute, RawEvent};
pub use group::{GroupRequest, IdentifierRecord, RoleReply, END_ROLE_ADD_ROUTE};
