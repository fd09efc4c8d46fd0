//! SyncCursor - how far this device has advanced through the feed

use serde::{Deserialize, Serialize};

/// Feed position immediately after the last event this device advanced past.
///
/// Invariant: `next_index == 0` iff `last_event_id` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursor {
    pub next_index: u64,
    pub last_event_id: String,
}

impl SyncCursor {
    /// The position before any event.
    pub fn start() -> Self {
        Self::default()
    }

    pub fn is_start(&self) -> bool {
        self.next_index == 0
    }

    /// Offset of the first item to request.
    ///
    /// Once past the start, the window begins one item early so its first
    /// element (the anchor) can be checked against `last_event_id`.
    pub fn window_start(&self) -> u64 {
        self.next_index.saturating_sub(1)
    }

    /// Whether a fetched window still lines up with this cursor.
    ///
    /// `first_id` is the id of the window's first element, if any.
    pub fn matches_anchor(&self, first_id: Option<&str>) -> bool {
        if self.is_start() {
            return true;
        }
        first_id == Some(self.last_event_id.as_str())
    }

    /// Cursor after processing `count` more events ending at `last_id`.
    pub fn advanced(&self, count: u64, last_id: impl Into<String>) -> Self {
        Self {
            next_index: self.next_index + count,
            last_event_id: last_id.into(),
        }
    }

    /// Repair a persisted cursor that breaks the index/id invariant.
    pub fn normalized(self) -> Self {
        if self.next_index == 0 || self.last_event_id.is_empty() {
            Self::start()
        } else {
            self
        }
    }
}
