//! Notification feed synchronization.
//!
//! `FeedSync` is a long-running loop that:
//! - Waits while logged out or offline (no feed calls)
//! - Fetches a fixed-size window starting one item before the cursor
//! - Checks the window's first item against the cursor to detect upstream deletions
//! - Routes each new event in feed order via [`EventRouter`]
//! - Persists the advanced cursor
//!
//! # Cursor
//!
//! ```text
//! feed:    E1  E2  E3  E4  E5 | E6  E7  ...
//!                          ^    ^
//!            last_event_id=E5   next_index=5
//!
//! window = list(4, 4 + window_size) = [E5, E6, E7, ...]
//!           E5 must match last_event_id, otherwise the cursor resets to {0, ""}
//! ```
//!
//! # Failures
//!
//! A failed fetch triggers a reconnect (if the gate still reports online) and
//! the iteration is retried without moving the cursor. A failed route does not
//! stop the batch. A transient failure holds the cursor at that event, so the
//! next window starts from it again, including after a restart. Events after
//! it that routed cleanly are remembered and skipped on the reread until the
//! cursor moves past them. Non-transient failures are logged and passed over.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::SyncConfig;
use crate::domains::notifications::activities::router::{EventCallback, EventRouter};
use crate::domains::notifications::models::SyncCursor;
use crate::kernel::service_host::pause;
use crate::kernel::{Service, ServiceHandle, SyncDeps};

/// Result of a single sync iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    NotLoggedIn,
    Offline,
    /// Window fetch failed; cursor unchanged
    FetchFailed,
    /// Feed no longer lines up with the cursor; cursor reset to the start
    CursorReset,
    /// Events were routed and the cursor advanced past `processed` of them
    Advanced { processed: usize, failed: usize },
    /// The first new event failed transiently; the cursor stays put
    Held { event_id: String, failed: usize },
    /// No new events
    Idle,
    Cancelled,
}

/// In-memory loop state: the cursor plus events past a held event that
/// already routed cleanly.
pub struct FeedState {
    cursor: SyncCursor,
    settled: HashSet<String>,
}

impl FeedState {
    pub fn new(cursor: SyncCursor) -> Self {
        Self {
            cursor,
            settled: HashSet::new(),
        }
    }

    pub fn cursor(&self) -> &SyncCursor {
        &self.cursor
    }

    /// Whether `event_id` routed cleanly behind a held event
    pub fn is_settled(&self, event_id: &str) -> bool {
        self.settled.contains(event_id)
    }
}

#[derive(Clone)]
pub struct FeedSync {
    deps: SyncDeps,
    router: Arc<EventRouter>,
    config: SyncConfig,
}

impl FeedSync {
    pub fn new(deps: SyncDeps, config: SyncConfig) -> Self {
        Self {
            router: Arc::new(EventRouter::new(deps.clone())),
            deps,
            config,
        }
    }

    /// Spawn the loop; `ServiceHandle::stop` ends it.
    pub fn start(self, on_new_event: EventCallback) -> ServiceHandle {
        ServiceHandle::spawn(Box::new(self.into_service(on_new_event)))
    }

    pub fn into_service(self, on_new_event: EventCallback) -> FeedSyncService {
        FeedSyncService {
            sync: self,
            on_new_event,
        }
    }

    /// Load the persisted cursor, creating it at the start on first run.
    pub async fn load_state(&self) -> Result<FeedState> {
        let key = &self.config.cursor_key;
        let cursor = match self.deps.cursors.get(key).await? {
            Some(cursor) => cursor.normalized(),
            None => {
                let cursor = SyncCursor::start();
                self.deps.cursors.put(key, &cursor).await?;
                cursor
            }
        };
        Ok(FeedState::new(cursor))
    }

    /// Run one iteration against `state`. Does not sleep; the caller decides
    /// how long to wait based on the outcome.
    pub async fn step(
        &self,
        state: &mut FeedState,
        on_new_event: &EventCallback,
        shutdown: &CancellationToken,
    ) -> StepOutcome {
        let connectivity = &self.deps.connectivity;
        if !connectivity.is_logged_in() {
            return StepOutcome::NotLoggedIn;
        }
        if !connectivity.is_online() {
            return StepOutcome::Offline;
        }

        let offset = state.cursor.window_start();
        let window = match self
            .deps
            .feed
            .list(offset, offset + self.config.window_size)
            .await
        {
            Ok(window) => window,
            Err(e) => {
                warn!(offset, error = %e, "failed to fetch notification window");
                // The gate may already have gone offline and started its own reconnect
                if connectivity.is_online() {
                    tokio::select! {
                        _ = shutdown.cancelled() => return StepOutcome::Cancelled,
                        _ = connectivity.reconnect() => {}
                    }
                }
                return StepOutcome::FetchFailed;
            }
        };

        if !state
            .cursor
            .matches_anchor(window.first().map(|e| e.id.as_str()))
        {
            info!(
                next_index = state.cursor.next_index,
                last_event_id = %state.cursor.last_event_id,
                window_len = window.len(),
                "feed changed beneath cursor, rescanning from start"
            );
            *state = FeedState::new(SyncCursor::start());
            self.persist(&state.cursor).await;
            return StepOutcome::CursorReset;
        }

        let new_events = if state.cursor.is_start() {
            &window[..]
        } else {
            &window[1..]
        };

        let mut failed = 0;
        let mut held: Option<usize> = None;
        for (index, event) in new_events.iter().enumerate() {
            if state.settled.contains(&event.id) {
                trace!(event_id = %event.id, "event settled on an earlier pass");
                continue;
            }

            match self.router.route(event, on_new_event).await {
                Ok(disposition) => {
                    trace!(event_id = %event.id, ?disposition, "event routed");
                    if held.is_some() {
                        state.settled.insert(event.id.clone());
                    }
                }
                Err(e) => {
                    failed += 1;
                    warn!(event_id = %event.id, transient = e.is_transient(), error = %e, "failed to route event");
                    if e.is_transient() && held.is_none() {
                        held = Some(index);
                    }
                }
            }
        }

        if new_events.is_empty() {
            return StepOutcome::Idle;
        }

        let processed = held.unwrap_or(new_events.len());
        if let Some(index) = held {
            info!(
                event_id = %new_events[index].id,
                next_index = state.cursor.next_index + index as u64,
                "holding cursor at failed event"
            );
        }
        for event in &new_events[..processed] {
            state.settled.remove(&event.id);
        }

        let Some(last) = processed.checked_sub(1).map(|i| &new_events[i]) else {
            return StepOutcome::Held {
                event_id: new_events[0].id.clone(),
                failed,
            };
        };

        state.cursor = state.cursor.advanced(processed as u64, &last.id);
        self.persist(&state.cursor).await;
        debug!(
            next_index = state.cursor.next_index,
            processed,
            failed,
            "cursor advanced"
        );

        StepOutcome::Advanced { processed, failed }
    }

    async fn persist(&self, cursor: &SyncCursor) {
        if let Err(e) = self.deps.cursors.put(&self.config.cursor_key, cursor).await {
            error!(next_index = cursor.next_index, error = %e, "failed to persist sync cursor");
        }
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(&self, on_new_event: EventCallback, shutdown: CancellationToken) -> Result<()> {
        info!(
            window_size = self.config.window_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "notification sync starting"
        );

        let mut state = loop {
            match self.load_state().await {
                Ok(state) => break state,
                Err(e) => {
                    error!(error = %e, "failed to load sync cursor");
                    if !pause(&shutdown, self.config.poll_interval).await {
                        return Ok(());
                    }
                }
            }
        };

        while !shutdown.is_cancelled() {
            let outcome = self.step(&mut state, &on_new_event, &shutdown).await;
            trace!(?outcome, "sync iteration");

            let wait = match outcome {
                StepOutcome::NotLoggedIn => Some(self.config.login_poll_interval),
                StepOutcome::Offline | StepOutcome::Idle | StepOutcome::Held { .. } => {
                    Some(self.config.poll_interval)
                }
                StepOutcome::FetchFailed
                | StepOutcome::CursorReset
                | StepOutcome::Advanced { .. } => None,
                StepOutcome::Cancelled => break,
            };

            match wait {
                Some(interval) => {
                    if !pause(&shutdown, interval).await {
                        break;
                    }
                }
                None => tokio::task::yield_now().await,
            }
        }

        info!(
            next_index = state.cursor.next_index,
            "notification sync stopped"
        );
        Ok(())
    }
}

// =============================================================================
// Service
// =============================================================================

pub struct FeedSyncService {
    sync: FeedSync,
    on_new_event: EventCallback,
}

#[async_trait]
impl Service for FeedSyncService {
    fn name(&self) -> &'static str {
        "notification-sync"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        self.sync.run(self.on_new_event.clone(), shutdown).await
    }
}
