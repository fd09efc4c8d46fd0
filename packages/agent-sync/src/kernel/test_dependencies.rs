// TestDependencies - mock implementations for testing
//
// Provides in-memory stores and scripted remote doubles that can be injected
// into SyncDeps for tests.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{
    BaseConnectivity, BaseCursorStore, BaseEventFeed, BaseEventStore, BaseExchanges,
    BaseGroupActions, BaseGroupRequests, BaseIdentifierStore, BaseOperationStatus,
    BasePendingOperationStore, SyncDeps,
};
use crate::common::{GroupRequestError, TransportError};
use crate::domains::notifications::models::{
    EventAction, GroupRequest, IdentifierRecord, MaterializedEvent, RawEvent, RoleReply,
    SyncCursor, END_ROLE_ADD_ROUTE,
};
use crate::domains::notifications::EventCallback;
use crate::domains::operations::models::{OperationCompleted, PendingOperation, RemoteOperation};
use crate::domains::operations::CompletionCallback;

// =============================================================================
// Fixtures
// =============================================================================

/// Build an unconsumed feed event.
pub fn raw_event(id: &str, route: &str, digest: &str) -> RawEvent {
    RawEvent {
        id: id.to_string(),
        occurred_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        consumed: false,
        action: EventAction {
            route: route.to_string(),
            digest: digest.to_string(),
            extra: serde_json::Map::new(),
        },
    }
}

/// Build a group request for `group_id`, optionally granting `endpoint_id`.
pub fn group_request(group_id: &str, granted_endpoint: Option<&str>) -> GroupRequest {
    GroupRequest {
        group_id: Some(group_id.to_string()),
        reply: granted_endpoint.map(|eid| RoleReply {
            route: END_ROLE_ADD_ROUTE.to_string(),
            endpoint_id: eid.to_string(),
        }),
        exchange: serde_json::json!({ "a": { "gid": group_id } }),
    }
}

pub fn identifier(id: &str, name: &str, authorized: &[&str]) -> IdentifierRecord {
    IdentifierRecord {
        id: id.to_string(),
        name: name.to_string(),
        pending: true,
        authorized_endpoint_ids: authorized.iter().map(|s| s.to_string()).collect(),
    }
}

// =============================================================================
// Mock Event Feed
// =============================================================================

/// Remote feed backed by a vector. `list` slices it; `mark_consumed` flips the flag.
pub struct MockEventFeed {
    items: Mutex<Vec<RawEvent>>,
    list_calls: Mutex<Vec<(u64, u64)>>,
    marked: Mutex<Vec<String>>,
    list_failures: AtomicUsize,
    mark_failures: AtomicUsize,
}

impl MockEventFeed {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            list_calls: Mutex::new(Vec::new()),
            marked: Mutex::new(Vec::new()),
            list_failures: AtomicUsize::new(0),
            mark_failures: AtomicUsize::new(0),
        }
    }

    pub fn with_events(self, events: Vec<RawEvent>) -> Self {
        self.items.lock().unwrap().extend(events);
        self
    }

    /// Append an event to the remote feed
    pub fn push(&self, event: RawEvent) {
        self.items.lock().unwrap().push(event);
    }

    /// Delete an event upstream, shifting later offsets
    pub fn remove(&self, id: &str) {
        self.items.lock().unwrap().retain(|e| e.id != id);
    }

    /// Fail the next `n` list calls with a transport error
    pub fn fail_next_lists(&self, n: usize) {
        self.list_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` acknowledgements with a transport error
    pub fn fail_next_marks(&self, n: usize) {
        self.mark_failures.store(n, Ordering::SeqCst);
    }

    pub fn list_calls(&self) -> Vec<(u64, u64)> {
        self.list_calls.lock().unwrap().clone()
    }

    /// Event ids acknowledged, in call order
    pub fn marked(&self) -> Vec<String> {
        self.marked.lock().unwrap().clone()
    }

    pub fn mark_count(&self, id: &str) -> usize {
        self.marked.lock().unwrap().iter().filter(|m| *m == id).count()
    }

    pub fn is_consumed(&self, id: &str) -> bool {
        self.items
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.id == id && e.consumed)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MockEventFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseEventFeed for MockEventFeed {
    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<RawEvent>, TransportError> {
        self.list_calls.lock().unwrap().push((offset, limit));
        if Self::take_failure(&self.list_failures) {
            return Err(TransportError::new("agent unreachable"));
        }

        let items = self.items.lock().unwrap();
        let start = (offset as usize).min(items.len());
        let end = (limit as usize).min(items.len()).max(start);
        Ok(items[start..end].to_vec())
    }

    async fn mark_consumed(&self, event_id: &str) -> Result<(), TransportError> {
        if Self::take_failure(&self.mark_failures) {
            return Err(TransportError::new("agent unreachable"));
        }

        self.marked.lock().unwrap().push(event_id.to_string());
        if let Some(event) = self
            .items
            .lock()
            .unwrap()
            .iter_mut()
            .find(|e| e.id == event_id)
        {
            event.consumed = true;
        }
        Ok(())
    }
}

// =============================================================================
// Mock Group Requests
// =============================================================================

/// Group requests by digest. Unknown digests are `NotFound`.
pub struct MockGroupRequests {
    responses: Mutex<HashMap<String, Result<GroupRequest, GroupRequestError>>>,
    calls: Mutex<Vec<String>>,
}

impl MockGroupRequests {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_request(self, digest: &str, request: GroupRequest) -> Self {
        self.set(digest, Ok(request));
        self
    }

    pub fn set(&self, digest: &str, response: Result<GroupRequest, GroupRequestError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(digest.to_string(), response);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockGroupRequests {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseGroupRequests for MockGroupRequests {
    async fn get_by_digest(&self, digest: &str) -> Result<GroupRequest, GroupRequestError> {
        self.calls.lock().unwrap().push(digest.to_string());
        self.responses
            .lock()
            .unwrap()
            .get(digest)
            .cloned()
            .unwrap_or_else(|| {
                Err(GroupRequestError::NotFound {
                    digest: digest.to_string(),
                })
            })
    }
}

// =============================================================================
// Mock Exchanges
// =============================================================================

pub struct MockExchanges {
    senders: Mutex<HashMap<String, String>>,
}

impl MockExchanges {
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_sender(self, digest: &str, sender: &str) -> Self {
        self.senders
            .lock()
            .unwrap()
            .insert(digest.to_string(), sender.to_string());
        self
    }
}

impl Default for MockExchanges {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseExchanges for MockExchanges {
    async fn sender_of(&self, digest: &str) -> Result<String> {
        self.senders
            .lock()
            .unwrap()
            .get(digest)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("exchange not found: {}", digest))
    }
}

// =============================================================================
// Mock Operation Status
// =============================================================================

/// Scripted operation statuses. Each call pops the next scripted response;
/// the last one repeats. Unscripted operations are never done.
pub struct MockOperationStatus {
    scripts: Mutex<HashMap<String, VecDeque<Result<bool, TransportError>>>>,
    calls: Mutex<Vec<String>>,
}

impl MockOperationStatus {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Script `done` flags for consecutive polls of `operation_id`
    pub fn script(&self, operation_id: &str, done: &[bool]) {
        self.scripts.lock().unwrap().insert(
            operation_id.to_string(),
            done.iter().map(|d| Ok(*d)).collect(),
        );
    }

    /// Make the next poll of `operation_id` fail before the scripted responses
    pub fn fail_next(&self, operation_id: &str) {
        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts.entry(operation_id.to_string()).or_default();
        if script.is_empty() {
            script.push_back(Ok(false));
        }
        script.push_front(Err(TransportError::new("agent unreachable")));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, operation_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| *c == operation_id)
            .count()
    }
}

impl Default for MockOperationStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseOperationStatus for MockOperationStatus {
    async fn get(&self, operation_id: &str) -> Result<RemoteOperation, TransportError> {
        self.calls.lock().unwrap().push(operation_id.to_string());

        let mut scripts = self.scripts.lock().unwrap();
        let next = match scripts.get_mut(operation_id) {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().cloned(),
            None => None,
        };

        next.unwrap_or(Ok(false)).map(|done| RemoteOperation {
            name: operation_id.to_string(),
            done,
        })
    }
}

// =============================================================================
// Mock Connectivity
// =============================================================================

pub struct MockConnectivity {
    online: AtomicBool,
    logged_in: AtomicBool,
    reconnects: AtomicUsize,
    reconnect_delay: Mutex<Option<Duration>>,
}

impl MockConnectivity {
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
            logged_in: AtomicBool::new(true),
            reconnects: AtomicUsize::new(0),
            reconnect_delay: Mutex::new(None),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        self.logged_in.store(logged_in, Ordering::SeqCst);
    }

    /// Make `reconnect` block for `delay`
    pub fn set_reconnect_delay(&self, delay: Duration) {
        *self.reconnect_delay.lock().unwrap() = Some(delay);
    }

    pub fn reconnect_count(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }
}

impl Default for MockConnectivity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseConnectivity for MockConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    async fn reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        let delay = *self.reconnect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

// =============================================================================
// In-Memory Cursor Store
// =============================================================================

pub struct InMemoryCursorStore {
    cursors: Mutex<HashMap<String, SyncCursor>>,
    puts: AtomicUsize,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self {
            cursors: Mutex::new(HashMap::new()),
            puts: AtomicUsize::new(0),
        }
    }

    pub fn with_cursor(self, key: &str, cursor: SyncCursor) -> Self {
        self.cursors
            .lock()
            .unwrap()
            .insert(key.to_string(), cursor);
        self
    }

    /// Overwrite a stored cursor without counting it as a put
    pub fn set(&self, key: &str, cursor: SyncCursor) {
        self.cursors
            .lock()
            .unwrap()
            .insert(key.to_string(), cursor);
    }

    pub fn current(&self, key: &str) -> Option<SyncCursor> {
        self.cursors.lock().unwrap().get(key).cloned()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryCursorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseCursorStore for InMemoryCursorStore {
    async fn get(&self, key: &str) -> Result<Option<SyncCursor>> {
        Ok(self.current(key))
    }

    async fn put(&self, key: &str, cursor: &SyncCursor) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.cursors
            .lock()
            .unwrap()
            .insert(key.to_string(), cursor.clone());
        Ok(())
    }
}

// =============================================================================
// In-Memory Event Store
// =============================================================================

pub struct InMemoryEventStore {
    events: Mutex<Vec<MaterializedEvent>>,
    fail_saves: AtomicUsize,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_saves: AtomicUsize::new(0),
        }
    }

    pub fn with_event(self, event: MaterializedEvent) -> Self {
        self.events.lock().unwrap().push(event);
        self
    }

    /// Fail the next `n` saves
    pub fn fail_next_saves(&self, n: usize) {
        self.fail_saves.store(n, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.id.clone())
            .collect()
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseEventStore for InMemoryEventStore {
    async fn save(&self, event: &MaterializedEvent) -> Result<()> {
        if MockEventFeed::take_failure(&self.fail_saves) {
            anyhow::bail!("disk full");
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<MaterializedEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == id)
            .cloned())
    }

    async fn find_by_correlation(&self, correlation_id: &str) -> Result<Vec<MaterializedEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.correlation_id.as_deref() == Some(correlation_id))
            .cloned()
            .collect())
    }

    async fn update(&self, event: &MaterializedEvent) -> Result<()> {
        let mut events = self.events.lock().unwrap();
        match events.iter_mut().find(|e| e.id == event.id) {
            Some(existing) => {
                *existing = event.clone();
                Ok(())
            }
            None => anyhow::bail!("no event with id {}", event.id),
        }
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        self.events.lock().unwrap().retain(|e| e.id != id);
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<MaterializedEvent>> {
        Ok(self.events.lock().unwrap().clone())
    }
}

// =============================================================================
// In-Memory Identifier Store
// =============================================================================

pub struct InMemoryIdentifierStore {
    identifiers: Mutex<HashMap<String, IdentifierRecord>>,
    fail_updates: AtomicUsize,
}

impl InMemoryIdentifierStore {
    pub fn new() -> Self {
        Self {
            identifiers: Mutex::new(HashMap::new()),
            fail_updates: AtomicUsize::new(0),
        }
    }

    pub fn with_identifier(self, record: IdentifierRecord) -> Self {
        self.identifiers
            .lock()
            .unwrap()
            .insert(record.id.clone(), record);
        self
    }

    pub fn insert(&self, record: IdentifierRecord) {
        self.identifiers
            .lock()
            .unwrap()
            .insert(record.id.clone(), record);
    }

    pub fn fail_next_updates(&self, n: usize) {
        self.fail_updates.store(n, Ordering::SeqCst);
    }

    pub fn record(&self, id: &str) -> Option<IdentifierRecord> {
        self.identifiers.lock().unwrap().get(id).cloned()
    }
}

impl Default for InMemoryIdentifierStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseIdentifierStore for InMemoryIdentifierStore {
    async fn get(&self, id: &str) -> Result<Option<IdentifierRecord>> {
        Ok(self.record(id))
    }

    async fn set_pending(&self, id: &str, pending: bool) -> Result<()> {
        if MockEventFeed::take_failure(&self.fail_updates) {
            anyhow::bail!("identifier store unavailable");
        }
        match self.identifiers.lock().unwrap().get_mut(id) {
            Some(record) => {
                record.pending = pending;
                Ok(())
            }
            None => anyhow::bail!("identifier not found: {}", id),
        }
    }
}

// =============================================================================
// In-Memory Pending Operation Store
// =============================================================================

pub struct InMemoryPendingOperationStore {
    operations: Mutex<Vec<PendingOperation>>,
    fail_deletes: AtomicUsize,
}

impl InMemoryPendingOperationStore {
    pub fn new() -> Self {
        Self {
            operations: Mutex::new(Vec::new()),
            fail_deletes: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_deletes(&self, n: usize) {
        self.fail_deletes.store(n, Ordering::SeqCst);
    }

    pub fn with_operation(self, operation: PendingOperation) -> Self {
        self.operations.lock().unwrap().push(operation);
        self
    }

    pub fn ids(&self) -> Vec<String> {
        self.operations
            .lock()
            .unwrap()
            .iter()
            .map(|o| o.operation_id.clone())
            .collect()
    }

    pub fn contains(&self, operation_id: &str) -> bool {
        self.ids().iter().any(|id| id == operation_id)
    }
}

impl Default for InMemoryPendingOperationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BasePendingOperationStore for InMemoryPendingOperationStore {
    async fn get_all(&self) -> Result<Vec<PendingOperation>> {
        Ok(self.operations.lock().unwrap().clone())
    }

    async fn save(&self, operation: &PendingOperation) -> Result<()> {
        let mut operations = self.operations.lock().unwrap();
        if !operations
            .iter()
            .any(|o| o.operation_id == operation.operation_id)
        {
            operations.push(operation.clone());
        }
        Ok(())
    }

    async fn delete_by_id(&self, operation_id: &str) -> Result<()> {
        if MockEventFeed::take_failure(&self.fail_deletes) {
            anyhow::bail!("pending operation store unavailable");
        }
        self.operations
            .lock()
            .unwrap()
            .retain(|o| o.operation_id != operation_id);
        Ok(())
    }
}

// =============================================================================
// Mock Group Actions
// =============================================================================

/// Records group actions. Failed calls are counted as attempts but not recorded.
pub struct MockGroupActions {
    joined: Mutex<Vec<GroupRequest>>,
    started: Mutex<Vec<String>>,
    join_attempts: AtomicUsize,
    start_attempts: AtomicUsize,
    join_failures: AtomicUsize,
    start_failures: AtomicUsize,
}

impl MockGroupActions {
    pub fn new() -> Self {
        Self {
            joined: Mutex::new(Vec::new()),
            started: Mutex::new(Vec::new()),
            join_attempts: AtomicUsize::new(0),
            start_attempts: AtomicUsize::new(0),
            join_failures: AtomicUsize::new(0),
            start_failures: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_joins(&self, n: usize) {
        self.join_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_starts(&self, n: usize) {
        self.start_failures.store(n, Ordering::SeqCst);
    }

    pub fn joined(&self) -> Vec<GroupRequest> {
        self.joined.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn join_attempts(&self) -> usize {
        self.join_attempts.load(Ordering::SeqCst)
    }

    pub fn start_attempts(&self) -> usize {
        self.start_attempts.load(Ordering::SeqCst)
    }

    /// Wait for `count` role authorizations to start (they run on spawned tasks)
    pub async fn wait_for_started(&self, count: usize) -> Vec<String> {
        for _ in 0..200 {
            if self.started.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.started()
    }

    /// Wait for `count` start calls, failed or not
    pub async fn wait_for_start_attempts(&self, count: usize) -> usize {
        for _ in 0..200 {
            if self.start_attempts() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.start_attempts()
    }
}

impl Default for MockGroupActions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseGroupActions for MockGroupActions {
    async fn join_role_authorization(&self, request: &GroupRequest) -> Result<()> {
        self.join_attempts.fetch_add(1, Ordering::SeqCst);
        if MockEventFeed::take_failure(&self.join_failures) {
            anyhow::bail!("role authorization join rejected");
        }
        self.joined.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn start_role_authorization(&self, group_name: &str) -> Result<()> {
        self.start_attempts.fetch_add(1, Ordering::SeqCst);
        if MockEventFeed::take_failure(&self.start_failures) {
            anyhow::bail!("role authorization start rejected");
        }
        self.started.lock().unwrap().push(group_name.to_string());
        Ok(())
    }
}

// =============================================================================
// Callback Recorders
// =============================================================================

/// Collects events passed to an [`EventCallback`].
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<MaterializedEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> EventCallback {
        let events = self.events.clone();
        Arc::new(move |event| events.lock().unwrap().push(event))
    }

    pub fn events(&self) -> Vec<MaterializedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.id).collect()
    }
}

/// Collects completions passed to a [`CompletionCallback`].
#[derive(Clone, Default)]
pub struct CompletionRecorder {
    completed: Arc<Mutex<Vec<OperationCompleted>>>,
}

impl CompletionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> CompletionCallback {
        let completed = self.completed.clone();
        Arc::new(move |done| completed.lock().unwrap().push(done))
    }

    pub fn completed(&self) -> Vec<OperationCompleted> {
        self.completed.lock().unwrap().clone()
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Concrete doubles plus the [`SyncDeps`] built from them.
#[derive(Clone)]
pub struct TestDependencies {
    pub feed: Arc<MockEventFeed>,
    pub group_requests: Arc<MockGroupRequests>,
    pub exchanges: Arc<MockExchanges>,
    pub operations: Arc<MockOperationStatus>,
    pub connectivity: Arc<MockConnectivity>,
    pub cursors: Arc<InMemoryCursorStore>,
    pub events: Arc<InMemoryEventStore>,
    pub identifiers: Arc<InMemoryIdentifierStore>,
    pub pending_operations: Arc<InMemoryPendingOperationStore>,
    pub group_actions: Arc<MockGroupActions>,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            feed: Arc::new(MockEventFeed::new()),
            group_requests: Arc::new(MockGroupRequests::new()),
            exchanges: Arc::new(MockExchanges::new()),
            operations: Arc::new(MockOperationStatus::new()),
            connectivity: Arc::new(MockConnectivity::new()),
            cursors: Arc::new(InMemoryCursorStore::new()),
            events: Arc::new(InMemoryEventStore::new()),
            identifiers: Arc::new(InMemoryIdentifierStore::new()),
            pending_operations: Arc::new(InMemoryPendingOperationStore::new()),
            group_actions: Arc::new(MockGroupActions::new()),
        }
    }

    pub fn with_feed(mut self, feed: MockEventFeed) -> Self {
        self.feed = Arc::new(feed);
        self
    }

    pub fn with_group_requests(mut self, group_requests: MockGroupRequests) -> Self {
        self.group_requests = Arc::new(group_requests);
        self
    }

    pub fn with_exchanges(mut self, exchanges: MockExchanges) -> Self {
        self.exchanges = Arc::new(exchanges);
        self
    }

    pub fn with_cursors(mut self, cursors: InMemoryCursorStore) -> Self {
        self.cursors = Arc::new(cursors);
        self
    }

    pub fn with_events(mut self, events: InMemoryEventStore) -> Self {
        self.events = Arc::new(events);
        self
    }

    pub fn with_identifiers(mut self, identifiers: InMemoryIdentifierStore) -> Self {
        self.identifiers = Arc::new(identifiers);
        self
    }

    pub fn with_pending_operations(mut self, store: InMemoryPendingOperationStore) -> Self {
        self.pending_operations = Arc::new(store);
        self
    }

    /// Build SyncDeps backed by these doubles
    pub fn deps(&self) -> SyncDeps {
        SyncDeps::new(
            self.feed.clone(),
            self.group_requests.clone(),
            self.exchanges.clone(),
            self.operations.clone(),
            self.connectivity.clone(),
            self.cursors.clone(),
            self.events.clone(),
            self.identifiers.clone(),
            self.pending_operations.clone(),
            self.group_actions.clone(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
