//! Long-running operation poller.
//!
//! Operations issued against the agent (group formation, witness assignment)
//! finish asynchronously. The poller keeps them in an [`OperationQueue`] and
//! asks the agent for each one's status every `operation_poll_interval`:
//!
//! ```text
//! offline ──► skip the pass (no status calls)
//!
//! for op in queue:
//!     get(op) ── error ──► reconnect (if still online), next op
//!        │
//!        ├── not done ──► stays queued
//!        │
//!        └── done ──► identifier.pending = false
//!                     group formation: start role authorization (spawned)
//!                     on_complete(entity, kind)
//!                     delete from store, remove from queue
//! ```
//!
//! The queue is also persisted through [`BasePendingOperationStore`] so
//! operations survive a restart; [`OperationPoller::load_pending`] merges them
//! back in at startup.
//!
//! [`BasePendingOperationStore`]: crate::kernel::BasePendingOperationStore

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::domains::operations::models::{OperationCompleted, OperationKind, PendingOperation};
use crate::domains::operations::queue::OperationQueue;
use crate::kernel::service_host::pause;
use crate::kernel::{Service, ServiceHandle, SyncDeps};

/// Called once per completed operation.
pub type CompletionCallback = Arc<dyn Fn(OperationCompleted) + Send + Sync>;

/// Counts for a single pass over the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Pass skipped because the agent is offline
    pub offline: bool,
    pub checked: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct OperationPoller {
    deps: SyncDeps,
    queue: Arc<OperationQueue>,
    config: SyncConfig,
}

impl OperationPoller {
    pub fn new(deps: SyncDeps, config: SyncConfig) -> Self {
        Self {
            deps,
            queue: Arc::new(OperationQueue::new()),
            config,
        }
    }

    pub fn queue(&self) -> &Arc<OperationQueue> {
        &self.queue
    }

    /// Watch `operation` from the next pass on. Safe to call while a pass is running.
    pub fn enqueue(&self, operation: PendingOperation) {
        if self.queue.push(operation.clone()) {
            debug!(operation_id = %operation.operation_id, "operation queued");
        }
    }

    /// Persist `operation` and start watching it.
    pub async fn track(&self, operation: PendingOperation) -> Result<()> {
        self.deps
            .pending_operations
            .save(&operation)
            .await
            .with_context(|| format!("Failed to persist operation {}", operation.operation_id))?;
        self.enqueue(operation);
        Ok(())
    }

    /// Merge persisted operations into the queue. Returns how many were added.
    pub async fn load_pending(&self) -> Result<usize> {
        let stored = self
            .deps
            .pending_operations
            .get_all()
            .await
            .context("Failed to load pending operations")?;
        Ok(self.queue.extend(stored))
    }

    /// Check every queued operation once.
    pub async fn poll_once(
        &self,
        on_complete: &CompletionCallback,
        shutdown: &CancellationToken,
    ) -> PollSummary {
        let connectivity = &self.deps.connectivity;
        if !connectivity.is_online() {
            return PollSummary {
                offline: true,
                ..Default::default()
            };
        }

        let mut summary = PollSummary::default();
        for operation in self.queue.snapshot() {
            if shutdown.is_cancelled() {
                break;
            }
            summary.checked += 1;

            let status = match self.deps.operations.get(&operation.operation_id).await {
                Ok(status) => status,
                Err(e) => {
                    summary.failed += 1;
                    warn!(operation_id = %operation.operation_id, error = %e, "failed to fetch operation status");
                    if connectivity.is_online() {
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = connectivity.reconnect() => {}
                        }
                    }
                    continue;
                }
            };

            if !status.done {
                continue;
            }

            match self.complete(&operation, on_complete).await {
                Ok(()) => summary.completed += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(operation_id = %operation.operation_id, error = %e, "failed to complete operation");
                }
            }
        }

        summary
    }

    async fn complete(
        &self,
        operation: &PendingOperation,
        on_complete: &CompletionCallback,
    ) -> Result<()> {
        let entity_id = &operation.local_entity_id;

        self.deps
            .identifiers
            .set_pending(entity_id, false)
            .await
            .with_context(|| format!("Failed to clear pending flag on {}", entity_id))?;

        if operation.kind == OperationKind::GroupFormation {
            self.spawn_role_authorization(entity_id.clone());
        }

        on_complete(OperationCompleted {
            entity_id: entity_id.clone(),
            kind: operation.kind,
        });

        // The entry stays queued if this fails, so the callback fires again on
        // the next pass. Completion is at-least-once.
        self.deps
            .pending_operations
            .delete_by_id(&operation.operation_id)
            .await
            .with_context(|| format!("Failed to delete operation {}", operation.operation_id))?;
        self.queue.remove(&operation.operation_id);

        info!(operation_id = %operation.operation_id, kind = %operation.kind, "operation completed");
        Ok(())
    }

    /// Kick off endpoint-role authorization for a newly formed group without
    /// holding up the rest of the pass.
    fn spawn_role_authorization(&self, group_id: String) {
        let identifiers = self.deps.identifiers.clone();
        let group_actions = self.deps.group_actions.clone();

        tokio::spawn(async move {
            let name = match identifiers.get(&group_id).await {
                Ok(Some(record)) => record.name,
                Ok(None) => {
                    warn!(group_id = %group_id, "formed group missing locally, skipping role authorization");
                    return;
                }
                Err(e) => {
                    error!(group_id = %group_id, error = %e, "failed to load formed group");
                    return;
                }
            };

            if let Err(e) = group_actions.start_role_authorization(&name).await {
                error!(group_id = %group_id, error = %e, "failed to start role authorization");
            }
        });
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(&self, on_complete: CompletionCallback, shutdown: CancellationToken) -> Result<()> {
        let interval = self.config.operation_poll_interval;
        info!(
            poll_interval_ms = interval.as_millis() as u64,
            "operation poller starting"
        );

        loop {
            match self.load_pending().await {
                Ok(added) => {
                    info!(added, queued = self.queue.len(), "pending operations loaded");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "failed to load pending operations");
                    if !pause(&shutdown, interval).await {
                        return Ok(());
                    }
                }
            }
        }

        while !shutdown.is_cancelled() {
            let summary = self.poll_once(&on_complete, &shutdown).await;
            if summary.completed > 0 || summary.failed > 0 {
                debug!(?summary, "operation poll pass");
            }

            if !pause(&shutdown, interval).await {
                break;
            }
        }

        info!(queued = self.queue.len(), "operation poller stopped");
        Ok(())
    }

    /// Spawn the loop; `ServiceHandle::stop` ends it.
    pub fn start(self, on_complete: CompletionCallback) -> ServiceHandle {
        ServiceHandle::spawn(Box::new(self.into_service(on_complete)))
    }

    pub fn into_service(self, on_complete: CompletionCallback) -> OperationPollerService {
        OperationPollerService {
            poller: self,
            on_complete,
        }
    }
}

// =============================================================================
// Service
// =============================================================================

pub struct OperationPollerService {
    poller: OperationPoller,
    on_complete: CompletionCallback,
}

#[async_trait]
impl Service for OperationPollerService {
    fn name(&self) -> &'static str {
        "operation-poller"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        self.poller.run(self.on_complete.clone(), shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::{
        identifier, CompletionRecorder, InMemoryIdentifierStore, InMemoryPendingOperationStore,
    };
    use crate::kernel::TestDependencies;

    fn group_formation() -> PendingOperation {
        PendingOperation::new(OperationKind::GroupFormation, "EGroup")
    }

    fn deps_with_group() -> TestDependencies {
        TestDependencies::new().with_identifiers(
            InMemoryIdentifierStore::new().with_identifier(identifier("EGroup", "treasury", &[])),
        )
    }

    #[tokio::test]
    async fn test_completes_on_second_poll() {
        let test_deps = deps_with_group();
        test_deps.operations.script("group.EGroup", &[false, true]);
        let poller = OperationPoller::new(test_deps.deps(), SyncConfig::default());
        poller.track(group_formation()).await.unwrap();
        let recorder = CompletionRecorder::new();
        let shutdown = CancellationToken::new();

        let first = poller.poll_once(&recorder.callback(), &shutdown).await;
        assert_eq!(first.completed, 0);
        assert!(recorder.completed().is_empty());
        assert!(test_deps.identifiers.record("EGroup").unwrap().pending);

        let second = poller.poll_once(&recorder.callback(), &shutdown).await;
        assert_eq!(second.completed, 1);
        assert_eq!(
            recorder.completed(),
            vec![OperationCompleted {
                entity_id: "EGroup".to_string(),
                kind: OperationKind::GroupFormation,
            }]
        );
        assert!(!test_deps.identifiers.record("EGroup").unwrap().pending);
        assert!(!poller.queue().contains("group.EGroup"));
        assert!(!test_deps.pending_operations.contains("group.EGroup"));
        assert_eq!(
            test_deps.group_actions.wait_for_started(1).await,
            vec!["treasury"]
        );

        // Nothing left to poll
        poller.poll_once(&recorder.callback(), &shutdown).await;
        assert_eq!(test_deps.operations.call_count("group.EGroup"), 2);
        assert_eq!(recorder.completed().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_makes_no_status_calls() {
        let test_deps = deps_with_group();
        test_deps.operations.script("group.EGroup", &[true]);
        test_deps.connectivity.set_online(false);
        let poller = OperationPoller::new(test_deps.deps(), SyncConfig::default());
        poller.enqueue(group_formation());
        let recorder = CompletionRecorder::new();

        let summary = poller
            .poll_once(&recorder.callback(), &CancellationToken::new())
            .await;

        assert!(summary.offline);
        assert!(test_deps.operations.calls().is_empty());
        assert!(poller.queue().contains("group.EGroup"));
    }

    #[tokio::test]
    async fn test_status_error_reconnects_and_continues() {
        let test_deps = TestDependencies::new().with_identifiers(
            InMemoryIdentifierStore::new()
                .with_identifier(identifier("EA", "alice", &[]))
                .with_identifier(identifier("EB", "bob", &[])),
        );
        test_deps.operations.fail_next("witness.EA");
        test_deps.operations.script("witness.EB", &[true]);
        let poller = OperationPoller::new(test_deps.deps(), SyncConfig::default());
        poller.enqueue(PendingOperation::new(OperationKind::WitnessAssignment, "EA"));
        poller.enqueue(PendingOperation::new(OperationKind::WitnessAssignment, "EB"));
        let recorder = CompletionRecorder::new();

        let summary = poller
            .poll_once(&recorder.callback(), &CancellationToken::new())
            .await;

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(test_deps.connectivity.reconnect_count(), 1);
        assert!(poller.queue().contains("witness.EA"));
        assert!(!poller.queue().contains("witness.EB"));
        // Witness completion does not start role authorization
        assert!(test_deps.group_actions.started().is_empty());
    }

    #[tokio::test]
    async fn test_failed_completion_stays_queued() {
        let test_deps = deps_with_group();
        test_deps.operations.script("group.EGroup", &[true]);
        test_deps.identifiers.fail_next_updates(1);
        let poller = OperationPoller::new(test_deps.deps(), SyncConfig::default());
        poller.enqueue(group_formation());
        let recorder = CompletionRecorder::new();
        let shutdown = CancellationToken::new();

        let summary = poller.poll_once(&recorder.callback(), &shutdown).await;
        assert_eq!(summary.failed, 1);
        assert!(recorder.completed().is_empty());
        assert!(poller.queue().contains("group.EGroup"));

        let summary = poller.poll_once(&recorder.callback(), &shutdown).await;
        assert_eq!(summary.completed, 1);
        assert_eq!(recorder.completed().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_delete_repeats_completion() {
        let test_deps = TestDependencies::new().with_identifiers(
            InMemoryIdentifierStore::new().with_identifier(identifier("EA", "alice", &[])),
        );
        test_deps.operations.script("witness.EA", &[true]);
        test_deps.pending_operations.fail_next_deletes(1);
        let poller = OperationPoller::new(test_deps.deps(), SyncConfig::default());
        poller
            .track(PendingOperation::new(OperationKind::WitnessAssignment, "EA"))
            .await
            .unwrap();
        let recorder = CompletionRecorder::new();
        let shutdown = CancellationToken::new();

        let summary = poller.poll_once(&recorder.callback(), &shutdown).await;
        assert_eq!(summary.failed, 1);
        assert_eq!(recorder.completed().len(), 1);
        assert!(poller.queue().contains("witness.EA"));
        assert!(test_deps.pending_operations.contains("witness.EA"));

        let summary = poller.poll_once(&recorder.callback(), &shutdown).await;
        assert_eq!(summary.completed, 1);
        assert_eq!(recorder.completed().len(), 2);
        assert!(poller.queue().is_empty());
        assert!(!test_deps.pending_operations.contains("witness.EA"));
    }

    #[tokio::test]
    async fn test_failed_role_authorization_does_not_block_completion() {
        let test_deps = deps_with_group();
        test_deps.operations.script("group.EGroup", &[true]);
        test_deps.group_actions.fail_next_starts(1);
        let poller = OperationPoller::new(test_deps.deps(), SyncConfig::default());
        poller.track(group_formation()).await.unwrap();
        let recorder = CompletionRecorder::new();

        let summary = poller
            .poll_once(&recorder.callback(), &CancellationToken::new())
            .await;

        assert_eq!(summary.completed, 1);
        assert_eq!(recorder.completed().len(), 1);
        assert!(poller.queue().is_empty());
        assert!(!test_deps.identifiers.record("EGroup").unwrap().pending);
        assert_eq!(test_deps.group_actions.wait_for_start_attempts(1).await, 1);
        assert!(test_deps.group_actions.started().is_empty());
    }

    #[tokio::test]
    async fn test_load_pending_merges_store() {
        let test_deps = TestDependencies::new().with_pending_operations(
            InMemoryPendingOperationStore::new()
                .with_operation(group_formation())
                .with_operation(PendingOperation::new(OperationKind::WitnessAssignment, "EA")),
        );
        let poller = OperationPoller::new(test_deps.deps(), SyncConfig::default());
        poller.enqueue(group_formation());

        let added = poller.load_pending().await.unwrap();

        assert_eq!(added, 1);
        assert_eq!(poller.queue().len(), 2);
    }
}
