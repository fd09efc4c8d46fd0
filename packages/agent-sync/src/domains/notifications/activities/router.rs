//! Event routing activities.
//!
//! Decides what to do with a single feed event, does it, then acknowledges the
//! event on the agent. Rules are checked in order and the first match wins:
//!
//! 1. Group reply (`/multisig/rpy`) - endpoint-role grants for a local group
//! 2. Group inception (`/multisig/icp`) - suppressed once the group is known
//! 3. Any other recognized route - materialized locally
//! 4. Unrecognized route - acknowledged and dropped
//!
//! Every `Ok` path on an unconsumed event ends with exactly one
//! acknowledgement. Errors leave the event unacknowledged so the feed delivers
//! it again.
//!
//! Group replies and inceptions are checked even when the agent already flags
//! the event as consumed: a reply is acknowledged before its join runs, so a
//! crash in between leaves a consumed event whose join still has to happen.
//! Everything else on a consumed event is [`Disposition::AlreadyConsumed`]
//! without touching the local store. Consumed events are never acknowledged
//! again.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::common::SyncError;
use crate::domains::notifications::models::{
    GroupRequest, MaterializedEvent, NotificationRoute, RawEvent,
};
use crate::kernel::SyncDeps;

/// Invoked once per newly materialized event.
pub type EventCallback = Arc<dyn Fn(MaterializedEvent) + Send + Sync>;

/// What routing did with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Already acknowledged upstream; nothing to do
    AlreadyConsumed,
    /// The referenced group request no longer exists
    GroupGone,
    /// The referenced group has no local record
    UnknownGroup { group_id: String },
    /// Already handled on this device
    Duplicate,
    /// Joined another member's endpoint-role authorization
    RoleAuthorizationJoined { group_id: String },
    Materialized(MaterializedEvent),
    /// Route not handled by this device
    Ignored,
}

/// Outcome of a group-specific rule.
enum Flow {
    Done(Disposition),
    Materialize { correlation_id: Option<String> },
}

pub struct EventRouter {
    deps: SyncDeps,
}

impl EventRouter {
    pub fn new(deps: SyncDeps) -> Self {
        Self { deps }
    }

    /// Route one event. `on_new_event` fires only for newly materialized events.
    pub async fn route(
        &self,
        event: &RawEvent,
        on_new_event: &EventCallback,
    ) -> Result<Disposition, SyncError> {
        let Some(route) = event.route() else {
            if event.consumed {
                return Ok(Disposition::AlreadyConsumed);
            }
            debug!(event_id = %event.id, route = %event.action.route, "unrecognized route");
            self.acknowledge(event).await?;
            return Ok(Disposition::Ignored);
        };

        let correlation_id = match route {
            NotificationRoute::GroupReply => match self.route_group_reply(event).await? {
                Flow::Done(disposition) => return Ok(disposition),
                Flow::Materialize { correlation_id } => correlation_id,
            },
            NotificationRoute::GroupInception => match self.route_group_inception(event).await? {
                Flow::Done(disposition) => return Ok(disposition),
                Flow::Materialize { correlation_id } => correlation_id,
            },
            _ if event.consumed => return Ok(Disposition::AlreadyConsumed),
            r if r.is_group() => self.correlate(event).await,
            _ => None,
        };

        self.materialize(event, route, correlation_id, on_new_event)
            .await
    }

    // =========================================================================
    // Group rules
    // =========================================================================

    async fn route_group_reply(&self, event: &RawEvent) -> Result<Flow, SyncError> {
        let Some((request, group_id)) = self.lookup_group(event).await? else {
            self.acknowledge(event).await?;
            return Ok(Flow::Done(Disposition::GroupGone));
        };

        let group = self
            .deps
            .identifiers
            .get(&group_id)
            .await
            .map_err(SyncError::store)?;
        let Some(group) = group else {
            self.acknowledge(event).await?;
            return Ok(Flow::Done(Disposition::UnknownGroup { group_id }));
        };

        match request.granted_endpoint() {
            Some(endpoint_id) if group.has_authorized(endpoint_id) => {
                debug!(event_id = %event.id, %group_id, %endpoint_id, "endpoint role already granted");
                self.acknowledge(event).await?;
                Ok(Flow::Done(Disposition::Duplicate))
            }
            Some(endpoint_id) => {
                // Acknowledge first: a crash may repeat the join, never skip it.
                // A failed join is retried by routing the consumed event again.
                self.acknowledge(event).await?;
                debug!(event_id = %event.id, %group_id, %endpoint_id, "joining endpoint role authorization");
                self.deps
                    .group_actions
                    .join_role_authorization(&request)
                    .await
                    .map_err(SyncError::Action)?;
                Ok(Flow::Done(Disposition::RoleAuthorizationJoined { group_id }))
            }
            None => Ok(Flow::Materialize {
                correlation_id: Some(group_id),
            }),
        }
    }

    async fn route_group_inception(&self, event: &RawEvent) -> Result<Flow, SyncError> {
        let Some((_, group_id)) = self.lookup_group(event).await? else {
            self.acknowledge(event).await?;
            return Ok(Flow::Done(Disposition::GroupGone));
        };

        let known = self
            .deps
            .identifiers
            .get(&group_id)
            .await
            .map_err(SyncError::store)?
            .is_some();
        let correlated = !self
            .deps
            .events
            .find_by_correlation(&group_id)
            .await
            .map_err(SyncError::store)?
            .is_empty();

        if known || correlated {
            debug!(event_id = %event.id, %group_id, known, correlated, "group inception already handled");
            self.acknowledge(event).await?;
            return Ok(Flow::Done(Disposition::Duplicate));
        }

        Ok(Flow::Materialize {
            correlation_id: Some(group_id),
        })
    }

    /// Fetch the group request behind an event.
    ///
    /// `Ok(None)` when the request is gone or names no group. Transport
    /// failures are errors so the event is retried rather than acknowledged.
    async fn lookup_group(
        &self,
        event: &RawEvent,
    ) -> Result<Option<(GroupRequest, String)>, SyncError> {
        match self
            .deps
            .group_requests
            .get_by_digest(&event.action.digest)
            .await
        {
            Ok(request) => Ok(request
                .group_id
                .clone()
                .map(|group_id| (request, group_id))),
            Err(e) if e.is_not_found() => {
                debug!(event_id = %event.id, digest = %event.action.digest, "group request not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort group id for enrichment.
    async fn correlate(&self, event: &RawEvent) -> Option<String> {
        match self
            .deps
            .group_requests
            .get_by_digest(&event.action.digest)
            .await
        {
            Ok(request) => request.group_id,
            Err(e) => {
                debug!(event_id = %event.id, error = %e, "could not resolve group for event");
                None
            }
        }
    }

    // =========================================================================
    // Materialization
    // =========================================================================

    async fn materialize(
        &self,
        event: &RawEvent,
        route: NotificationRoute,
        correlation_id: Option<String>,
        on_new_event: &EventCallback,
    ) -> Result<Disposition, SyncError> {
        if event.consumed {
            return Ok(Disposition::AlreadyConsumed);
        }

        let existing = self
            .deps
            .events
            .find_by_id(&event.id)
            .await
            .map_err(SyncError::store)?;
        if existing.is_some() {
            debug!(event_id = %event.id, "event already materialized");
            self.acknowledge(event).await?;
            return Ok(Disposition::Duplicate);
        }

        let mut record = MaterializedEvent::from_raw(event, route);
        record.correlation_id = correlation_id;
        record.connection_id = match self.deps.exchanges.sender_of(&event.action.digest).await {
            Ok(sender) => Some(sender),
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "could not resolve exchange sender");
                None
            }
        };

        self.deps
            .events
            .save(&record)
            .await
            .map_err(SyncError::store)?;
        on_new_event(record.clone());
        self.acknowledge(event).await?;

        debug!(event_id = %event.id, %route, "event materialized");
        Ok(Disposition::Materialized(record))
    }

    async fn acknowledge(&self, event: &RawEvent) -> Result<(), SyncError> {
        if event.consumed {
            return Ok(());
        }
        self.deps.feed.mark_consumed(&event.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{GroupRequestError, TransportError};
    use crate::kernel::test_dependencies::{
        group_request, identifier, raw_event, EventRecorder, InMemoryIdentifierStore,
        MockExchanges, MockGroupRequests,
    };
    use crate::kernel::TestDependencies;

    fn router(test_deps: &TestDependencies) -> EventRouter {
        EventRouter::new(test_deps.deps())
    }

    #[tokio::test]
    async fn test_generic_event_materialized_then_acknowledged() {
        let test_deps = TestDependencies::new()
            .with_exchanges(MockExchanges::new().with_sender("EGrant", "EIssuer"));
        let recorder = EventRecorder::new();

        let event = raw_event("n-1", "/exn/ipex/grant", "EGrant");
        let disposition = router(&test_deps)
            .route(&event, &recorder.callback())
            .await
            .unwrap();

        let Disposition::Materialized(record) = disposition else {
            panic!("expected materialized, got {:?}", disposition);
        };
        assert_eq!(record.id, "n-1");
        assert_eq!(record.route, NotificationRoute::CredentialGrant);
        assert_eq!(record.connection_id.as_deref(), Some("EIssuer"));
        assert!(!record.read);

        assert_eq!(test_deps.events.ids(), vec!["n-1"]);
        assert_eq!(recorder.ids(), vec!["n-1"]);
        assert_eq!(test_deps.feed.marked(), vec!["n-1"]);
    }

    #[tokio::test]
    async fn test_consumed_event_has_no_side_effects() {
        let test_deps = TestDependencies::new();
        let recorder = EventRecorder::new();

        let mut event = raw_event("n-1", "/exn/ipex/grant", "EGrant");
        event.consumed = true;

        let disposition = router(&test_deps)
            .route(&event, &recorder.callback())
            .await
            .unwrap();

        assert_eq!(disposition, Disposition::AlreadyConsumed);
        assert!(test_deps.events.is_empty());
        assert!(recorder.events().is_empty());
        assert!(test_deps.feed.marked().is_empty());
    }

    #[tokio::test]
    async fn test_redelivered_event_not_materialized_twice() {
        let test_deps = TestDependencies::new();
        let recorder = EventRecorder::new();
        let router = router(&test_deps);
        let event = raw_event("n-1", "/exn/ipex/grant", "EGrant");

        router.route(&event, &recorder.callback()).await.unwrap();
        let second = router.route(&event, &recorder.callback()).await.unwrap();

        assert_eq!(second, Disposition::Duplicate);
        assert_eq!(test_deps.events.len(), 1);
        assert_eq!(recorder.events().len(), 1);
        assert_eq!(test_deps.feed.mark_count("n-1"), 2);
    }

    #[tokio::test]
    async fn test_unrecognized_route_acknowledged_only() {
        let test_deps = TestDependencies::new();
        let recorder = EventRecorder::new();

        let event = raw_event("n-1", "/exn/unknown", "EDigest");
        let disposition = router(&test_deps)
            .route(&event, &recorder.callback())
            .await
            .unwrap();

        assert_eq!(disposition, Disposition::Ignored);
        assert!(test_deps.events.is_empty());
        assert!(recorder.events().is_empty());
        assert_eq!(test_deps.feed.marked(), vec!["n-1"]);
    }

    #[tokio::test]
    async fn test_group_reply_for_granted_endpoint_is_duplicate() {
        let test_deps = TestDependencies::new()
            .with_group_requests(
                MockGroupRequests::new()
                    .with_request("ERpy", group_request("EGroup", Some("EAgent"))),
            )
            .with_identifiers(
                InMemoryIdentifierStore::new()
                    .with_identifier(identifier("EGroup", "family", &["EAgent"])),
            );
        let recorder = EventRecorder::new();

        let event = raw_event("n-1", "/multisig/rpy", "ERpy");
        let disposition = router(&test_deps)
            .route(&event, &recorder.callback())
            .await
            .unwrap();

        assert_eq!(disposition, Disposition::Duplicate);
        assert!(test_deps.group_actions.joined().is_empty());
        assert_eq!(test_deps.feed.marked(), vec!["n-1"]);
        assert!(test_deps.events.is_empty());
    }

    #[tokio::test]
    async fn test_group_reply_for_new_endpoint_joins_once() {
        let test_deps = TestDependencies::new()
            .with_group_requests(
                MockGroupRequests::new()
                    .with_request("ERpy", group_request("EGroup", Some("ENewAgent"))),
            )
            .with_identifiers(
                InMemoryIdentifierStore::new()
                    .with_identifier(identifier("EGroup", "family", &["EAgent"])),
            );
        let recorder = EventRecorder::new();

        let event = raw_event("n-1", "/multisig/rpy", "ERpy");
        let disposition = router(&test_deps)
            .route(&event, &recorder.callback())
            .await
            .unwrap();

        assert_eq!(
            disposition,
            Disposition::RoleAuthorizationJoined {
                group_id: "EGroup".to_string()
            }
        );
        assert_eq!(test_deps.group_actions.joined().len(), 1);
        assert_eq!(test_deps.feed.marked(), vec!["n-1"]);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_acknowledged_reply_still_joins() {
        let test_deps = TestDependencies::new()
            .with_group_requests(
                MockGroupRequests::new()
                    .with_request("ERpy", group_request("EGroup", Some("ENewAgent"))),
            )
            .with_identifiers(
                InMemoryIdentifierStore::new()
                    .with_identifier(identifier("EGroup", "family", &["EAgent"])),
            );
        let recorder = EventRecorder::new();

        // Acknowledged before a crash that skipped the join
        let mut event = raw_event("n-1", "/multisig/rpy", "ERpy");
        event.consumed = true;

        let disposition = router(&test_deps)
            .route(&event, &recorder.callback())
            .await
            .unwrap();

        assert_eq!(
            disposition,
            Disposition::RoleAuthorizationJoined {
                group_id: "EGroup".to_string()
            }
        );
        assert_eq!(test_deps.group_actions.joined().len(), 1);
        assert!(test_deps.feed.marked().is_empty());
        assert!(test_deps.events.is_empty());
    }

    #[tokio::test]
    async fn test_consumed_reply_without_grant_not_materialized() {
        let test_deps = TestDependencies::new()
            .with_group_requests(
                MockGroupRequests::new().with_request("ERpy", group_request("EGroup", None)),
            )
            .with_identifiers(
                InMemoryIdentifierStore::new().with_identifier(identifier("EGroup", "family", &[])),
            );
        let recorder = EventRecorder::new();

        let mut event = raw_event("n-1", "/multisig/rpy", "ERpy");
        event.consumed = true;

        let disposition = router(&test_deps)
            .route(&event, &recorder.callback())
            .await
            .unwrap();

        assert_eq!(disposition, Disposition::AlreadyConsumed);
        assert!(test_deps.events.is_empty());
        assert!(recorder.events().is_empty());
        assert!(test_deps.feed.marked().is_empty());
    }

    #[tokio::test]
    async fn test_failed_join_after_acknowledgement_is_retried() {
        let test_deps = TestDependencies::new()
            .with_group_requests(
                MockGroupRequests::new()
                    .with_request("ERpy", group_request("EGroup", Some("ENewAgent"))),
            )
            .with_identifiers(
                InMemoryIdentifierStore::new().with_identifier(identifier("EGroup", "family", &[])),
            );
        test_deps.group_actions.fail_next_joins(1);
        let recorder = EventRecorder::new();
        let router = router(&test_deps);

        let mut event = raw_event("n-1", "/multisig/rpy", "ERpy");
        test_deps.feed.push(event.clone());
        let result = router.route(&event, &recorder.callback()).await;

        assert!(matches!(result, Err(SyncError::Action(_))));
        assert!(test_deps.feed.is_consumed("n-1"));
        assert!(test_deps.group_actions.joined().is_empty());

        // Redelivered with the consumed flag set
        event.consumed = true;
        let disposition = router.route(&event, &recorder.callback()).await.unwrap();

        assert_eq!(
            disposition,
            Disposition::RoleAuthorizationJoined {
                group_id: "EGroup".to_string()
            }
        );
        assert_eq!(test_deps.group_actions.join_attempts(), 2);
        assert_eq!(test_deps.group_actions.joined().len(), 1);
        assert_eq!(test_deps.feed.mark_count("n-1"), 1);
    }

    #[tokio::test]
    async fn test_group_reply_for_deleted_request() {
        let test_deps = TestDependencies::new();
        let recorder = EventRecorder::new();

        let event = raw_event("n-1", "/multisig/rpy", "EMissing");
        let disposition = router(&test_deps)
            .route(&event, &recorder.callback())
            .await
            .unwrap();

        assert_eq!(disposition, Disposition::GroupGone);
        assert_eq!(test_deps.feed.marked(), vec!["n-1"]);
    }

    #[tokio::test]
    async fn test_group_reply_for_unknown_group() {
        let test_deps = TestDependencies::new().with_group_requests(
            MockGroupRequests::new().with_request("ERpy", group_request("EGroup", Some("EAgent"))),
        );
        let recorder = EventRecorder::new();

        let event = raw_event("n-1", "/multisig/rpy", "ERpy");
        let disposition = router(&test_deps)
            .route(&event, &recorder.callback())
            .await
            .unwrap();

        assert_eq!(
            disposition,
            Disposition::UnknownGroup {
                group_id: "EGroup".to_string()
            }
        );
        assert!(test_deps.group_actions.joined().is_empty());
    }

    #[tokio::test]
    async fn test_group_inception_materialized_with_correlation() {
        let test_deps = TestDependencies::new().with_group_requests(
            MockGroupRequests::new().with_request("EIcp", group_request("EGroup", None)),
        );
        let recorder = EventRecorder::new();
        let router = router(&test_deps);

        let first = raw_event("n-1", "/multisig/icp", "EIcp");
        let disposition = router.route(&first, &recorder.callback()).await.unwrap();
        let Disposition::Materialized(record) = disposition else {
            panic!("expected materialized, got {:?}", disposition);
        };
        assert_eq!(record.correlation_id.as_deref(), Some("EGroup"));

        // A second invitation to the same group is suppressed
        let second = raw_event("n-2", "/multisig/icp", "EIcp");
        let disposition = router.route(&second, &recorder.callback()).await.unwrap();
        assert_eq!(disposition, Disposition::Duplicate);
        assert_eq!(test_deps.events.len(), 1);
        assert_eq!(recorder.ids(), vec!["n-1"]);
        assert_eq!(test_deps.feed.marked(), vec!["n-1", "n-2"]);
    }

    #[tokio::test]
    async fn test_group_inception_for_existing_group_is_duplicate() {
        let test_deps = TestDependencies::new()
            .with_group_requests(
                MockGroupRequests::new().with_request("EIcp", group_request("EGroup", None)),
            )
            .with_identifiers(
                InMemoryIdentifierStore::new().with_identifier(identifier("EGroup", "family", &[])),
            );
        let recorder = EventRecorder::new();

        let event = raw_event("n-1", "/multisig/icp", "EIcp");
        let disposition = router(&test_deps)
            .route(&event, &recorder.callback())
            .await
            .unwrap();

        assert_eq!(disposition, Disposition::Duplicate);
        assert!(test_deps.events.is_empty());
    }

    #[tokio::test]
    async fn test_group_inception_transient_lookup_failure_not_acknowledged() {
        let group_requests = MockGroupRequests::new();
        group_requests.set(
            "EIcp",
            Err(GroupRequestError::Transport(TransportError::new("timeout"))),
        );
        let test_deps = TestDependencies::new().with_group_requests(group_requests);
        let recorder = EventRecorder::new();

        let event = raw_event("n-1", "/multisig/icp", "EIcp");
        let result = router(&test_deps).route(&event, &recorder.callback()).await;

        assert!(matches!(result, Err(SyncError::Transport(_))));
        assert!(test_deps.feed.marked().is_empty());
        assert!(test_deps.events.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_leaves_event_unacknowledged() {
        let test_deps = TestDependencies::new();
        test_deps.events.fail_next_saves(1);
        let recorder = EventRecorder::new();

        let event = raw_event("n-1", "/exn/ipex/grant", "EGrant");
        let result = router(&test_deps).route(&event, &recorder.callback()).await;

        assert!(matches!(result, Err(SyncError::Store(_))));
        assert!(recorder.events().is_empty());
        assert!(test_deps.feed.marked().is_empty());
    }

    #[tokio::test]
    async fn test_group_rotation_correlation_is_best_effort() {
        let test_deps = TestDependencies::new();
        let recorder = EventRecorder::new();

        let event = raw_event("n-1", "/multisig/rot", "EMissing");
        let disposition = router(&test_deps)
            .route(&event, &recorder.callback())
            .await
            .unwrap();

        let Disposition::Materialized(record) = disposition else {
            panic!("expected materialized, got {:?}", disposition);
        };
        assert_eq!(record.correlation_id, None);
        assert_eq!(test_deps.feed.marked(), vec!["n-1"]);
    }
}
