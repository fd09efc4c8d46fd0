//! Feed events as delivered by the agent, and their local materialization

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// NotificationRoute
// =============================================================================

/// Application routes this device materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationRoute {
    #[serde(rename = "/exn/ipex/grant")]
    CredentialGrant,
    #[serde(rename = "/exn/ipex/apply")]
    CredentialApply,
    #[serde(rename = "/exn/ipex/agree")]
    CredentialAgree,
    #[serde(rename = "/multisig/icp")]
    GroupInception,
    #[serde(rename = "/multisig/rot")]
    GroupRotation,
    #[serde(rename = "/multisig/rpy")]
    GroupReply,
    #[serde(rename = "/multisig/exn")]
    GroupExchange,
}

impl NotificationRoute {
    pub const ALL: [NotificationRoute; 7] = [
        NotificationRoute::CredentialGrant,
        NotificationRoute::CredentialApply,
        NotificationRoute::CredentialAgree,
        NotificationRoute::GroupInception,
        NotificationRoute::GroupRotation,
        NotificationRoute::GroupReply,
        NotificationRoute::GroupExchange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationRoute::CredentialGrant => "/exn/ipex/grant",
            NotificationRoute::CredentialApply => "/exn/ipex/apply",
            NotificationRoute::CredentialAgree => "/exn/ipex/agree",
            NotificationRoute::GroupInception => "/multisig/icp",
            NotificationRoute::GroupRotation => "/multisig/rot",
            NotificationRoute::GroupReply => "/multisig/rpy",
            NotificationRoute::GroupExchange => "/multisig/exn",
        }
    }

    /// Parse a raw route string; `None` for routes this device does not handle.
    pub fn parse(route: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == route)
    }

    /// Routes whose payload refers to a group request.
    pub fn is_group(&self) -> bool {
        matches!(
            self,
            NotificationRoute::GroupInception
                | NotificationRoute::GroupRotation
                | NotificationRoute::GroupReply
                | NotificationRoute::GroupExchange
        )
    }
}

impl fmt::Display for NotificationRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// RawEvent
// =============================================================================

/// The action carried by a feed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAction {
    /// Raw route string, possibly one this device does not recognize
    pub route: String,
    /// Digest of the underlying exchange message
    pub digest: String,
    /// Route-specific fields, kept opaque
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A feed item as returned by the agent. Immutable locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: String,
    pub occurred_at: DateTime<Utc>,
    /// Already acknowledged by this device
    pub consumed: bool,
    pub action: EventAction,
}

impl RawEvent {
    pub fn route(&self) -> Option<NotificationRoute> {
        NotificationRoute::parse(&self.action.route)
    }
}

// =============================================================================
// MaterializedEvent
// =============================================================================

/// Local copy of a feed event the application can display and act on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedEvent {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub route: NotificationRoute,
    pub read: bool,
    /// Group id for group routes
    pub correlation_id: Option<String>,
    /// Sender of the underlying exchange
    pub connection_id: Option<String>,
    pub action: EventAction,
}

impl MaterializedEvent {
    pub fn from_raw(event: &RawEvent, route: NotificationRoute) -> Self {
        Self {
            id: event.id.clone(),
            created_at: Utc::now(),
            route,
            read: false,
            correlation_id: None,
            connection_id: None,
            action: event.action.clone(),
        }
    }
}
