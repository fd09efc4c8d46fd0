//! Group requests and local identifier records referenced by group events

use serde::{Deserialize, Serialize};

/// Route of a reply granting an endpoint role.
pub const END_ROLE_ADD_ROUTE: &str = "/end/role/add";

/// Reply embedded in a group request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleReply {
    pub route: String,
    pub endpoint_id: String,
}

/// A pending multi-party request, looked up by the digest carried in a feed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRequest {
    pub group_id: Option<String>,
    pub reply: Option<RoleReply>,
    /// Underlying exchange message, handed to domain actions as-is
    pub exchange: serde_json::Value,
}

impl GroupRequest {
    /// The endpoint id granted by this request, if it is an endpoint-role grant.
    pub fn granted_endpoint(&self) -> Option<&str> {
        self.reply
            .as_ref()
            .filter(|r| r.route == END_ROLE_ADD_ROUTE)
            .map(|r| r.endpoint_id.as_str())
    }
}

/// Local record of an identifier or group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    pub id: String,
    pub name: String,
    /// Waiting on a remote operation
    pub pending: bool,
    #[serde(default)]
    pub authorized_endpoint_ids: Vec<String>,
}

impl IdentifierRecord {
    pub fn has_authorized(&self, endpoint_id: &str) -> bool {
        self.authorized_endpoint_ids.iter().any(|e| e == endpoint_id)
    }
}
