//! PendingOperation model - a remote asynchronous action this device waits on

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Formation of a multi-party group identifier
    GroupFormation,
    /// Witness receipts for a single identifier
    WitnessAssignment,
}

impl OperationKind {
    /// Prefix used in operation ids.
    pub fn prefix(&self) -> &'static str {
        match self {
            OperationKind::GroupFormation => "group",
            OperationKind::WitnessAssignment => "witness",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub operation_id: String,
    pub kind: OperationKind,
    pub local_entity_id: String,
}

impl PendingOperation {
    /// Track `kind` for `local_entity_id`; the id is `"<prefix>.<entity id>"`.
    pub fn new(kind: OperationKind, local_entity_id: impl Into<String>) -> Self {
        let local_entity_id = local_entity_id.into();
        Self {
            operation_id: format!("{}.{}", kind.prefix(), local_entity_id),
            kind,
            local_entity_id,
        }
    }
}

/// Status of an operation as reported by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOperation {
    pub name: String,
    pub done: bool,
}

/// Passed to the completion callback once an operation is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCompleted {
    pub entity_id: String,
    pub kind: OperationKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_id_prefix() {
        let op = PendingOperation::new(OperationKind::GroupFormation, "EGroup");
        assert_eq!(op.operation_id, "group.EGroup");
        assert_eq!(op.local_entity_id, "EGroup");

        let op = PendingOperation::new(OperationKind::WitnessAssignment, "EAid");
        assert_eq!(op.operation_id, "witness.EAid");
    }
}
