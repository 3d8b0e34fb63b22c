//! Audit trail of the actions agents and employers take through their
//! credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{ActivityId, CredentialId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Apply,
    UpdateApplicationStatus,
    SendMessage,
}

impl ActivityAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            ActivityAction::Apply => "apply",
            ActivityAction::UpdateApplicationStatus => "update_application_status",
            ActivityAction::SendMessage => "send_message",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Application,
    Conversation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: ActivityId,
    /// Candidate or employer id of whoever acted.
    pub actor_id: String,
    /// Absent when the action did not come through an API credential.
    pub credential_id: Option<CredentialId>,
    pub action: ActivityAction,
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(
        actor_id: impl Into<String>,
        credential_id: Option<CredentialId>,
        action: ActivityAction,
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActivityId::generate(),
            actor_id: actor_id.into(),
            credential_id,
            action,
            resource_type,
            resource_id: resource_id.into(),
            metadata: Value::Object(Default::default()),
            created_at,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}
