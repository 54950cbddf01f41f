//! Workspace invitation entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    pub email: String,
    #[serde(rename = "workspace")]
    pub workspace_id: String,
    pub invited_by: String,
    pub status: InvitationStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Rejected => "rejected",
        }
    }
}

impl From<&str> for InvitationStatus {
    fn from(s: &str) -> Self {
        match s {
            "accepted" => InvitationStatus::Accepted,
            "rejected" => InvitationStatus::Rejected,
            _ => InvitationStatus::Pending,
        }
    }
}
