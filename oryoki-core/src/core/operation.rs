//! Audit records for knowledge-base mutations.

use crate::{EntryKind, EntryStatus};
use serde::{Deserialize, Serialize};

/// A single mutation recorded in the knowledge-base operation log.
///
/// Every variant carries a stable `operation_id`, a wall-clock `timestamp`
/// (Unix milliseconds) and the `user_id` of the acting user, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    CreateEntry {
        operation_id: String,
        timestamp: i64,
        user_id: Option<String>,
        entry_id: String,
        kind: EntryKind,
        heading: String,
        status: EntryStatus,
        topics: Vec<String>,
    },
    /// Heading, flags, payload or topics of an entry were replaced.
    UpdateEntry {
        operation_id: String,
        timestamp: i64,
        user_id: Option<String>,
        entry_id: String,
        heading: String,
        topics: Vec<String>,
    },
    /// An entry was published or converted back to a draft.
    SetStatus {
        operation_id: String,
        timestamp: i64,
        user_id: Option<String>,
        entry_id: String,
        status: EntryStatus,
    },
    DeleteEntry {
        operation_id: String,
        timestamp: i64,
        user_id: Option<String>,
        entry_id: String,
    },
    CreateTopic {
        operation_id: String,
        timestamp: i64,
        user_id: Option<String>,
        topic_id: String,
        name: String,
    },
    AddImage {
        operation_id: String,
        timestamp: i64,
        user_id: Option<String>,
        entry_id: String,
        image_id: String,
        file_path: String,
    },
    RemoveImage {
        operation_id: String,
        timestamp: i64,
        user_id: Option<String>,
        image_id: String,
        file_path: String,
    },
    CreateImprovement {
        operation_id: String,
        timestamp: i64,
        user_id: Option<String>,
        improvement_id: String,
    },
    /// An improvement suggestion became a draft entry and was removed.
    ConvertImprovement {
        operation_id: String,
        timestamp: i64,
        user_id: Option<String>,
        improvement_id: String,
        entry_id: String,
    },
    DeleteImprovement {
        operation_id: String,
        timestamp: i64,
        user_id: Option<String>,
        improvement_id: String,
    },
    CreateUser {
        operation_id: String,
        timestamp: i64,
        user_id: Option<String>,
        new_user_id: String,
        username: String,
    },
    SetUserActive {
        operation_id: String,
        timestamp: i64,
        user_id: Option<String>,
        target_user_id: String,
        is_active: bool,
    },
    DeleteUser {
        operation_id: String,
        timestamp: i64,
        user_id: Option<String>,
        target_user_id: String,
    },
}

impl Operation {
    /// Returns the stable identifier for this operation.
    #[must_use]
    pub fn operation_id(&self) -> &str {
        match self {
            Self::CreateEntry { operation_id, .. }
            | Self::UpdateEntry { operation_id, .. }
            | Self::SetStatus { operation_id, .. }
            | Self::DeleteEntry { operation_id, .. }
            | Self::CreateTopic { operation_id, .. }
            | Self::AddImage { operation_id, .. }
            | Self::RemoveImage { operation_id, .. }
            | Self::CreateImprovement { operation_id, .. }
            | Self::ConvertImprovement { operation_id, .. }
            | Self::DeleteImprovement { operation_id, .. }
            | Self::CreateUser { operation_id, .. }
            | Self::SetUserActive { operation_id, .. }
            | Self::DeleteUser { operation_id, .. } => operation_id,
        }
    }

    /// Returns the Unix timestamp (milliseconds) when this operation was created.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::CreateEntry { timestamp, .. }
            | Self::UpdateEntry { timestamp, .. }
            | Self::SetStatus { timestamp, .. }
            | Self::DeleteEntry { timestamp, .. }
            | Self::CreateTopic { timestamp, .. }
            | Self::AddImage { timestamp, .. }
            | Self::RemoveImage { timestamp, .. }
            | Self::CreateImprovement { timestamp, .. }
            | Self::ConvertImprovement { timestamp, .. }
            | Self::DeleteImprovement { timestamp, .. }
            | Self::CreateUser { timestamp, .. }
            | Self::SetUserActive { timestamp, .. }
            | Self::DeleteUser { timestamp, .. } => *timestamp,
        }
    }

    /// Returns the ID of the user who performed this operation.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::CreateEntry { user_id, .. }
            | Self::UpdateEntry { user_id, .. }
            | Self::SetStatus { user_id, .. }
            | Self::DeleteEntry { user_id, .. }
            | Self::CreateTopic { user_id, .. }
            | Self::AddImage { user_id, .. }
            | Self::RemoveImage { user_id, .. }
            | Self::CreateImprovement { user_id, .. }
            | Self::ConvertImprovement { user_id, .. }
            | Self::DeleteImprovement { user_id, .. }
            | Self::CreateUser { user_id, .. }
            | Self::SetUserActive { user_id, .. }
            | Self::DeleteUser { user_id, .. } => user_id.as_deref(),
        }
    }

    /// Name stored in the `operation_type` column.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::CreateEntry { .. } => "CreateEntry",
            Self::UpdateEntry { .. } => "UpdateEntry",
            Self::SetStatus { .. } => "SetStatus",
            Self::DeleteEntry { .. } => "DeleteEntry",
            Self::CreateTopic { .. } => "CreateTopic",
            Self::AddImage { .. } => "AddImage",
            Self::RemoveImage { .. } => "RemoveImage",
            Self::CreateImprovement { .. } => "CreateImprovement",
            Self::ConvertImprovement { .. } => "ConvertImprovement",
            Self::DeleteImprovement { .. } => "DeleteImprovement",
            Self::CreateUser { .. } => "CreateUser",
            Self::SetUserActive { .. } => "SetUserActive",
            Self::DeleteUser { .. } => "DeleteUser",
        }
    }
}
