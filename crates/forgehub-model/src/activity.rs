use crate::ids::{ProjectId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ActivityAction {
    CreatedProject,
    UpdatedProject,
    CheckedOut,
    CheckedIn,
    AddedCollaborator,
    RemovedCollaborator,
    TransferredOwnership,
}

impl ActivityAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedProject => "created_project",
            Self::UpdatedProject => "updated_project",
            Self::CheckedOut => "checked_out",
            Self::CheckedIn => "checked_in",
            Self::AddedCollaborator => "added_collaborator",
            Self::RemovedCollaborator => "removed_collaborator",
            Self::TransferredOwnership => "transferred_ownership",
        }
    }
}

/// One append-only feed entry. `message` carries the check-in message or
/// the affected handle for membership changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivityRecord {
    pub user: UserId,
    pub project: ProjectId,
    pub action: ActivityAction,
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

impl ActivityRecord {
    #[must_use]
    pub fn new(user: UserId, project: ProjectId, action: ActivityAction) -> Self {
        Self {
            user,
            project,
            action,
            message: None,
            at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ProjectId, UserId};

    #[test]
    fn action_labels_are_stable() {
        assert_eq!(ActivityAction::CheckedOut.as_str(), "checked_out");
        assert_eq!(ActivityAction::CheckedIn.as_str(), "checked_in");
    }

    #[test]
    fn record_builder_attaches_message() {
        let r = ActivityRecord::new(
            UserId::parse("bob").expect("handle"),
            ProjectId::random(),
            ActivityAction::CheckedIn,
        )
        .with_message("fixed bug");
        assert_eq!(r.message.as_deref(), Some("fixed bug"));
    }
}
