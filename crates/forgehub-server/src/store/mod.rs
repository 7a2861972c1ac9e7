// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forgehub_model::{ActivityRecord, FileEntry, Project, ProjectId, UserId};

pub mod activity;
pub mod identity;
pub mod memory;
pub mod objects;

pub use objects::delete_objects_best_effort;

#[derive(Debug)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for StoreError {}

/// Result of the conditional lease acquire. The store decides this in a
/// single atomic step; callers never read-then-write the lease field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseTransition {
    Acquired(Project),
    AlreadyHeld(UserId),
    Missing,
}

/// The one logical document update a check-in performs: clear the lease,
/// optionally replace the file set and version label.
#[derive(Debug, Clone)]
pub struct CheckinUpdate {
    pub new_files: Option<Vec<FileEntry>>,
    pub new_version: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckinOutcome {
    Completed {
        project: Project,
        /// The file entries that were displaced, for blob cleanup.
        replaced_files: Vec<FileEntry>,
    },
    NotHolder {
        holder: Option<UserId>,
    },
    Missing,
}

#[async_trait]
pub trait ProjectStore: Send + Sync + 'static {
    async fn get(&self, id: &ProjectId) -> Result<Option<Project>, StoreError>;
    async fn list(&self) -> Result<Vec<Project>, StoreError>;
    async fn insert(&self, project: Project) -> Result<(), StoreError>;
    /// Full-document replace for owner metadata edits. Never used for
    /// lease transitions.
    async fn update(&self, project: Project) -> Result<(), StoreError>;
    async fn remove(&self, id: &ProjectId) -> Result<Option<Project>, StoreError>;

    /// Set the lease to `user` only where no lease is held. Must be atomic
    /// with respect to concurrent acquires on the same project.
    async fn try_acquire_lease(
        &self,
        id: &ProjectId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<LeaseTransition, StoreError>;

    /// Apply `update` and clear the lease only where `user` holds it, as
    /// one write. A failure leaves the document untouched.
    async fn complete_checkin(
        &self,
        id: &ProjectId,
        user: &UserId,
        update: CheckinUpdate,
    ) -> Result<CheckinOutcome, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub location: String,
    pub size_label: String,
}

#[async_trait]
pub trait ObjectStoreBackend: Send + Sync + 'static {
    async fn put(
        &self,
        project: &ProjectId,
        name: &str,
        bytes: &[u8],
    ) -> Result<StoredObject, StoreError>;
    async fn delete(&self, location: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ActivityLog: Send + Sync + 'static {
    async fn append(&self, record: ActivityRecord) -> Result<(), StoreError>;
    async fn recent_for_project(
        &self,
        id: &ProjectId,
        limit: usize,
    ) -> Result<Vec<ActivityRecord>, StoreError>;
    async fn recent_for_user(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<ActivityRecord>, StoreError>;
    /// Cascade for project deletion.
    async fn prune_project(&self, id: &ProjectId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait IdentityStore: Send + Sync + 'static {
    async fn user_for_token(&self, token: &str) -> Result<Option<UserId>, StoreError>;
    async fn register_token(&self, token: &str, user: UserId) -> Result<(), StoreError>;
}

/// Human-readable size labels the way the file listing displays them.
#[must_use]
pub fn human_size_label(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
