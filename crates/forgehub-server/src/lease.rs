//! The exclusive-edit lease: at most one member edits a project's file
//! set at a time. Checkout acquires, check-in releases and wholesale
//! replaces the files. Both transitions go through conditional store
//! updates; the lease is never read-then-written in separate steps.

use crate::store::{
    delete_objects_best_effort, ActivityLog, CheckinOutcome, CheckinUpdate, LeaseTransition,
    ObjectStoreBackend, ProjectStore, StoreError,
};
use chrono::{DateTime, Utc};
use forgehub_model::{ActivityAction, ActivityRecord, FileEntry, Project, ProjectId, UserId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug)]
pub enum LeaseError {
    NotFound,
    Forbidden(String),
    Conflict(String),
    Validation(String),
    Store(StoreError),
}

impl std::fmt::Display for LeaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "project not found"),
            Self::Forbidden(reason) => write!(f, "forbidden: {reason}"),
            Self::Conflict(reason) => write!(f, "conflict: {reason}"),
            Self::Validation(reason) => write!(f, "validation: {reason}"),
            Self::Store(e) => write!(f, "store failure: {e}"),
        }
    }
}

impl std::error::Error for LeaseError {}

impl From<StoreError> for LeaseError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// A file submitted with a check-in, before it has a storage location.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct LeaseManager {
    projects: Arc<dyn ProjectStore>,
    objects: Arc<dyn ObjectStoreBackend>,
    activity: Arc<dyn ActivityLog>,
}

impl LeaseManager {
    #[must_use]
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        objects: Arc<dyn ObjectStoreBackend>,
        activity: Arc<dyn ActivityLog>,
    ) -> Self {
        Self {
            projects,
            objects,
            activity,
        }
    }

    /// Acquire the lease for `user`. Membership is checked first; the
    /// acquire itself is a compare-and-swap at the store so two racing
    /// members cannot both win.
    pub async fn checkout(
        &self,
        project_id: &ProjectId,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Project, LeaseError> {
        let project = self
            .projects
            .get(project_id)
            .await?
            .ok_or(LeaseError::NotFound)?;
        if !project.is_member(user) {
            return Err(LeaseError::Forbidden(format!(
                "{user} is not a member of this project"
            )));
        }
        match self.projects.try_acquire_lease(project_id, user, now).await? {
            LeaseTransition::Acquired(project) => {
                info!(project = %project_id, user = %user, "checked out");
                self.record_activity(
                    ActivityRecord::new(user.clone(), project_id.clone(), ActivityAction::CheckedOut),
                )
                .await;
                Ok(project)
            }
            LeaseTransition::AlreadyHeld(holder) => Err(LeaseError::Conflict(format!(
                "already checked out by {holder}"
            ))),
            LeaseTransition::Missing => Err(LeaseError::NotFound),
        }
    }

    /// Release the lease. Permitted only to the current holder; requires
    /// a non-empty message. When `new_files` is supplied (an empty list
    /// counts as supplied) the file set is replaced entirely and the
    /// displaced blobs are deleted best-effort after the document update
    /// commits.
    #[allow(clippy::too_many_arguments)]
    pub async fn checkin(
        &self,
        project_id: &ProjectId,
        user: &UserId,
        message: &str,
        new_files: Option<Vec<IncomingFile>>,
        new_version: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Project, LeaseError> {
        let project = self
            .projects
            .get(project_id)
            .await?
            .ok_or(LeaseError::NotFound)?;
        let message = message.trim();
        if message.is_empty() {
            return Err(LeaseError::Validation(
                "check-in message must not be empty".to_string(),
            ));
        }
        if let Some(version) = &new_version {
            if version.trim().is_empty() {
                return Err(LeaseError::Validation(
                    "version must not be empty when supplied".to_string(),
                ));
            }
        }
        // Early holder check so non-holders never get blobs written; the
        // conditional update below is the authoritative one.
        match project.lease_holder() {
            Some(holder) if holder == user => {}
            Some(holder) => {
                return Err(LeaseError::Forbidden(format!(
                    "checked out by {holder}, not {user}"
                )));
            }
            None => {
                return Err(LeaseError::Forbidden(
                    "project is not checked out".to_string(),
                ));
            }
        }

        let uploaded = match new_files {
            Some(files) => Some(self.upload_files(project_id, user, files, now).await?),
            None => None,
        };
        // Uploads overwrite in place, so a resubmitted name shares its
        // location with the entry it displaces. The failure paths below
        // may only delete blobs the stored document does not reference.
        let orphaned_uploads: Vec<String> = uploaded
            .iter()
            .flatten()
            .map(|f| f.storage_location.clone())
            .filter(|loc| !project.files.iter().any(|f| &f.storage_location == loc))
            .collect();

        let outcome = self
            .projects
            .complete_checkin(
                project_id,
                user,
                CheckinUpdate {
                    new_files: uploaded,
                    new_version,
                    at: now,
                },
            )
            .await;
        match outcome {
            Ok(CheckinOutcome::Completed {
                project,
                replaced_files,
            }) => {
                // Same aliasing hazard here: a displaced entry whose name
                // survived into the new set points at the live blob.
                let kept: HashSet<&str> = project
                    .files
                    .iter()
                    .map(|f| f.storage_location.as_str())
                    .collect();
                let displaced: Vec<String> = replaced_files
                    .into_iter()
                    .map(|f| f.storage_location)
                    .filter(|loc| !kept.contains(loc.as_str()))
                    .collect();
                delete_objects_best_effort(self.objects.as_ref(), displaced).await;
                info!(project = %project_id, user = %user, "checked in");
                self.record_activity(
                    ActivityRecord::new(
                        user.clone(),
                        project_id.clone(),
                        ActivityAction::CheckedIn,
                    )
                    .with_message(message),
                )
                .await;
                Ok(project)
            }
            Ok(CheckinOutcome::NotHolder { holder }) => {
                // Lost a race since the precheck; the blobs written above
                // are now orphans and get cleaned up here.
                delete_objects_best_effort(self.objects.as_ref(), orphaned_uploads).await;
                Err(match holder {
                    Some(holder) => {
                        LeaseError::Forbidden(format!("checked out by {holder}, not {user}"))
                    }
                    None => LeaseError::Forbidden("project is not checked out".to_string()),
                })
            }
            Ok(CheckinOutcome::Missing) => {
                delete_objects_best_effort(self.objects.as_ref(), orphaned_uploads).await;
                Err(LeaseError::NotFound)
            }
            Err(e) => {
                delete_objects_best_effort(self.objects.as_ref(), orphaned_uploads).await;
                Err(LeaseError::Store(e))
            }
        }
    }

    async fn upload_files(
        &self,
        project_id: &ProjectId,
        user: &UserId,
        files: Vec<IncomingFile>,
        now: DateTime<Utc>,
    ) -> Result<Vec<FileEntry>, LeaseError> {
        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            match self.objects.put(project_id, &file.name, &file.bytes).await {
                Ok(stored) => entries.push(FileEntry {
                    name: file.name,
                    storage_location: stored.location,
                    size_label: stored.size_label,
                    uploaded_by: user.clone(),
                    uploaded_at: now,
                }),
                Err(e) => {
                    delete_objects_best_effort(
                        self.objects.as_ref(),
                        entries.into_iter().map(|f: FileEntry| f.storage_location),
                    )
                    .await;
                    return Err(LeaseError::Store(StoreError(format!(
                        "storing {} failed: {e}",
                        file.name
                    ))));
                }
            }
        }
        Ok(entries)
    }

    /// Activity is a side effect, never load-bearing for the transition.
    async fn record_activity(&self, record: ActivityRecord) {
        if let Err(e) = self.activity.append(record).await {
            warn!("activity append failed: {e}");
        }
    }
}
