use crate::ids::{ProjectId, UserId, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PROJECT_NAME_MAX_LEN: usize = 120;
pub const TAG_MAX_LEN: usize = 32;
pub const DESCRIPTION_MAX_LEN: usize = 4096;

/// One uploaded file as the project document references it. The byte
/// payload lives in object storage under `storage_location`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    pub name: String,
    pub storage_location: String,
    pub size_label: String,
    pub uploaded_by: UserId,
    pub uploaded_at: DateTime<Utc>,
}

/// The exclusive-edit lease. Absent means the project is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Lease {
    pub holder: UserId,
    pub acquired_at: DateTime<Utc>,
}

/// Owner-editable metadata, mutated independently of the lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectMetadata {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: String,
    pub creator: UserId,
    pub collaborators: Vec<UserId>,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub version: String,
    pub files: Vec<FileEntry>,
    pub lease: Option<Lease>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(
        id: ProjectId,
        metadata: ProjectMetadata,
        creator: UserId,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let metadata = validate_metadata(metadata)?;
        Ok(Self {
            id,
            name: metadata.name,
            description: metadata.description,
            creator,
            collaborators: Vec::new(),
            tags: metadata.tags,
            is_public: metadata.is_public,
            version: "0.1.0".to_string(),
            files: Vec::new(),
            lease: None,
            created_at: now,
            updated_at: now,
        })
    }

    #[must_use]
    pub fn is_owner(&self, user: &UserId) -> bool {
        self.creator == *user
    }

    /// Creator or collaborator. Checkout and check-in gate on this.
    #[must_use]
    pub fn is_member(&self, user: &UserId) -> bool {
        self.is_owner(user) || self.collaborators.contains(user)
    }

    #[must_use]
    pub fn lease_holder(&self) -> Option<&UserId> {
        self.lease.as_ref().map(|l| &l.holder)
    }

    pub fn add_collaborator(&mut self, user: UserId) -> Result<(), ValidationError> {
        if self.is_member(&user) {
            return Err(ValidationError(format!(
                "{user} is already a member of this project"
            )));
        }
        self.collaborators.push(user);
        Ok(())
    }

    pub fn remove_collaborator(&mut self, user: &UserId) -> Result<(), ValidationError> {
        let before = self.collaborators.len();
        self.collaborators.retain(|c| c != user);
        if self.collaborators.len() == before {
            return Err(ValidationError(format!("{user} is not a collaborator")));
        }
        Ok(())
    }

    /// Ownership transfer keeps the membership set intact: the new owner
    /// leaves the collaborator list and the previous owner joins it.
    pub fn transfer_ownership(&mut self, to: &UserId) -> Result<(), ValidationError> {
        if !self.collaborators.contains(to) {
            return Err(ValidationError(format!(
                "ownership can only transfer to an existing collaborator, {to} is not one"
            )));
        }
        self.collaborators.retain(|c| c != to);
        let previous = std::mem::replace(&mut self.creator, to.clone());
        self.collaborators.push(previous);
        Ok(())
    }

    pub fn apply_metadata(
        &mut self,
        metadata: ProjectMetadata,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        let metadata = validate_metadata(metadata)?;
        self.name = metadata.name;
        self.description = metadata.description;
        self.tags = metadata.tags;
        self.is_public = metadata.is_public;
        self.updated_at = now;
        Ok(())
    }
}

pub fn validate_metadata(metadata: ProjectMetadata) -> Result<ProjectMetadata, ValidationError> {
    let name = metadata.name.trim().to_string();
    if name.is_empty() {
        return Err(ValidationError("project name must not be empty".to_string()));
    }
    if name.len() > PROJECT_NAME_MAX_LEN {
        return Err(ValidationError(format!(
            "project name exceeds max length {PROJECT_NAME_MAX_LEN}"
        )));
    }
    if metadata.description.len() > DESCRIPTION_MAX_LEN {
        return Err(ValidationError(format!(
            "description exceeds max length {DESCRIPTION_MAX_LEN}"
        )));
    }
    let mut tags = Vec::new();
    for raw in &metadata.tags {
        let tag = raw.trim();
        if tag.is_empty() || tag.len() > TAG_MAX_LEN {
            return Err(ValidationError(format!("invalid tag: {raw:?}")));
        }
        if !tag
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ValidationError(format!(
                "tag must match [a-z0-9-]+: {raw:?}"
            )));
        }
        if !tags.contains(&tag.to_string()) {
            tags.push(tag.to_string());
        }
    }
    Ok(ProjectMetadata {
        name,
        description: metadata.description,
        tags,
        is_public: metadata.is_public,
    })
}
