// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use forgehub_model::{ActivityRecord, FileEntry, Lease, Project};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileEntryDto {
    pub name: String,
    pub storage_location: String,
    pub size_label: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeaseDto {
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectDto {
    pub id: String,
    pub name: String,
    pub description: String,
    pub creator: String,
    pub collaborators: Vec<String>,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub version: String,
    pub files: Vec<FileEntryDto>,
    pub lease: Option<LeaseDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivityDto {
    pub user: String,
    pub project: String,
    pub action: String,
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

fn file_to_dto(file: &FileEntry) -> FileEntryDto {
    FileEntryDto {
        name: file.name.clone(),
        storage_location: file.storage_location.clone(),
        size_label: file.size_label.clone(),
        uploaded_by: file.uploaded_by.as_str().to_string(),
        uploaded_at: file.uploaded_at,
    }
}

fn lease_to_dto(lease: &Lease) -> LeaseDto {
    LeaseDto {
        holder: lease.holder.as_str().to_string(),
        acquired_at: lease.acquired_at,
    }
}

#[must_use]
pub fn project_to_dto(project: &Project) -> ProjectDto {
    ProjectDto {
        id: project.id.as_str().to_string(),
        name: project.name.clone(),
        description: project.description.clone(),
        creator: project.creator.as_str().to_string(),
        collaborators: project
            .collaborators
            .iter()
            .map(|c| c.as_str().to_string())
            .collect(),
        tags: project.tags.clone(),
        is_public: project.is_public,
        version: project.version.clone(),
        files: project.files.iter().map(file_to_dto).collect(),
        lease: project.lease.as_ref().map(lease_to_dto),
        created_at: project.created_at,
        updated_at: project.updated_at,
    }
}

#[must_use]
pub fn activity_to_dto(record: &ActivityRecord) -> ActivityDto {
    ActivityDto {
        user: record.user.as_str().to_string(),
        project: record.project.as_str().to_string(),
        action: record.action.as_str().to_string(),
        message: record.message.clone(),
        at: record.at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use forgehub_model::{ProjectId, ProjectMetadata, UserId};

    #[test]
    fn project_dto_preserves_lease_and_file_order() {
        let alice = UserId::parse("alice").expect("handle");
        let mut p = Project::new(
            ProjectId::random(),
            ProjectMetadata {
                name: "demo".to_string(),
                description: String::new(),
                tags: vec![],
                is_public: true,
            },
            alice.clone(),
            Utc::now(),
        )
        .expect("project");
        p.lease = Some(Lease {
            holder: alice.clone(),
            acquired_at: Utc::now(),
        });
        p.files = vec![
            FileEntry {
                name: "b.txt".to_string(),
                storage_location: "p/b.txt".to_string(),
                size_label: "1 KB".to_string(),
                uploaded_by: alice.clone(),
                uploaded_at: Utc::now(),
            },
            FileEntry {
                name: "a.txt".to_string(),
                storage_location: "p/a.txt".to_string(),
                size_label: "2 KB".to_string(),
                uploaded_by: alice,
                uploaded_at: Utc::now(),
            },
        ];
        let dto = project_to_dto(&p);
        assert_eq!(dto.lease.as_ref().map(|l| l.holder.as_str()), Some("alice"));
        let names: Vec<_> = dto.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
    }
}
