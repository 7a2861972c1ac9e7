use crate::errors::ApiError;
use forgehub_model::project::{validate_metadata, ProjectMetadata};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

impl CreateProjectRequest {
    pub fn into_metadata(self) -> Result<ProjectMetadata, ApiError> {
        validate_metadata(ProjectMetadata {
            name: self.name,
            description: self.description,
            tags: self.tags,
            is_public: self.is_public,
        })
        .map_err(|e| ApiError::validation_failed("project", &e.0))
    }
}

/// Partial metadata edit. Absent fields keep their current values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
}

impl UpdateProjectRequest {
    pub fn apply_to(self, current: &ProjectMetadata) -> Result<ProjectMetadata, ApiError> {
        validate_metadata(ProjectMetadata {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            description: self
                .description
                .unwrap_or_else(|| current.description.clone()),
            tags: self.tags.unwrap_or_else(|| current.tags.clone()),
            is_public: self.is_public.unwrap_or(current.is_public),
        })
        .map_err(|e| ApiError::validation_failed("project", &e.0))
    }
}
