#![forbid(unsafe_code)]

pub mod activity;
pub mod ids;
pub mod project;

pub use activity::{ActivityAction, ActivityRecord};
pub use ids::{parse_project_id, parse_user_id, ProjectId, UserId, ValidationError};
pub use project::{FileEntry, Lease, Project, ProjectMetadata};

pub const CRATE_NAME: &str = "forgehub-model";
