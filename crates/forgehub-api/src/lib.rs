#![forbid(unsafe_code)]

pub mod dto;
pub mod errors;
pub mod params;

pub use dto::{
    activity_to_dto, project_to_dto, ActivityDto, FileEntryDto, LeaseDto, ProjectDto,
};
pub use errors::{ApiError, ApiErrorCode};
pub use params::{CreateProjectRequest, UpdateProjectRequest};

pub const CRATE_NAME: &str = "forgehub-api";
