use crate::http::respond::{
    api_error_response, lease_error_to_api, make_request_id, propagated_request_id,
    with_request_id,
};
use crate::AppState;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use forgehub_api::{
    activity_to_dto, project_to_dto, ApiError, CreateProjectRequest, UpdateProjectRequest,
};
use forgehub_model::{
    ActivityAction, ActivityRecord, Project, ProjectId, ProjectMetadata, UserId,
};
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{error, info};

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("authorization")?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ").or_else(|| raw.strip_prefix("bearer "))?;
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Resolve the caller from the Authorization header. Credentials travel
/// explicitly with every request; there is no session state.
async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let Some(token) = bearer_token(headers) else {
        return Err(ApiError::unauthorized());
    };
    match state.identity.user_for_token(&token).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(ApiError::unauthorized()),
        Err(e) => {
            error!("identity lookup failed: {e}");
            Err(ApiError::internal("identity store failure"))
        }
    }
}

/// Like `require_user`, but a missing header is anonymous rather than an
/// error. A supplied-but-invalid token still fails.
async fn optional_user(state: &AppState, headers: &HeaderMap) -> Result<Option<UserId>, ApiError> {
    if bearer_token(headers).is_none() {
        return Ok(None);
    }
    require_user(state, headers).await.map(Some)
}

fn parse_project_path(raw: &str) -> Result<ProjectId, ApiError> {
    // Malformed ids cannot name an existing project.
    ProjectId::parse(raw).map_err(|_| ApiError::not_found("project", raw))
}

async fn load_project(state: &AppState, id: &ProjectId) -> Result<Project, ApiError> {
    match state.projects.get(id).await {
        Ok(Some(project)) => Ok(project),
        Ok(None) => Err(ApiError::not_found("project", id.as_str())),
        Err(e) => {
            error!("project load failed: {e}");
            Err(ApiError::internal("project store failure"))
        }
    }
}

fn current_metadata(project: &Project) -> ProjectMetadata {
    ProjectMetadata {
        name: project.name.clone(),
        description: project.description.clone(),
        tags: project.tags.clone(),
        is_public: project.is_public,
    }
}

async fn record_activity(state: &AppState, record: ActivityRecord) {
    if let Err(e) = state.activity.append(record).await {
        tracing::warn!("activity append failed: {e}");
    }
}

async fn finish(
    state: &AppState,
    route: &'static str,
    request_id: String,
    started: Instant,
    resp: Response,
) -> Response {
    state
        .metrics
        .observe_request(
            route,
            resp.status(),
            started.elapsed(),
            state.api.slow_request_threshold,
        )
        .await;
    with_request_id(resp, &request_id)
}

fn project_envelope(status: StatusCode, project: &Project) -> Response {
    (status, Json(json!({"project": project_to_dto(project)}))).into_response()
}

pub(crate) async fn healthz_handler(State(state): State<AppState>) -> impl IntoResponse {
    let request_id = make_request_id(&state);
    let started = Instant::now();
    let resp = (StatusCode::OK, "ok").into_response();
    finish(&state, "/healthz", request_id, started, resp).await
}

pub(crate) async fn readyz_handler(State(state): State<AppState>) -> impl IntoResponse {
    let request_id = make_request_id(&state);
    let started = Instant::now();
    let resp = if state.ready.load(Ordering::Relaxed) {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    };
    finish(&state, "/readyz", request_id, started, resp).await
}

pub(crate) async fn version_handler(State(state): State<AppState>) -> impl IntoResponse {
    let request_id = make_request_id(&state);
    let started = Instant::now();
    let resp = Json(json!({
        "server": {
            "crate": crate::CRATE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "config_schema_version": crate::config::CONFIG_SCHEMA_VERSION,
        }
    }))
    .into_response();
    finish(&state, "/v1/version", request_id, started, resp).await
}

pub(crate) async fn create_project_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateProjectRequest>,
) -> impl IntoResponse {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let resp = create_project(&state, &headers, body).await;
    let resp = resp.unwrap_or_else(api_error_response);
    finish(&state, "/v1/projects", request_id, started, resp).await
}

async fn create_project(
    state: &AppState,
    headers: &HeaderMap,
    body: CreateProjectRequest,
) -> Result<Response, ApiError> {
    let user = require_user(state, headers).await?;
    let metadata = body.into_metadata()?;
    let now = Utc::now();
    let project = Project::new(ProjectId::random(), metadata, user.clone(), now)
        .map_err(|e| ApiError::validation_failed("project", &e.0))?;
    state.projects.insert(project.clone()).await.map_err(|e| {
        error!("project insert failed: {e}");
        ApiError::internal("project store failure")
    })?;
    info!(project = %project.id, user = %user, "project created");
    record_activity(
        state,
        ActivityRecord::new(user, project.id.clone(), ActivityAction::CreatedProject),
    )
    .await;
    Ok(project_envelope(StatusCode::CREATED, &project))
}

pub(crate) async fn list_projects_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let resp = list_projects(&state, &headers)
        .await
        .unwrap_or_else(api_error_response);
    finish(&state, "/v1/projects", request_id, started, resp).await
}

async fn list_projects(state: &AppState, headers: &HeaderMap) -> Result<Response, ApiError> {
    let caller = optional_user(state, headers).await?;
    let projects = state.projects.list().await.map_err(|e| {
        error!("project list failed: {e}");
        ApiError::internal("project store failure")
    })?;
    let visible: Vec<_> = projects
        .iter()
        .filter(|p| p.is_public || caller.as_ref().is_some_and(|u| p.is_member(u)))
        .map(project_to_dto)
        .collect();
    Ok(Json(json!({"projects": visible})).into_response())
}

pub(crate) async fn get_project_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let resp = get_project(&state, &headers, &id)
        .await
        .unwrap_or_else(api_error_response);
    finish(&state, "/v1/projects/{id}", request_id, started, resp).await
}

async fn get_project(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: &str,
) -> Result<Response, ApiError> {
    let id = parse_project_path(raw_id)?;
    let project = load_project(state, &id).await?;
    if !project.is_public {
        let caller = optional_user(state, headers).await?;
        match caller {
            Some(user) if project.is_member(&user) => {}
            Some(_) => return Err(ApiError::forbidden("private project, members only")),
            None => return Err(ApiError::unauthorized()),
        }
    }
    Ok(project_envelope(StatusCode::OK, &project))
}

pub(crate) async fn update_project_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<UpdateProjectRequest>,
) -> impl IntoResponse {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let resp = update_project(&state, &headers, &id, body)
        .await
        .unwrap_or_else(api_error_response);
    finish(&state, "/v1/projects/{id}", request_id, started, resp).await
}

async fn update_project(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: &str,
    body: UpdateProjectRequest,
) -> Result<Response, ApiError> {
    let user = require_user(state, headers).await?;
    let id = parse_project_path(raw_id)?;
    let mut project = load_project(state, &id).await?;
    if !project.is_owner(&user) {
        return Err(ApiError::forbidden("only the owner may edit metadata"));
    }
    // Metadata edits never touch the lease or the file set.
    let metadata = body.apply_to(&current_metadata(&project))?;
    project
        .apply_metadata(metadata, Utc::now())
        .map_err(|e| ApiError::validation_failed("project", &e.0))?;
    state.projects.update(project.clone()).await.map_err(|e| {
        error!("project update failed: {e}");
        ApiError::internal("project store failure")
    })?;
    record_activity(
        state,
        ActivityRecord::new(user, id, ActivityAction::UpdatedProject),
    )
    .await;
    Ok(project_envelope(StatusCode::OK, &project))
}

pub(crate) async fn delete_project_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let resp = delete_project(&state, &headers, &id)
        .await
        .unwrap_or_else(api_error_response);
    finish(&state, "/v1/projects/{id}", request_id, started, resp).await
}

async fn delete_project(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: &str,
) -> Result<Response, ApiError> {
    let user = require_user(state, headers).await?;
    let id = parse_project_path(raw_id)?;
    let project = load_project(state, &id).await?;
    if !project.is_owner(&user) {
        return Err(ApiError::forbidden("only the owner may delete the project"));
    }
    let removed = state.projects.remove(&id).await.map_err(|e| {
        error!("project delete failed: {e}");
        ApiError::internal("project store failure")
    })?;
    let Some(removed) = removed else {
        return Err(ApiError::not_found("project", id.as_str()));
    };
    crate::store::delete_objects_best_effort(
        state.objects.as_ref(),
        removed.files.into_iter().map(|f| f.storage_location),
    )
    .await;
    // Deletion cascades to the feed; emitting a record for the deleted
    // project here would undo the prune.
    if let Err(e) = state.activity.prune_project(&id).await {
        tracing::warn!("activity prune failed: {e}");
    }
    info!(project = %id, user = %user, "project deleted");
    Ok(Json(json!({"deleted": true})).into_response())
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CollaboratorBody {
    user: String,
}

pub(crate) async fn add_collaborator_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CollaboratorBody>,
) -> impl IntoResponse {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let resp = add_collaborator(&state, &headers, &id, &body.user)
        .await
        .unwrap_or_else(api_error_response);
    finish(
        &state,
        "/v1/projects/{id}/collaborators",
        request_id,
        started,
        resp,
    )
    .await
}

async fn add_collaborator(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: &str,
    raw_user: &str,
) -> Result<Response, ApiError> {
    let caller = require_user(state, headers).await?;
    let id = parse_project_path(raw_id)?;
    let collaborator =
        UserId::parse(raw_user).map_err(|e| ApiError::validation_failed("user", &e.0))?;
    let mut project = load_project(state, &id).await?;
    if !project.is_owner(&caller) {
        return Err(ApiError::forbidden("only the owner may add collaborators"));
    }
    project
        .add_collaborator(collaborator.clone())
        .map_err(|e| ApiError::validation_failed("user", &e.0))?;
    project.updated_at = Utc::now();
    state.projects.update(project.clone()).await.map_err(|e| {
        error!("project update failed: {e}");
        ApiError::internal("project store failure")
    })?;
    record_activity(
        state,
        ActivityRecord::new(caller, id, ActivityAction::AddedCollaborator)
            .with_message(collaborator.as_str()),
    )
    .await;
    Ok(project_envelope(StatusCode::OK, &project))
}

pub(crate) async fn remove_collaborator_handler(
    State(state): State<AppState>,
    Path((id, user)): Path<(String, String)>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let resp = remove_collaborator(&state, &headers, &id, &user)
        .await
        .unwrap_or_else(api_error_response);
    finish(
        &state,
        "/v1/projects/{id}/collaborators/{user}",
        request_id,
        started,
        resp,
    )
    .await
}

async fn remove_collaborator(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: &str,
    raw_user: &str,
) -> Result<Response, ApiError> {
    let caller = require_user(state, headers).await?;
    let id = parse_project_path(raw_id)?;
    let collaborator =
        UserId::parse(raw_user).map_err(|e| ApiError::validation_failed("user", &e.0))?;
    let mut project = load_project(state, &id).await?;
    if !project.is_owner(&caller) {
        return Err(ApiError::forbidden(
            "only the owner may remove collaborators",
        ));
    }
    if project.lease_holder() == Some(&collaborator) {
        return Err(ApiError::conflict(
            "collaborator holds the edit lease; wait for check-in",
        ));
    }
    project
        .remove_collaborator(&collaborator)
        .map_err(|e| ApiError::validation_failed("user", &e.0))?;
    project.updated_at = Utc::now();
    state.projects.update(project.clone()).await.map_err(|e| {
        error!("project update failed: {e}");
        ApiError::internal("project store failure")
    })?;
    record_activity(
        state,
        ActivityRecord::new(caller, id, ActivityAction::RemovedCollaborator)
            .with_message(collaborator.as_str()),
    )
    .await;
    Ok(project_envelope(StatusCode::OK, &project))
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TransferBody {
    to: String,
}

pub(crate) async fn transfer_ownership_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<TransferBody>,
) -> impl IntoResponse {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let resp = transfer_ownership(&state, &headers, &id, &body.to)
        .await
        .unwrap_or_else(api_error_response);
    finish(
        &state,
        "/v1/projects/{id}/transfer",
        request_id,
        started,
        resp,
    )
    .await
}

async fn transfer_ownership(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: &str,
    raw_to: &str,
) -> Result<Response, ApiError> {
    let caller = require_user(state, headers).await?;
    let id = parse_project_path(raw_id)?;
    let to = UserId::parse(raw_to).map_err(|e| ApiError::validation_failed("to", &e.0))?;
    let mut project = load_project(state, &id).await?;
    if !project.is_owner(&caller) {
        return Err(ApiError::forbidden("only the owner may transfer ownership"));
    }
    project
        .transfer_ownership(&to)
        .map_err(|e| ApiError::validation_failed("to", &e.0))?;
    project.updated_at = Utc::now();
    state.projects.update(project.clone()).await.map_err(|e| {
        error!("project update failed: {e}");
        ApiError::internal("project store failure")
    })?;
    info!(project = %id, from = %caller, to = %to, "ownership transferred");
    record_activity(
        state,
        ActivityRecord::new(caller, id, ActivityAction::TransferredOwnership)
            .with_message(to.as_str()),
    )
    .await;
    Ok(project_envelope(StatusCode::OK, &project))
}

pub(crate) async fn checkout_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let resp = checkout(&state, &headers, &id)
        .await
        .unwrap_or_else(api_error_response);
    finish(
        &state,
        "/v1/projects/{id}/checkout",
        request_id,
        started,
        resp,
    )
    .await
}

async fn checkout(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: &str,
) -> Result<Response, ApiError> {
    let user = require_user(state, headers).await?;
    let id = parse_project_path(raw_id)?;
    let project = state
        .lease
        .checkout(&id, &user, Utc::now())
        .await
        .map_err(|e| lease_error_to_api(e, id.as_str()))?;
    Ok(project_envelope(StatusCode::OK, &project))
}

pub(crate) async fn checkin_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> impl IntoResponse {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let resp = checkin(&state, &headers, &id, multipart)
        .await
        .unwrap_or_else(api_error_response);
    finish(
        &state,
        "/v1/projects/{id}/checkin",
        request_id,
        started,
        resp,
    )
    .await
}

async fn checkin(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: &str,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let user = require_user(state, headers).await?;
    let id = parse_project_path(raw_id)?;

    let mut message: Option<String> = None;
    let mut version: Option<String> = None;
    let mut files: Option<Vec<crate::lease::IncomingFile>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_failed("multipart", &e.to_string()))?
    {
        match field.name() {
            Some("message") => {
                message = Some(field.text().await.map_err(|e| {
                    ApiError::validation_failed("message", &e.to_string())
                })?);
            }
            Some("version") => {
                version = Some(field.text().await.map_err(|e| {
                    ApiError::validation_failed("version", &e.to_string())
                })?);
            }
            Some("files") => {
                let name = field
                    .file_name()
                    .map(std::string::ToString::to_string)
                    .ok_or_else(|| {
                        ApiError::validation_failed("files", "file part requires a filename")
                    })?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::payload_too_large(state.api.max_body_bytes))?;
                if bytes.len() > state.api.max_file_bytes {
                    return Err(ApiError::payload_too_large(state.api.max_file_bytes));
                }
                let list = files.get_or_insert_with(Vec::new);
                if list.len() >= state.api.max_files_per_checkin {
                    return Err(ApiError::validation_failed(
                        "files",
                        "too many files in one check-in",
                    ));
                }
                list.push(crate::lease::IncomingFile {
                    name,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {
                return Err(ApiError::validation_failed(
                    "multipart",
                    "unexpected field; expected message, version, or files",
                ));
            }
        }
    }
    let Some(message) = message else {
        return Err(ApiError::validation_failed(
            "message",
            "check-in message is required",
        ));
    };

    let project = state
        .lease
        .checkin(&id, &user, &message, files, version, Utc::now())
        .await
        .map_err(|e| lease_error_to_api(e, id.as_str()))?;
    Ok(project_envelope(StatusCode::OK, &project))
}

pub(crate) async fn project_activity_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let request_id = propagated_request_id(&headers, &state);
    let started = Instant::now();
    let resp = project_activity(&state, &headers, &id)
        .await
        .unwrap_or_else(api_error_response);
    finish(
        &state,
        "/v1/projects/{id}/activity",
        request_id,
        started,
        resp,
    )
    .await
}

async fn project_activity(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: &str,
) -> Result<Response, ApiError> {
    let id = parse_project_path(raw_id)?;
    let project = load_project(state, &id).await?;
    if !project.is_public {
        let caller = optional_user(state, headers).await?;
        match caller {
            Some(user) if project.is_member(&user) => {}
            Some(_) => return Err(ApiError::forbidden("private project, members only")),
            None => return Err(ApiError::unauthorized()),
        }
    }
    let records = state
        .activity
        .recent_for_project(&id, state.api.activity_feed_limit)
        .await
        .map_err(|e| {
            error!("activity read failed: {e}");
            ApiError::internal("activity store failure")
        })?;
    let feed: Vec<_> = records.iter().map(activity_to_dto).collect();
    Ok(Json(json!({"activity": feed})).into_response())
}
