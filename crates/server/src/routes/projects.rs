use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    issue::Issue,
    project::{CreateProject, Project},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, auth::AuthUser, error::ApiError};

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    _user: AuthUser,
    axum::Json(payload): axum::Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Project name is required".to_string()));
    }

    let project = Project::create(&state.db.pool, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

/// GET /api/projects
pub async fn list_projects(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = Project::find_all(&state.db.pool).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

/// GET /api/projects/{project_id}
pub async fn get_project(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = Project::find_by_id(&state.db.pool, project_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

/// GET /api/projects/{project_id}/issues
pub async fn list_project_issues(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Issue>>>, ApiError> {
    Project::find_by_id(&state.db.pool, project_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let issues = Issue::find_by_project_id(&state.db.pool, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(issues)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/projects",
        Router::new()
            .route("/", get(list_projects).post(create_project))
            .route("/{project_id}", get(get_project))
            .route("/{project_id}/issues", get(list_project_issues)),
    )
}
