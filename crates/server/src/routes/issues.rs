use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    ai_cache::IssueAiCache,
    issue::{CreateIssue, Issue, UpdateIssue},
    project::Project,
};
use tracing::info;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, auth::AuthUser, error::ApiError};

/// POST /api/issues
pub async fn create_issue(
    State(state): State<AppState>,
    _user: AuthUser,
    axum::Json(payload): axum::Json<CreateIssue>,
) -> Result<ResponseJson<ApiResponse<Issue>>, ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Issue title is required".to_string()));
    }

    Project::find_by_id(&state.db.pool, payload.project_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let issue = Issue::create(&state.db.pool, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(issue)))
}

/// GET /api/issues/{issue_id}
pub async fn get_issue(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(issue_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Issue>>, ApiError> {
    let issue = Issue::find_by_id(&state.db.pool, issue_id)
        .await?
        .ok_or(ApiError::NotFound("Issue"))?;
    Ok(ResponseJson(ApiResponse::success(issue)))
}

/// PUT /api/issues/{issue_id}
///
/// Fields omitted from the payload keep their current value. Editing the
/// description drops every cached AI result for the issue so the next AI
/// request regenerates from the new text.
pub async fn update_issue(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(issue_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateIssue>,
) -> Result<ResponseJson<ApiResponse<Issue>>, ApiError> {
    let existing = Issue::find_by_id(&state.db.pool, issue_id)
        .await?
        .ok_or(ApiError::NotFound("Issue"))?;

    let title = payload.title.unwrap_or_else(|| existing.title.clone());
    if title.trim().is_empty() {
        return Err(ApiError::BadRequest("Issue title is required".to_string()));
    }

    let description_changed = payload
        .description
        .as_ref()
        .is_some_and(|d| Some(d) != existing.description.as_ref());
    let description = payload.description.or_else(|| existing.description.clone());
    let status = payload.status.unwrap_or_else(|| existing.status.clone());
    let priority = payload.priority.unwrap_or_else(|| existing.priority.clone());

    let issue = Issue::update(
        &state.db.pool,
        issue_id,
        &title,
        description.as_deref(),
        status,
        priority,
    )
    .await?;

    if description_changed {
        let dropped = IssueAiCache::delete_by_issue_id(&state.db.pool, issue_id).await?;
        if dropped > 0 {
            info!(issue_id = %issue_id, dropped, "Dropped AI cache entries after description edit");
        }
    }

    Ok(ResponseJson(ApiResponse::success(issue)))
}

/// DELETE /api/issues/{issue_id}
pub async fn delete_issue(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(issue_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let deleted = Issue::delete(&state.db.pool, issue_id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("Issue"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/issues",
        Router::new().route("/", post(create_issue)).route(
            "/{issue_id}",
            get(get_issue).put(update_issue).delete(delete_issue),
        ),
    )
}
