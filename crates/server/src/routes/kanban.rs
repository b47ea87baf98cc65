use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, patch},
};
use db::models::{
    issue::{Issue, IssueStatus},
    project::Project,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, auth::AuthUser, error::ApiError};

/// A project's issues grouped into board columns.
#[derive(Debug, Serialize, TS)]
pub struct Board {
    pub backlog: Vec<Issue>,
    pub inprogress: Vec<Issue>,
    pub done: Vec<Issue>,
}

impl Board {
    fn from_issues(issues: Vec<Issue>) -> Self {
        let mut board = Self {
            backlog: Vec::new(),
            inprogress: Vec::new(),
            done: Vec::new(),
        };
        for issue in issues {
            match issue.status {
                IssueStatus::Backlog => board.backlog.push(issue),
                IssueStatus::InProgress => board.inprogress.push(issue),
                IssueStatus::Done => board.done.push(issue),
            }
        }
        board
    }
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateIssueStatus {
    pub status: IssueStatus,
}

#[derive(Debug, Deserialize, TS)]
pub struct UpdateIssuePosition {
    pub position: i64,
}

/// GET /api/projects/{project_id}/board
pub async fn get_board(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Board>>, ApiError> {
    Project::find_by_id(&state.db.pool, project_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;

    let issues = Issue::find_by_project_id(&state.db.pool, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(Board::from_issues(
        issues,
    ))))
}

/// PATCH /api/issues/{issue_id}/status
pub async fn update_status(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(issue_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateIssueStatus>,
) -> Result<ResponseJson<ApiResponse<Issue>>, ApiError> {
    Issue::find_by_id(&state.db.pool, issue_id)
        .await?
        .ok_or(ApiError::NotFound("Issue"))?;

    let issue = Issue::update_status(&state.db.pool, issue_id, payload.status).await?;
    Ok(ResponseJson(ApiResponse::success(issue)))
}

/// PATCH /api/issues/{issue_id}/position
pub async fn update_position(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(issue_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateIssuePosition>,
) -> Result<ResponseJson<ApiResponse<Issue>>, ApiError> {
    if payload.position < 0 {
        return Err(ApiError::BadRequest(
            "Position must be non-negative".to_string(),
        ));
    }

    Issue::find_by_id(&state.db.pool, issue_id)
        .await?
        .ok_or(ApiError::NotFound("Issue"))?;

    let issue = Issue::update_position(&state.db.pool, issue_id, payload.position).await?;
    Ok(ResponseJson(ApiResponse::success(issue)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects/{project_id}/board", get(get_board))
        .route("/issues/{issue_id}/status", patch(update_status))
        .route("/issues/{issue_id}/position", patch(update_position))
}
