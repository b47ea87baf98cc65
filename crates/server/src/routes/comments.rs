use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::models::{comment::Comment, comment_summary::CommentSummary, issue::Issue};
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, auth::AuthUser, error::ApiError};

pub const COMMENT_CONTENT_MAX: usize = 1000;

#[derive(Debug, Deserialize, TS)]
pub struct CreateComment {
    pub content: String,
}

/// POST /api/issues/{issue_id}/comments
pub async fn create_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(issue_id): Path<Uuid>,
    axum::Json(payload): axum::Json<CreateComment>,
) -> Result<ResponseJson<ApiResponse<Comment>>, ApiError> {
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest(
            "Comment content is required".to_string(),
        ));
    }
    if content.chars().count() > COMMENT_CONTENT_MAX {
        return Err(ApiError::BadRequest(format!(
            "Comment content must be at most {COMMENT_CONTENT_MAX} characters"
        )));
    }

    Issue::find_by_id(&state.db.pool, issue_id)
        .await?
        .ok_or(ApiError::NotFound("Issue"))?;

    let comment = Comment::create(&state.db.pool, issue_id, &user.user_id, content).await?;

    // The comment count changed, so any cached discussion summary is stale.
    CommentSummary::delete_by_issue_id(&state.db.pool, issue_id).await?;

    Ok(ResponseJson(ApiResponse::success(comment)))
}

/// GET /api/issues/{issue_id}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(issue_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Comment>>>, ApiError> {
    Issue::find_by_id(&state.db.pool, issue_id)
        .await?
        .ok_or(ApiError::NotFound("Issue"))?;

    let comments = Comment::find_by_issue_id(&state.db.pool, issue_id).await?;
    Ok(ResponseJson(ApiResponse::success(comments)))
}

/// DELETE /api/comments/{comment_id}
pub async fn delete_comment(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(comment_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let comment = Comment::find_by_id(&state.db.pool, comment_id)
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;

    Comment::delete(&state.db.pool, comment_id).await?;
    CommentSummary::delete_by_issue_id(&state.db.pool, comment.issue_id).await?;

    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/issues/{issue_id}/comments",
            get(list_comments).post(create_comment),
        )
        .route("/comments/{comment_id}", delete(delete_comment))
}
