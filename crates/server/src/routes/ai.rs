//! AI endpoints. Every route here authenticates the caller, spends one unit
//! of their rate limit quota, and reports the remaining quota in response
//! headers.

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue},
    response::Json as ResponseJson,
    routing::post,
};
use chrono::Utc;
use db::models::issue::Issue;
use serde::Deserialize;
use services::services::issue_assistant::{
    AiText, DiscussionSummary, DuplicateMatch, IssueAssistantError, MIN_DESCRIPTION_LENGTH,
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, auth::AuthUser, error::ApiError};

#[derive(Debug, Deserialize, TS)]
pub struct IssueDraft {
    pub title: String,
    pub description: Option<String>,
}

/// Spend one unit of the caller's quota, or reject with 429. On success,
/// returns the rate limit headers to attach to the response.
fn consume_quota(state: &AppState, user: &AuthUser) -> Result<HeaderMap, ApiError> {
    let limiter = &state.rate_limiter;

    if !limiter.check_and_consume(&user.user_id) {
        let retry_after = (limiter.window_reset_at(&user.user_id) - Utc::now()).num_seconds();
        return Err(ApiError::RateLimited { retry_after });
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        "x-ratelimit-remaining",
        HeaderValue::from(limiter.remaining_requests(&user.user_id)),
    );
    let reset = limiter.window_reset_at(&user.user_id).timestamp();
    if let Ok(value) = HeaderValue::from_str(&reset.to_string()) {
        headers.insert("x-ratelimit-reset", value);
    }
    Ok(headers)
}

/// Reject issues whose description is too short to summarize before any quota
/// is spent on them. The assistant applies the same rule again internally.
async fn ensure_description_long_enough(
    state: &AppState,
    issue_id: Uuid,
) -> Result<(), ApiError> {
    let issue = Issue::find_by_id(&state.db.pool, issue_id)
        .await?
        .ok_or(ApiError::NotFound("Issue"))?;
    let length = issue.description.as_deref().map_or(0, |d| d.chars().count());
    if length <= MIN_DESCRIPTION_LENGTH {
        return Err(ApiError::Assistant(
            IssueAssistantError::DescriptionTooShort,
        ));
    }
    Ok(())
}

/// POST /api/issues/{issue_id}/ai/summarize
pub async fn summarize_issue(
    State(state): State<AppState>,
    user: AuthUser,
    Path(issue_id): Path<Uuid>,
) -> Result<(HeaderMap, ResponseJson<ApiResponse<AiText>>), ApiError> {
    ensure_description_long_enough(&state, issue_id).await?;
    let headers = consume_quota(&state, &user)?;
    let summary = state.assistant.summarize_issue(issue_id).await?;
    Ok((headers, ResponseJson(ApiResponse::success(summary))))
}

/// POST /api/issues/{issue_id}/ai/suggest
pub async fn suggest_solutions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(issue_id): Path<Uuid>,
) -> Result<(HeaderMap, ResponseJson<ApiResponse<AiText>>), ApiError> {
    ensure_description_long_enough(&state, issue_id).await?;
    let headers = consume_quota(&state, &user)?;
    let suggestion = state.assistant.suggest_solutions(issue_id).await?;
    Ok((headers, ResponseJson(ApiResponse::success(suggestion))))
}

/// POST /api/issues/{issue_id}/ai/summarize-comments
pub async fn summarize_comments(
    State(state): State<AppState>,
    user: AuthUser,
    Path(issue_id): Path<Uuid>,
) -> Result<(HeaderMap, ResponseJson<ApiResponse<DiscussionSummary>>), ApiError> {
    let headers = consume_quota(&state, &user)?;
    let summary = state.assistant.summarize_discussion(issue_id).await?;
    Ok((headers, ResponseJson(ApiResponse::success(summary))))
}

/// POST /api/ai/suggest-labels
pub async fn suggest_labels(
    State(state): State<AppState>,
    user: AuthUser,
    axum::Json(draft): axum::Json<IssueDraft>,
) -> Result<(HeaderMap, ResponseJson<ApiResponse<Vec<String>>>), ApiError> {
    let headers = consume_quota(&state, &user)?;
    let labels = state
        .assistant
        .suggest_labels(&draft.title, draft.description.as_deref())
        .await?;
    Ok((headers, ResponseJson(ApiResponse::success(labels))))
}

/// POST /api/projects/{project_id}/ai/detect-duplicates
pub async fn detect_duplicates(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<Uuid>,
    axum::Json(draft): axum::Json<IssueDraft>,
) -> Result<(HeaderMap, ResponseJson<ApiResponse<Vec<DuplicateMatch>>>), ApiError> {
    let headers = consume_quota(&state, &user)?;
    let matches = state
        .assistant
        .detect_duplicates(project_id, &draft.title, draft.description.as_deref())
        .await?;
    Ok((headers, ResponseJson(ApiResponse::success(matches))))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/issues/{issue_id}/ai/summarize", post(summarize_issue))
        .route("/issues/{issue_id}/ai/suggest", post(suggest_solutions))
        .route(
            "/issues/{issue_id}/ai/summarize-comments",
            post(summarize_comments),
        )
        .route("/ai/suggest-labels", post(suggest_labels))
        .route(
            "/projects/{project_id}/ai/detect-duplicates",
            post(detect_duplicates),
        )
}
