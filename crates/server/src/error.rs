use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use services::services::issue_assistant::IssueAssistantError;
use thiserror::Error;
use tracing::error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid or missing access token")]
    Unauthorized,
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited {
        /// Seconds until the caller's window resets.
        retry_after: i64,
    },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Assistant(#[from] IssueAssistantError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Assistant(e) => match e {
                IssueAssistantError::IssueNotFound | IssueAssistantError::ProjectNotFound => {
                    StatusCode::NOT_FOUND
                }
                IssueAssistantError::DescriptionTooShort
                | IssueAssistantError::NotEnoughComments => StatusCode::BAD_REQUEST,
                IssueAssistantError::Generator(_) => StatusCode::BAD_GATEWAY,
                IssueAssistantError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {}", self);
        }

        // Internal detail stays in the logs; clients get a generic message.
        let message = match &self {
            Self::Database(_) => "Internal server error".to_string(),
            Self::Assistant(IssueAssistantError::Database(_)) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (status, Json(ApiResponse::<()>::error(message))).into_response();

        if let Self::RateLimited { retry_after } = self
            && let Ok(value) = HeaderValue::from_str(&retry_after.max(0).to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }

        response
    }
}
