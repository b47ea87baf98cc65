use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use tracing::debug;

use crate::{AppState, error::ApiError};

/// The authenticated caller, extracted from a `Bearer` access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let claims = utils::auth::verify_token(token, &state.config.jwt_secret).map_err(|e| {
            debug!("token rejected: {}", e);
            ApiError::Unauthorized
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
        })
    }
}
