pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use db::DBService;
use services::services::{issue_assistant::IssueAssistant, rate_limiter::RateLimiter};
use tower_http::cors::CorsLayer;

use crate::config::Config;

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
    pub assistant: Arc<IssueAssistant>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Arc<Config>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::router())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
