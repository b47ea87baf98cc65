pub mod ai;
pub mod comments;
pub mod issues;
pub mod kanban;
pub mod projects;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(projects::router())
        .merge(issues::router())
        .merge(comments::router())
        .merge(kanban::router())
        .merge(ai::router())
}
