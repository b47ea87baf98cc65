use std::sync::Arc;

use anyhow::Context;
use db::DBService;
use server::{AppState, app, config::Config};
use services::services::{
    gemini_api::GeminiClient, issue_assistant::IssueAssistant, rate_limiter::RateLimiter,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(Config::from_env()?);
    let db = DBService::new(&config.database_url).await?;

    let generator = GeminiClient::from_env()?;
    let assistant = Arc::new(IssueAssistant::new(db.pool.clone(), Box::new(generator)));

    let rate_limiter = Arc::new(RateLimiter::new(
        config.ai_rate_limit_max_requests,
        config.ai_rate_limit_window,
    ));
    rate_limiter
        .clone()
        .spawn_sweeper(config.ai_rate_limit_sweep_interval);

    let state = AppState {
        db,
        assistant,
        rate_limiter,
        config: config.clone(),
    };

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {}", addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
