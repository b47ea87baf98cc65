use std::time::Duration;

use anyhow::Context;

/// Runtime configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared secret the auth provider signs access tokens with.
    pub jwt_secret: String,
    /// Max AI requests per user per window.
    pub ai_rate_limit_max_requests: u32,
    pub ai_rate_limit_window: Duration,
    /// How often expired rate limit windows are swept from memory.
    pub ai_rate_limit_sweep_interval: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env_parsed("PORT", 3001)?,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://issuedeck.db".to_string()),
            jwt_secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            ai_rate_limit_max_requests: env_parsed("AI_RATE_LIMIT_MAX_REQUESTS", 10)?,
            ai_rate_limit_window: Duration::from_secs(env_parsed(
                "AI_RATE_LIMIT_WINDOW_SECS",
                60,
            )?),
            ai_rate_limit_sweep_interval: Duration::from_secs(env_parsed(
                "AI_RATE_LIMIT_SWEEP_INTERVAL_SECS",
                300,
            )?),
        })
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {name}")),
        Err(_) => Ok(default),
    }
}
