pub mod gemini_api;
pub mod issue_assistant;
pub mod rate_limiter;
