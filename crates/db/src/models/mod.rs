pub mod ai_cache;
pub mod comment;
pub mod comment_summary;
pub mod issue;
pub mod project;
