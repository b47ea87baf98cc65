//! Count-keyed cache of AI discussion summaries.
//!
//! One row per issue. The row is valid while `comment_count` still equals the
//! issue's current comment count; creating or deleting a comment deletes the
//! row outright and the next request regenerates from scratch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, types::Json};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CommentSummary {
    pub issue_id: Uuid,
    pub summary: String,
    #[ts(type = "Array<string>")]
    pub key_decisions: Json<Vec<String>>,
    /// Number of comments the summary was generated from.
    pub comment_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl CommentSummary {
    pub async fn find_by_issue_id(
        pool: &SqlitePool,
        issue_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, CommentSummary>(
            r#"SELECT issue_id, summary, key_decisions, comment_count, updated_at
               FROM comment_summaries
               WHERE issue_id = $1"#,
        )
        .bind(issue_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn upsert(
        pool: &SqlitePool,
        issue_id: Uuid,
        summary: &str,
        key_decisions: &[String],
        comment_count: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, CommentSummary>(
            r#"INSERT INTO comment_summaries (issue_id, summary, key_decisions, comment_count)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT(issue_id) DO UPDATE SET
                   summary = excluded.summary,
                   key_decisions = excluded.key_decisions,
                   comment_count = excluded.comment_count,
                   updated_at = CURRENT_TIMESTAMP
               RETURNING issue_id, summary, key_decisions, comment_count, updated_at"#,
        )
        .bind(issue_id)
        .bind(summary)
        .bind(Json(key_decisions.to_vec()))
        .bind(comment_count)
        .fetch_one(pool)
        .await
    }

    pub async fn delete_by_issue_id(pool: &SqlitePool, issue_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comment_summaries WHERE issue_id = $1")
            .bind(issue_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
