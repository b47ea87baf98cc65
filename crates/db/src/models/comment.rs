use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Comment {
    pub id: Uuid,
    pub issue_id: Uuid,
    /// User id from the auth provider; user profiles live outside this service.
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub async fn create(
        pool: &SqlitePool,
        issue_id: Uuid,
        author_id: &str,
        content: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"INSERT INTO comments (id, issue_id, author_id, content)
               VALUES ($1, $2, $3, $4)
               RETURNING id, issue_id, author_id, content, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(issue_id)
        .bind(author_id)
        .bind(content)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"SELECT id, issue_id, author_id, content, created_at
               FROM comments
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Comments in discussion order (oldest first).
    pub async fn find_by_issue_id(
        pool: &SqlitePool,
        issue_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Comment>(
            r#"SELECT id, issue_id, author_id, content, created_at
               FROM comments
               WHERE issue_id = $1
               ORDER BY created_at ASC"#,
        )
        .bind(issue_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count_by_issue_id(pool: &SqlitePool, issue_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE issue_id = $1")
            .bind(issue_id)
            .fetch_one(pool)
            .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
