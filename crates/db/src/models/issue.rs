use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "issue_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IssueStatus {
    #[default]
    Backlog,
    InProgress,
    Done,
}

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "issue_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IssuePriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Issue {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: IssueStatus,
    pub priority: IssuePriority,
    /// Board ordering within a status column; NULL means "never dragged".
    pub position: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateIssue {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
pub struct UpdateIssue {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
}

const ISSUE_COLUMNS: &str =
    "id, project_id, title, description, status, priority, position, created_at, updated_at";

impl Issue {
    pub async fn create(pool: &SqlitePool, data: &CreateIssue) -> Result<Self, sqlx::Error> {
        let status = data.status.clone().unwrap_or_default();
        let priority = data.priority.clone().unwrap_or_default();
        sqlx::query_as::<_, Issue>(&format!(
            r#"INSERT INTO issues (id, project_id, title, description, status, priority)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING {ISSUE_COLUMNS}"#,
        ))
        .bind(Uuid::new_v4())
        .bind(data.project_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(status)
        .bind(priority)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Issue>(&format!(
            r#"SELECT {ISSUE_COLUMNS} FROM issues WHERE id = $1"#,
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Issues for a project, dragged issues first in board order, the rest by
    /// recency.
    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Issue>(&format!(
            r#"SELECT {ISSUE_COLUMNS}
               FROM issues
               WHERE project_id = $1
               ORDER BY position IS NULL, position ASC, created_at DESC"#,
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        title: &str,
        description: Option<&str>,
        status: IssueStatus,
        priority: IssuePriority,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Issue>(&format!(
            r#"UPDATE issues
               SET title = $2, description = $3, status = $4, priority = $5,
                   updated_at = CURRENT_TIMESTAMP
               WHERE id = $1
               RETURNING {ISSUE_COLUMNS}"#,
        ))
        .bind(id)
        .bind(title)
        .bind(description)
        .bind(status)
        .bind(priority)
        .fetch_one(pool)
        .await
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: IssueStatus,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Issue>(&format!(
            r#"UPDATE issues
               SET status = $2, updated_at = CURRENT_TIMESTAMP
               WHERE id = $1
               RETURNING {ISSUE_COLUMNS}"#,
        ))
        .bind(id)
        .bind(status)
        .fetch_one(pool)
        .await
    }

    pub async fn update_position(
        pool: &SqlitePool,
        id: Uuid,
        position: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Issue>(&format!(
            r#"UPDATE issues
               SET position = $2, updated_at = CURRENT_TIMESTAMP
               WHERE id = $1
               RETURNING {ISSUE_COLUMNS}"#,
        ))
        .bind(id)
        .bind(position)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM issues WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
