//! Content-hash-keyed cache of AI-generated issue text.
//!
//! Rows are keyed by `(issue_id, kind)`; `input_hash` records the digest of the
//! description the content was generated from. A row is only served while the
//! current description still hashes to `input_hash`, and any description edit
//! deletes every row for the issue regardless of kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Which flavor of generated text a cache row holds.
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "ai_cache_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AiCacheKind {
    Summary,
    Suggestion,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct IssueAiCache {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub kind: AiCacheKind,
    pub content: String,
    pub input_hash: String,
    pub updated_at: DateTime<Utc>,
}

impl IssueAiCache {
    /// Look up an entry that is still valid for the given input hash.
    pub async fn find_valid(
        pool: &SqlitePool,
        issue_id: Uuid,
        kind: AiCacheKind,
        input_hash: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, IssueAiCache>(
            r#"SELECT id, issue_id, kind, content, input_hash, updated_at
               FROM issue_ai_cache
               WHERE issue_id = $1 AND kind = $2 AND input_hash = $3"#,
        )
        .bind(issue_id)
        .bind(kind)
        .bind(input_hash)
        .fetch_optional(pool)
        .await
    }

    /// Store freshly generated content, replacing whatever was cached for this
    /// `(issue_id, kind)` pair regardless of its previous hash.
    pub async fn upsert(
        pool: &SqlitePool,
        issue_id: Uuid,
        kind: AiCacheKind,
        content: &str,
        input_hash: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, IssueAiCache>(
            r#"INSERT INTO issue_ai_cache (id, issue_id, kind, content, input_hash)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT(issue_id, kind) DO UPDATE SET
                   content = excluded.content,
                   input_hash = excluded.input_hash,
                   updated_at = CURRENT_TIMESTAMP
               RETURNING id, issue_id, kind, content, input_hash, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(issue_id)
        .bind(kind)
        .bind(content)
        .bind(input_hash)
        .fetch_one(pool)
        .await
    }

    /// Drop every cached result for an issue, all kinds. Called whenever the
    /// issue description changes.
    pub async fn delete_by_issue_id(pool: &SqlitePool, issue_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM issue_ai_cache WHERE issue_id = $1")
            .bind(issue_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
