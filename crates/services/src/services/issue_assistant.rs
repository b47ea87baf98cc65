//! AI-assisted issue authoring: summaries, solution suggestions, label
//! suggestions, duplicate detection and discussion summaries.
//!
//! Generated text is advisory, so caching tolerates staleness of at most one
//! edit: summary/suggestion results are cached per issue keyed by a hash of the
//! description, discussion summaries are cached per issue keyed by the comment
//! count at generation time.

use db::models::{
    ai_cache::{AiCacheKind, IssueAiCache},
    comment::Comment,
    comment_summary::CommentSummary,
    issue::Issue,
    project::Project,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::gemini_api::{GeminiApiError, TextGenerator, extract_json};

/// Descriptions at or below this length carry too little context to summarize.
pub const MIN_DESCRIPTION_LENGTH: usize = 10;
/// Minimum discussion size before a comment summary can be generated.
pub const MIN_COMMENTS_FOR_SUMMARY: i64 = 5;
/// At most this many labels are suggested per issue.
pub const MAX_SUGGESTED_LABELS: usize = 3;

const MIN_DUPLICATE_SIMILARITY: f64 = 50.0;
const MAX_DUPLICATE_MATCHES: usize = 3;

#[derive(Debug, Error)]
pub enum IssueAssistantError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("generation service error: {0}")]
    Generator(#[from] GeminiApiError),
    #[error("issue not found")]
    IssueNotFound,
    #[error("project not found")]
    ProjectNotFound,
    #[error("Description must be more than {MIN_DESCRIPTION_LENGTH} characters to generate AI results")]
    DescriptionTooShort,
    #[error("At least {MIN_COMMENTS_FOR_SUMMARY} comments required for summary")]
    NotEnoughComments,
}

/// A cached-or-generated text result.
#[derive(Debug, Clone, serde::Serialize, Deserialize, TS)]
pub struct AiText {
    pub content: String,
    pub cached: bool,
}

#[derive(Debug, Clone, serde::Serialize, Deserialize, TS)]
pub struct DuplicateMatch {
    pub id: Uuid,
    pub title: String,
    /// Model-rated similarity, 0-100.
    pub similarity: i64,
}

#[derive(Debug, Clone, serde::Serialize, Deserialize, TS)]
pub struct DiscussionSummary {
    pub summary: String,
    pub key_decisions: Vec<String>,
    pub cached: bool,
}

#[derive(Debug, Deserialize)]
struct RawSimilarity {
    id: String,
    similarity: f64,
}

#[derive(Debug, Deserialize)]
struct DiscussionSummaryResponse {
    summary: String,
    #[serde(default)]
    key_decisions: Vec<String>,
}

/// SHA-256 hex digest of the cached input text; `None` hashes as the empty
/// string. Collision resistance only matters to avoid accidental cross-content
/// hits, not for security.
pub fn content_hash(text: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.unwrap_or("").as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Service wrapping the generation collaborator with caching and preconditions.
pub struct IssueAssistant {
    pool: SqlitePool,
    generator: Box<dyn TextGenerator>,
}

impl IssueAssistant {
    pub fn new(pool: SqlitePool, generator: Box<dyn TextGenerator>) -> Self {
        Self { pool, generator }
    }

    /// Summarize an issue in a few sentences, cached per description hash.
    pub async fn summarize_issue(&self, issue_id: Uuid) -> Result<AiText, IssueAssistantError> {
        self.cached_issue_text(issue_id, AiCacheKind::Summary).await
    }

    /// Suggest potential solutions for an issue, cached per description hash.
    pub async fn suggest_solutions(&self, issue_id: Uuid) -> Result<AiText, IssueAssistantError> {
        self.cached_issue_text(issue_id, AiCacheKind::Suggestion)
            .await
    }

    async fn cached_issue_text(
        &self,
        issue_id: Uuid,
        kind: AiCacheKind,
    ) -> Result<AiText, IssueAssistantError> {
        let issue = Issue::find_by_id(&self.pool, issue_id)
            .await?
            .ok_or(IssueAssistantError::IssueNotFound)?;

        let description = issue.description.as_deref();
        if description.map_or(0, |d| d.chars().count()) <= MIN_DESCRIPTION_LENGTH {
            return Err(IssueAssistantError::DescriptionTooShort);
        }

        let input_hash = content_hash(description);

        // A failed lookup falls through to regeneration; the result is still
        // correct, we just pay the generation cost again.
        match IssueAiCache::find_valid(&self.pool, issue_id, kind, &input_hash).await {
            Ok(Some(entry)) => {
                return Ok(AiText {
                    content: entry.content,
                    cached: true,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(issue_id = %issue_id, kind = %kind, error = %e, "AI cache lookup failed, regenerating");
            }
        }

        let prompt = match kind {
            AiCacheKind::Summary => summary_prompt(&issue.title, description),
            AiCacheKind::Suggestion => suggestion_prompt(&issue.title, description),
        };
        let content = self.generator.generate(&prompt, None).await?;

        // The generated result is usable even if it cannot be memoized.
        if let Err(e) =
            IssueAiCache::upsert(&self.pool, issue_id, kind, &content, &input_hash).await
        {
            warn!(issue_id = %issue_id, kind = %kind, error = %e, "Failed to store AI cache entry");
        }

        info!(issue_id = %issue_id, kind = %kind, "Generated AI issue text");

        Ok(AiText {
            content,
            cached: false,
        })
    }

    /// Suggest up to three labels for an issue draft. Uncached: drafts change
    /// on every keystroke and a stale suggestion is worthless.
    pub async fn suggest_labels(
        &self,
        title: &str,
        description: Option<&str>,
    ) -> Result<Vec<String>, IssueAssistantError> {
        let raw = self
            .generator
            .generate(&label_prompt(title, description), None)
            .await?;
        Ok(parse_labels(&raw))
    }

    /// Rate the draft issue against the project's existing issues and return
    /// the closest matches. Unparseable model output degrades to no matches.
    pub async fn detect_duplicates(
        &self,
        project_id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> Result<Vec<DuplicateMatch>, IssueAssistantError> {
        Project::find_by_id(&self.pool, project_id)
            .await?
            .ok_or(IssueAssistantError::ProjectNotFound)?;

        let issues = Issue::find_by_project_id(&self.pool, project_id).await?;
        if issues.is_empty() {
            return Ok(Vec::new());
        }

        let raw = self
            .generator
            .generate(&duplicate_prompt(title, description, &issues), None)
            .await?;

        Ok(parse_duplicate_matches(&raw, &issues))
    }

    /// Summarize an issue's comment discussion, cached while the comment count
    /// is unchanged. Refused below [`MIN_COMMENTS_FOR_SUMMARY`] comments.
    pub async fn summarize_discussion(
        &self,
        issue_id: Uuid,
    ) -> Result<DiscussionSummary, IssueAssistantError> {
        Issue::find_by_id(&self.pool, issue_id)
            .await?
            .ok_or(IssueAssistantError::IssueNotFound)?;

        let comment_count = Comment::count_by_issue_id(&self.pool, issue_id).await?;
        if comment_count < MIN_COMMENTS_FOR_SUMMARY {
            return Err(IssueAssistantError::NotEnoughComments);
        }

        match CommentSummary::find_by_issue_id(&self.pool, issue_id).await {
            Ok(Some(entry)) if entry.comment_count == comment_count => {
                return Ok(DiscussionSummary {
                    summary: entry.summary,
                    key_decisions: entry.key_decisions.0,
                    cached: true,
                });
            }
            Ok(_) => {}
            Err(e) => {
                warn!(issue_id = %issue_id, error = %e, "Discussion summary lookup failed, regenerating");
            }
        }

        let comments = Comment::find_by_issue_id(&self.pool, issue_id).await?;
        let raw = self
            .generator
            .generate(&discussion_prompt(&comments), None)
            .await?;

        let parsed: DiscussionSummaryResponse = serde_json::from_str(extract_json(&raw))
            .map_err(|e| GeminiApiError::Serde(e.to_string()))?;

        if let Err(e) = CommentSummary::upsert(
            &self.pool,
            issue_id,
            &parsed.summary,
            &parsed.key_decisions,
            comment_count,
        )
        .await
        {
            warn!(issue_id = %issue_id, error = %e, "Failed to store discussion summary");
        }

        info!(issue_id = %issue_id, comment_count, "Generated discussion summary");

        Ok(DiscussionSummary {
            summary: parsed.summary,
            key_decisions: parsed.key_decisions,
            cached: false,
        })
    }
}

fn summary_prompt(title: &str, description: Option<&str>) -> String {
    format!(
        r#"Summarize the following issue in 2-3 sentences:
Title: {}
Description: {}

Provide a concise summary that captures the main problem and context."#,
        title,
        description.unwrap_or("No description provided")
    )
}

fn suggestion_prompt(title: &str, description: Option<&str>) -> String {
    format!(
        r#"Given the following issue, suggest potential solutions:
Title: {}
Description: {}

Provide 2-3 actionable solution suggestions."#,
        title,
        description.unwrap_or("No description provided")
    )
}

fn label_prompt(title: &str, description: Option<&str>) -> String {
    format!(
        r#"Given the following issue, suggest appropriate labels (e.g., bug, feature, enhancement, documentation):
Title: {}
Description: {}

Return only a comma-separated list of labels, maximum {MAX_SUGGESTED_LABELS} labels."#,
        title,
        description.unwrap_or("No description provided")
    )
}

fn duplicate_prompt(title: &str, description: Option<&str>, issues: &[Issue]) -> String {
    let issues_list = issues
        .iter()
        .enumerate()
        .map(|(index, issue)| {
            format!(
                r#"Issue {}:
ID: {}
Title: {}
Description: {}"#,
                index + 1,
                issue.id,
                issue.title,
                issue.description.as_deref().unwrap_or("No description")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Compare the following NEW issue with the list of EXISTING issues and identify the most similar ones.

NEW ISSUE:
Title: {}
Description: {}

EXISTING ISSUES:
{}

For each existing issue, rate the similarity from 0 to 100 (where 100 is identical).
Return ONLY a JSON array with this exact format:
[
  {{"id": "issue-id-1", "similarity": 85}},
  {{"id": "issue-id-2", "similarity": 72}}
]

Return maximum {} issues, sorted by similarity (highest first).
Only include issues with similarity >= {}.
Return only the JSON array, no other text."#,
        title,
        description.unwrap_or("No description provided"),
        issues_list,
        MAX_DUPLICATE_MATCHES,
        MIN_DUPLICATE_SIMILARITY as i64,
    )
}

fn discussion_prompt(comments: &[Comment]) -> String {
    let comments_text = comments
        .iter()
        .enumerate()
        .map(|(index, comment)| {
            format!(
                r#"Comment {} (by {} on {}):
{}"#,
                index + 1,
                comment.author_id,
                comment.created_at.format("%Y-%m-%d"),
                comment.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"Summarize the following discussion from an issue's comments. Provide:
1. A discussion summary (3-5 sentences) covering the main points and flow of the conversation
2. Key decisions made (if any) - list them as bullet points

COMMENTS:
{}

Return ONLY a JSON object with this exact format:
{{
  "summary": "3-5 sentence summary of the discussion",
  "key_decisions": ["decision 1", "decision 2"]
}}

If there are no key decisions, return an empty array for key_decisions.
Return only the JSON object, no other text."#,
        comments_text
    )
}

fn parse_labels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|label| label.trim().to_string())
        .filter(|label| !label.is_empty())
        .take(MAX_SUGGESTED_LABELS)
        .collect()
}

fn parse_duplicate_matches(raw: &str, issues: &[Issue]) -> Vec<DuplicateMatch> {
    let similarities: Vec<RawSimilarity> = match serde_json::from_str(extract_json(raw)) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "Failed to parse duplicate detection result");
            return Vec::new();
        }
    };

    let mut matches: Vec<DuplicateMatch> = similarities
        .into_iter()
        .filter(|item| item.similarity >= MIN_DUPLICATE_SIMILARITY)
        .filter_map(|item| {
            let id = Uuid::parse_str(&item.id).ok()?;
            let issue = issues.iter().find(|issue| issue.id == id)?;
            Some(DuplicateMatch {
                id,
                title: issue.title.clone(),
                similarity: item.similarity.round() as i64,
            })
        })
        .collect();

    matches.sort_by(|a, b| b.similarity.cmp(&a.similarity));
    matches.truncate(MAX_DUPLICATE_MATCHES);
    matches
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use db::models::issue::CreateIssue;
    use db::models::project::CreateProject;

    use super::*;

    struct FakeGenerator {
        calls: Arc<AtomicUsize>,
        response: String,
    }

    impl FakeGenerator {
        fn new(response: &str) -> (Box<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Box::new(Self {
                    calls: calls.clone(),
                    response: response.to_string(),
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl TextGenerator for FakeGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _system: Option<&str>,
        ) -> Result<String, GeminiApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    async fn test_pool() -> SqlitePool {
        db::DBService::new("sqlite::memory:").await.unwrap().pool
    }

    async fn seed_issue(pool: &SqlitePool, description: Option<&str>) -> Issue {
        let project = Project::create(
            pool,
            &CreateProject {
                name: "Test project".to_string(),
                description: None,
            },
        )
        .await
        .unwrap();

        Issue::create(
            pool,
            &CreateIssue {
                project_id: project.id,
                title: "Login fails on mobile".to_string(),
                description: description.map(|d| d.to_string()),
                status: None,
                priority: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn repeated_summary_request_generates_once() {
        let pool = test_pool().await;
        let issue = seed_issue(&pool, Some("Tapping login crashes the app on iOS 17")).await;
        let (generator, calls) = FakeGenerator::new("A crash on login.");
        let assistant = IssueAssistant::new(pool, generator);

        let first = assistant.summarize_issue(issue.id).await.unwrap();
        let second = assistant.summarize_issue(issue.id).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.content, second.content);
    }

    #[tokio::test]
    async fn summary_and_suggestion_are_cached_separately() {
        let pool = test_pool().await;
        let issue = seed_issue(&pool, Some("Tapping login crashes the app on iOS 17")).await;
        let (generator, calls) = FakeGenerator::new("Generated text.");
        let assistant = IssueAssistant::new(pool, generator);

        assistant.summarize_issue(issue.id).await.unwrap();
        assistant.suggest_solutions(issue.id).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Both kinds now served from cache.
        assert!(assistant.summarize_issue(issue.id).await.unwrap().cached);
        assert!(assistant.suggest_solutions(issue.id).await.unwrap().cached);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn description_edit_triggers_regeneration() {
        let pool = test_pool().await;
        let issue = seed_issue(&pool, Some("Tapping login crashes the app on iOS 17")).await;
        let (generator, calls) = FakeGenerator::new("A crash on login.");
        let assistant = IssueAssistant::new(pool.clone(), generator);

        assistant.summarize_issue(issue.id).await.unwrap();

        Issue::update(
            &pool,
            issue.id,
            &issue.title,
            Some("Crash happens only after the 2FA step"),
            issue.status.clone(),
            issue.priority.clone(),
        )
        .await
        .unwrap();

        let regenerated = assistant.summarize_issue(issue.id).await.unwrap();
        assert!(!regenerated.cached);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn short_description_rejected_before_generation() {
        let pool = test_pool().await;
        let issue = seed_issue(&pool, Some("too short")).await;
        let (generator, calls) = FakeGenerator::new("unused");
        let assistant = IssueAssistant::new(pool, generator);

        let err = assistant.summarize_issue(issue.id).await.unwrap_err();
        assert!(matches!(err, IssueAssistantError::DescriptionTooShort));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_issue_is_not_found() {
        let pool = test_pool().await;
        let (generator, _) = FakeGenerator::new("unused");
        let assistant = IssueAssistant::new(pool, generator);

        let err = assistant.summarize_issue(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, IssueAssistantError::IssueNotFound));
    }

    #[tokio::test]
    async fn discussion_summary_requires_minimum_comments() {
        let pool = test_pool().await;
        let issue = seed_issue(&pool, Some("Tapping login crashes the app on iOS 17")).await;
        for i in 0..(MIN_COMMENTS_FOR_SUMMARY - 1) {
            Comment::create(&pool, issue.id, "user-1", &format!("comment {i}"))
                .await
                .unwrap();
        }
        let (generator, calls) = FakeGenerator::new("unused");
        let assistant = IssueAssistant::new(pool, generator);

        let err = assistant.summarize_discussion(issue.id).await.unwrap_err();
        assert!(matches!(err, IssueAssistantError::NotEnoughComments));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn discussion_summary_regenerates_when_count_changes() {
        let pool = test_pool().await;
        let issue = seed_issue(&pool, Some("Tapping login crashes the app on iOS 17")).await;
        for i in 0..MIN_COMMENTS_FOR_SUMMARY {
            Comment::create(&pool, issue.id, "user-1", &format!("comment {i}"))
                .await
                .unwrap();
        }
        let (generator, calls) =
            FakeGenerator::new(r#"{"summary": "Agreed on a fix.", "key_decisions": ["ship it"]}"#);
        let assistant = IssueAssistant::new(pool.clone(), generator);

        let first = assistant.summarize_discussion(issue.id).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.key_decisions, vec!["ship it".to_string()]);

        let second = assistant.summarize_discussion(issue.id).await.unwrap();
        assert!(second.cached);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A new comment changes the count and invalidates the snapshot, even
        // though no issue text was edited.
        Comment::create(&pool, issue.id, "user-2", "one more thing")
            .await
            .unwrap();

        let third = assistant.summarize_discussion(issue.id).await.unwrap();
        assert!(!third.cached);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn broken_cache_store_does_not_block_generation() {
        let pool = test_pool().await;
        let issue = seed_issue(&pool, Some("Tapping login crashes the app on iOS 17")).await;
        let (generator, calls) = FakeGenerator::new("A crash on login.");
        let assistant = IssueAssistant::new(pool.clone(), generator);

        assistant.summarize_issue(issue.id).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        sqlx::query("DROP TABLE issue_ai_cache")
            .execute(&pool)
            .await
            .unwrap();

        // The lookup fails, generation proceeds anyway, and the failed store
        // is swallowed.
        let result = assistant.summarize_issue(issue.id).await.unwrap();
        assert!(!result.cached);
        assert_eq!(result.content, "A crash on login.");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn broken_summary_store_does_not_block_discussion_summary() {
        let pool = test_pool().await;
        let issue = seed_issue(&pool, Some("Tapping login crashes the app on iOS 17")).await;
        for i in 0..MIN_COMMENTS_FOR_SUMMARY {
            Comment::create(&pool, issue.id, "user-1", &format!("comment {i}"))
                .await
                .unwrap();
        }
        let (generator, calls) =
            FakeGenerator::new(r#"{"summary": "Agreed on a fix.", "key_decisions": []}"#);
        let assistant = IssueAssistant::new(pool.clone(), generator);

        sqlx::query("DROP TABLE comment_summaries")
            .execute(&pool)
            .await
            .unwrap();

        // Every request regenerates: the lookup fails and the upsert after
        // generation fails too, but neither surfaces to the caller.
        let first = assistant.summarize_discussion(issue.id).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.summary, "Agreed on a fix.");

        let second = assistant.summarize_discussion(issue.id).await.unwrap();
        assert!(!second.cached);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn content_hash_treats_missing_as_empty() {
        assert_eq!(content_hash(None), content_hash(Some("")));
        assert_ne!(content_hash(Some("a")), content_hash(Some("b")));
    }

    #[test]
    fn labels_are_trimmed_and_capped() {
        assert_eq!(
            parse_labels("bug, feature , enhancement, documentation"),
            vec!["bug", "feature", "enhancement"]
        );
        assert!(parse_labels("  ,, ").is_empty());
    }

    #[tokio::test]
    async fn duplicate_matches_are_filtered_and_sorted() {
        let pool = test_pool().await;
        let a = seed_issue(&pool, Some("Login button unresponsive on mobile")).await;
        let b = Issue::create(
            &pool,
            &CreateIssue {
                project_id: a.project_id,
                title: "Dark mode flickers".to_string(),
                description: None,
                status: None,
                priority: None,
            },
        )
        .await
        .unwrap();

        let issues = Issue::find_by_project_id(&pool, a.project_id).await.unwrap();
        let raw = format!(
            r#"[{{"id": "{}", "similarity": 55}}, {{"id": "{}", "similarity": 91}}, {{"id": "{}", "similarity": 20}}]"#,
            b.id, a.id, b.id
        );

        let matches = parse_duplicate_matches(&raw, &issues);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, a.id);
        assert_eq!(matches[0].similarity, 91);
        assert_eq!(matches[1].id, b.id);
    }

    #[test]
    fn unparseable_duplicate_output_degrades_to_empty() {
        assert!(parse_duplicate_matches("I could not find duplicates", &[]).is_empty());
    }
}
