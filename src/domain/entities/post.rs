use crate::domain::errors::{DomainError, DomainResult};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_TITLE_LEN: usize = 200;

/// Entity: blog post stored in database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Post {
    pub fn new(author_id: String, title: String, content: String) -> DomainResult<Self> {
        let title = validate_title(&title)?;
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            author_id,
            title,
            content,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

/// Trims the title and checks it is between 1 and MAX_TITLE_LEN characters.
pub fn validate_title(title: &str) -> DomainResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::ValidationError(
            "Title must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::ValidationError(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// DTO: Request to create a post
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// DTO: Request to update a post (commit of an edit)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePostRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// DTO: Pagination for the post list
#[derive(Debug, Clone, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Default for ListPostsQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// DTO: Post as rendered in the list, annotated with lock state
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    #[serde(flatten)]
    pub post: Post,
    pub locked: bool,
}

/// DTO: One page of posts
#[derive(Debug, Clone, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<PostSummary>,
    pub locked_post_ids: Vec<String>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// DTO: Returned when an edit or delete confirmation is granted
#[derive(Debug, Clone, Serialize)]
pub struct LockedPostResponse {
    pub post: Post,
    pub lock_expires_in_seconds: u64,
}
