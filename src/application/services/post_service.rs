use crate::domain::entities::*;
use crate::domain::ports::post_repository::PostRepository;
use crate::domain::services::{CommitError, ResourceLockManager};
use crate::infrastructure::http::middleware::error::{ApiError, ApiResult};
use chrono::{SecondsFormat, Utc};
use std::collections::HashSet;
use std::sync::Arc;

pub const MAX_PAGE_SIZE: i64 = 100;

/// Blog post flows with the edit/delete lock wired in.
///
/// Edit and delete are two-step: `begin_*` runs when the confirmation page is
/// shown and takes (or renews) the lock, `commit_*` runs on submit and only
/// mutates the store if nobody else holds the lock by then.
#[derive(Clone)]
pub struct PostService {
    post_repo: Arc<dyn PostRepository>,
    locks: ResourceLockManager,
}

impl PostService {
    pub fn new(post_repo: Arc<dyn PostRepository>, locks: ResourceLockManager) -> Self {
        Self { post_repo, locks }
    }

    pub fn locks(&self) -> &ResourceLockManager {
        &self.locks
    }

    /// One page of posts, newest first, annotated with the posts locked by
    /// other principals. Anonymous readers see every live lock as foreign.
    /// Lock state for the whole page is read in one call.
    pub async fn list_posts(
        &self,
        principal: Option<&PrincipalId>,
        query: &ListPostsQuery,
    ) -> ApiResult<PostListResponse> {
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.max(0);

        let (posts, total) = self.post_repo.list_posts(limit, offset).await?;

        let ids = posts.iter().map(|p| p.id.as_str());
        let locked = match principal {
            Some(principal) => self.locks.query_locked_by(ids, principal.as_str()).await?,
            None => self.locks.query_locked(ids).await?,
        };
        let locked_post_ids: Vec<String> = locked.into_iter().map(String::from).collect();

        let lookup: HashSet<&str> = locked_post_ids.iter().map(String::as_str).collect();
        let posts = posts
            .into_iter()
            .map(|post| {
                let locked = lookup.contains(post.id.as_str());
                PostSummary { post, locked }
            })
            .collect();

        Ok(PostListResponse {
            posts,
            locked_post_ids,
            total,
            limit,
            offset,
        })
    }

    pub async fn get_post(&self, id: &str) -> ApiResult<Post> {
        self.post_repo
            .get_post(id)
            .await?
            .ok_or_else(|| not_found(id))
    }

    pub async fn create_post(
        &self,
        principal: &PrincipalId,
        request: CreatePostRequest,
    ) -> ApiResult<Post> {
        let post = Post::new(principal.to_string(), request.title, request.content)?;
        self.post_repo.create_post(&post).await?;

        tracing::info!(post_id = %post.id, author_id = %principal, "Post created");
        Ok(post)
    }

    /// Show the edit form: any authenticated principal may edit an existing post.
    pub async fn begin_edit(&self, principal: &PrincipalId, id: &str) -> ApiResult<LockedPostResponse> {
        let post = self.get_post(id).await?;
        self.acquire(principal, &post.id, "edit").await?;

        Ok(LockedPostResponse {
            post,
            lock_expires_in_seconds: self.locks.ttl().as_secs(),
        })
    }

    pub async fn commit_edit(
        &self,
        principal: &PrincipalId,
        id: &str,
        request: UpdatePostRequest,
    ) -> ApiResult<Post> {
        let title = validate_title(&request.title)?;
        let content = request.content;
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let repo = self.post_repo.clone();
        let post_id = id.to_string();

        let outcome = self
            .locks
            .commit_exclusive_action(id, principal.as_str(), move || async move {
                repo.update_post(&post_id, &title, &content, &updated_at)
                    .await
            })
            .await;

        match outcome {
            Ok(CommitOutcome::Committed(post)) => {
                tracing::info!(post_id = %post.id, editor_id = %principal, "Post updated");
                Ok(post)
            }
            Ok(CommitOutcome::Denied { holder }) => Err(lock_expired(holder)),
            Err(CommitError::Lock(e)) => Err(e.into()),
            Err(CommitError::Action(e)) => Err(e),
        }
    }

    /// Show the delete confirmation: only the author may delete a post.
    pub async fn begin_delete(
        &self,
        principal: &PrincipalId,
        id: &str,
    ) -> ApiResult<LockedPostResponse> {
        let post = self
            .post_repo
            .get_post_owned_by(id, principal.as_str())
            .await?
            .ok_or_else(|| not_found(id))?;
        self.acquire(principal, &post.id, "delete").await?;

        Ok(LockedPostResponse {
            post,
            lock_expires_in_seconds: self.locks.ttl().as_secs(),
        })
    }

    pub async fn commit_delete(&self, principal: &PrincipalId, id: &str) -> ApiResult<()> {
        let repo = self.post_repo.clone();
        let post_id = id.to_string();
        let author_id = principal.to_string();

        let outcome = self
            .locks
            .commit_exclusive_action(id, principal.as_str(), move || async move {
                repo.delete_post_owned_by(&post_id, &author_id).await
            })
            .await;

        match outcome {
            Ok(CommitOutcome::Committed(())) => {
                tracing::info!(post_id = %id, author_id = %principal, "Post deleted");
                Ok(())
            }
            Ok(CommitOutcome::Denied { holder }) => Err(lock_expired(holder)),
            Err(CommitError::Lock(e)) => Err(e.into()),
            Err(CommitError::Action(e)) => Err(e),
        }
    }

    async fn acquire(&self, principal: &PrincipalId, id: &str, action: &str) -> ApiResult<()> {
        match self.locks.begin_exclusive_access(id, principal.as_str()).await? {
            LockOutcome::Granted => Ok(()),
            LockOutcome::Denied { holder } => Err(ApiError::Locked {
                message: format!(
                    "Cannot {}: this post is currently being edited/locked by user {}",
                    action, holder
                ),
                holder: holder.to_string(),
            }),
        }
    }
}

fn not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("Post {} not found", id))
}

fn lock_expired(holder: PrincipalId) -> ApiError {
    ApiError::Locked {
        message: format!(
            "Action failed: your lock expired and user {} is now editing this post",
            holder
        ),
        holder: holder.to_string(),
    }
}
