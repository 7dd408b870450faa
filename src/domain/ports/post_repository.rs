use crate::domain::entities::Post;
use crate::infrastructure::http::middleware::error::ApiResult;
use async_trait::async_trait;

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create_post(&self, post: &Post) -> ApiResult<()>;
    async fn get_post(&self, id: &str) -> ApiResult<Option<Post>>;
    /// Lookup restricted to posts authored by `author_id`.
    async fn get_post_owned_by(&self, id: &str, author_id: &str) -> ApiResult<Option<Post>>;
    /// Newest first.
    async fn list_posts(&self, limit: i64, offset: i64) -> ApiResult<(Vec<Post>, i64)>;
    async fn update_post(
        &self,
        id: &str,
        title: &str,
        content: &str,
        updated_at: &str,
    ) -> ApiResult<Post>;
    async fn delete_post_owned_by(&self, id: &str, author_id: &str) -> ApiResult<()>;
}
