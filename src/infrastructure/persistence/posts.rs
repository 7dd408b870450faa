use crate::domain::entities::Post;
use crate::domain::ports::post_repository::PostRepository;
use crate::infrastructure::http::middleware::error::{ApiError, ApiResult};
use crate::infrastructure::persistence::Database;
use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::Row;

const POST_COLUMNS: &str = "id, author_id, title, content, created_at, updated_at";

fn post_from_row(row: &AnyRow) -> Result<Post, sqlx::Error> {
    Ok(Post {
        id: row.try_get("id")?,
        author_id: row.try_get("author_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PostRepository for Database {
    async fn create_post(&self, post: &Post) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO posts (id, author_id, title, content, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&post.id)
        .bind(&post.author_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.created_at)
        .bind(&post.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_post(&self, id: &str) -> ApiResult<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(post_from_row).transpose()?)
    }

    async fn get_post_owned_by(&self, id: &str, author_id: &str) -> ApiResult<Option<Post>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM posts WHERE id = ? AND author_id = ?",
            POST_COLUMNS
        ))
        .bind(id)
        .bind(author_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(post_from_row).transpose()?)
    }

    async fn list_posts(&self, limit: i64, offset: i64) -> ApiResult<(Vec<Post>, i64)> {
        let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM posts")
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM posts ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            POST_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let posts = rows
            .iter()
            .map(post_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((posts, total))
    }

    async fn update_post(
        &self,
        id: &str,
        title: &str,
        content: &str,
        updated_at: &str,
    ) -> ApiResult<Post> {
        let result = sqlx::query("UPDATE posts SET title = ?, content = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(content)
            .bind(updated_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("Post {} not found", id)));
        }

        self.get_post(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Post {} not found", id)))
    }

    async fn delete_post_owned_by(&self, id: &str, author_id: &str) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ? AND author_id = ?")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(format!("Post {} not found", id)));
        }

        Ok(())
    }
}
