use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, InsertOutcome, NewPost, Post, PostDbRow};

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post, letting the unique `url` constraint decide duplicates.
    ///
    /// An existing post with the same URL is left untouched and the call
    /// returns [`InsertOutcome::Conflict`]. There is no separate existence
    /// check, so concurrent ingestion of the same link cannot race.
    pub async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome, DatabaseError> {
        let created_at = post.created_at.timestamp_millis();
        let result = sqlx::query(
            r#"
            INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
        "#,
        )
        .bind(post.id)
        .bind(created_at)
        .bind(created_at)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at.map(|dt| dt.timestamp_millis()))
        .bind(post.feed_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() > 0 {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::Conflict)
        }
    }

    /// Newest posts from the feeds `user_id` follows.
    ///
    /// Ordered by publish date, newest first; posts with an unknown publish
    /// date come last, newest ingested first.
    pub async fn get_posts_for_user(&self, user_id: Uuid, limit: u32) -> Result<Vec<Post>, DatabaseError> {
        let rows = sqlx::query_as::<_, PostDbRow>(
            r#"
            SELECT p.id, p.created_at, p.updated_at, p.title, p.url, p.description,
                   p.published_at, p.feed_id
            FROM posts p
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC NULLS LAST, p.created_at DESC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PostDbRow::into_post).collect())
    }

    pub async fn count_posts_for_feed(&self, feed_id: Uuid) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
