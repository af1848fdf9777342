use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedDbRow, FeedWithCreator, FeedWithCreatorRow};

/// Columns selected for every feed query, in `FeedDbRow` order
const FEED_COLUMNS: &str = "id, created_at, updated_at, name, url, user_id, last_fetched_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Add a feed to the catalog, owned by `user_id`.
    ///
    /// URLs are unique across the catalog; a second feed with the same URL
    /// yields [`DatabaseError::AlreadyExists`].
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Feed, DatabaseError> {
        let row = sqlx::query_as::<_, FeedDbRow>(&format!(
            r#"
            INSERT INTO feeds (id, created_at, updated_at, name, url, user_id)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {FEED_COLUMNS}
        "#
        ))
        .bind(Uuid::new_v4())
        .bind(now.timestamp_millis())
        .bind(now.timestamp_millis())
        .bind(name)
        .bind(url)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.into_feed())
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedDbRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedDbRow::into_feed))
    }

    pub async fn get_feed(&self, id: Uuid) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedDbRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedDbRow::into_feed))
    }

    /// Every feed in the catalog with the name of the user who added it
    pub async fn list_feeds(&self) -> Result<Vec<FeedWithCreator>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeedWithCreatorRow>(
            r#"
            SELECT
                f.id, f.created_at, f.updated_at, f.name, f.url, f.user_id, f.last_fetched_at,
                u.name AS user_name
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.created_at, f.name
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| FeedWithCreator {
                feed: row.feed.into_feed(),
                user_name: row.user_name,
            })
            .collect())
    }

    /// The feed the next claim would pick, without claiming it.
    pub async fn next_feed_to_fetch(&self) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedDbRow>(&format!(
            r#"
            SELECT {FEED_COLUMNS} FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, id ASC
            LIMIT 1
        "#
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FeedDbRow::into_feed))
    }

    /// Atomically select the least-recently fetched feed and stamp it with `now`.
    ///
    /// Feeds never fetched come first. Selection and the timestamp advance are
    /// a single `UPDATE ... RETURNING` statement, so two workers can never
    /// claim the same feed for the same instant. The returned feed carries the
    /// new `last_fetched_at`.
    ///
    /// Returns `Ok(None)` when the catalog is empty; nothing is modified.
    pub async fn claim_next_feed(&self, now: DateTime<Utc>) -> Result<Option<Feed>, DatabaseError> {
        let row = sqlx::query_as::<_, FeedDbRow>(&format!(
            r#"
            UPDATE feeds
            SET last_fetched_at = MAX(COALESCE(last_fetched_at, ?1), ?1),
                updated_at = ?1
            WHERE id = (
                SELECT id FROM feeds
                ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, id ASC
                LIMIT 1
            )
            RETURNING {FEED_COLUMNS}
        "#
        ))
        .bind(now.timestamp_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.map(FeedDbRow::into_feed))
    }

    /// Record a fetch of `feed_id` at `at`.
    ///
    /// `last_fetched_at` never moves backwards: an `at` older than the stored
    /// value leaves it unchanged. Returns `false` if the feed does not exist.
    pub async fn mark_feed_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = MAX(COALESCE(last_fetched_at, ?1), ?1),
                updated_at = ?1
            WHERE id = ?2
        "#,
        )
        .bind(at.timestamp_millis())
        .bind(feed_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}
