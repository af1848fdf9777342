use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, FeedFollowDbRow, FeedFollowView};

const FOLLOW_VIEW_SELECT: &str = r#"
    SELECT ff.id, ff.created_at, ff.user_id, ff.feed_id,
           f.name AS feed_name, u.name AS user_name
    FROM feed_follows ff
    JOIN feeds f ON f.id = ff.feed_id
    JOIN users u ON u.id = ff.user_id
"#;

impl Database {
    // ========================================================================
    // Feed Follow Operations
    // ========================================================================

    /// Subscribe `user_id` to `feed_id`.
    ///
    /// Returns the new link together with the feed and user names. Following
    /// the same feed twice yields [`DatabaseError::AlreadyExists`].
    pub async fn create_feed_follow(
        &self,
        user_id: Uuid,
        feed_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<FeedFollowView, DatabaseError> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
            VALUES (?, ?, ?, ?, ?)
        "#,
        )
        .bind(id)
        .bind(now.timestamp_millis())
        .bind(now.timestamp_millis())
        .bind(user_id)
        .bind(feed_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let row = sqlx::query_as::<_, FeedFollowDbRow>(&format!(
            "{FOLLOW_VIEW_SELECT} WHERE ff.id = ?"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into_view())
    }

    /// Feeds followed by `user_id`, in the order they were followed
    pub async fn get_feed_follows_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<FeedFollowView>, DatabaseError> {
        let rows = sqlx::query_as::<_, FeedFollowDbRow>(&format!(
            "{FOLLOW_VIEW_SELECT} WHERE ff.user_id = ? ORDER BY ff.created_at, f.name"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FeedFollowDbRow::into_view).collect())
    }

    /// Remove a follow. Returns `false` if the user was not following the feed.
    pub async fn delete_feed_follow(&self, user_id: Uuid, feed_id: Uuid) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError, Feed, User};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    async fn setup() -> (Database, User, Feed) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("reader", t0()).await.unwrap();
        let feed = db
            .create_feed("Lanes Blog", "https://www.wagslane.dev/index.xml", user.id, t0())
            .await
            .unwrap();
        (db, user, feed)
    }

    #[tokio::test]
    async fn test_follow_returns_both_names() {
        let (db, user, feed) = setup().await;

        let follow = db.create_feed_follow(user.id, feed.id, t0()).await.unwrap();
        assert_eq!(follow.feed_name, "Lanes Blog");
        assert_eq!(follow.user_name, "reader");
        assert_eq!(follow.user_id, user.id);
        assert_eq!(follow.feed_id, feed.id);
    }

    #[tokio::test]
    async fn test_duplicate_follow_rejected() {
        let (db, user, feed) = setup().await;
        db.create_feed_follow(user.id, feed.id, t0()).await.unwrap();

        let err = db
            .create_feed_follow(user.id, feed.id, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::AlreadyExists(_)), "got {err:?}");
        assert_eq!(db.get_feed_follows_for_user(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_follows_listed_per_user() {
        let (db, user, feed) = setup().await;
        let other = db.create_user("other", t0()).await.unwrap();
        let second = db
            .create_feed("Boot.dev", "https://blog.boot.dev/index.xml", other.id, t0())
            .await
            .unwrap();

        db.create_feed_follow(user.id, feed.id, t0()).await.unwrap();
        db.create_feed_follow(user.id, second.id, t0() + Duration::seconds(1))
            .await
            .unwrap();
        db.create_feed_follow(other.id, second.id, t0()).await.unwrap();

        let names: Vec<String> = db
            .get_feed_follows_for_user(user.id)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.feed_name)
            .collect();
        assert_eq!(names, vec!["Lanes Blog", "Boot.dev"]);
        assert_eq!(db.get_feed_follows_for_user(other.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unfollow() {
        let (db, user, feed) = setup().await;
        db.create_feed_follow(user.id, feed.id, t0()).await.unwrap();

        assert!(db.delete_feed_follow(user.id, feed.id).await.unwrap());
        assert!(db.get_feed_follows_for_user(user.id).await.unwrap().is_empty());

        // Second unfollow finds nothing to remove
        assert!(!db.delete_feed_follow(user.id, feed.id).await.unwrap());
    }
}
