use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, User, UserDbRow};

impl Database {
    // ========================================================================
    // User Operations
    // ========================================================================

    /// Create a user. Names are unique; a taken name yields
    /// [`DatabaseError::AlreadyExists`].
    pub async fn create_user(&self, name: &str, now: DateTime<Utc>) -> Result<User, DatabaseError> {
        let row = sqlx::query_as::<_, UserDbRow>(
            r#"
            INSERT INTO users (id, created_at, updated_at, name)
            VALUES (?, ?, ?, ?)
            RETURNING id, created_at, updated_at, name
        "#,
        )
        .bind(Uuid::new_v4())
        .bind(now.timestamp_millis())
        .bind(now.timestamp_millis())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.into_user())
    }

    pub async fn get_user_by_name(&self, name: &str) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, UserDbRow>(
            "SELECT id, created_at, updated_at, name FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserDbRow::into_user))
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let row = sqlx::query_as::<_, UserDbRow>(
            "SELECT id, created_at, updated_at, name FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserDbRow::into_user))
    }

    /// All users, oldest first
    pub async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        let rows = sqlx::query_as::<_, UserDbRow>(
            "SELECT id, created_at, updated_at, name FROM users ORDER BY created_at, name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserDbRow::into_user).collect())
    }

    /// Delete every user. Feeds, follows and posts go with them through
    /// `ON DELETE CASCADE`. Returns the number of users removed.
    pub async fn delete_all_users(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, DatabaseError};
    use chrono::{TimeZone, Utc};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let db = test_db().await;
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let user = db.create_user("kahya", now).await.unwrap();
        assert_eq!(user.name, "kahya");
        assert_eq!(user.created_at, now);

        let by_name = db.get_user_by_name("kahya").await.unwrap().unwrap();
        assert_eq!(by_name, user);

        let by_id = db.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(by_id, user);
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let db = test_db().await;
        db.create_user("holgith", Utc::now()).await.unwrap();

        let err = db.create_user("holgith", Utc::now()).await.unwrap_err();
        assert!(matches!(err, DatabaseError::AlreadyExists(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_unknown_user_is_none() {
        let db = test_db().await;
        assert!(db.get_user_by_name("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_users_in_creation_order() {
        let db = test_db().await;
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        db.create_user("second", t0 + chrono::Duration::seconds(1))
            .await
            .unwrap();
        db.create_user("first", t0).await.unwrap();

        let names: Vec<String> = db
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_delete_all_users() {
        let db = test_db().await;
        db.create_user("a", Utc::now()).await.unwrap();
        db.create_user("b", Utc::now()).await.unwrap();

        assert_eq!(db.delete_all_users().await.unwrap(), 2);
        assert!(db.list_users().await.unwrap().is_empty());
        assert_eq!(db.delete_all_users().await.unwrap(), 0);
    }
}
