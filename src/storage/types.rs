use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::util::from_millis;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock past the busy timeout
    #[error("Database is locked by another gator process. Please close it and try again.")]
    Locked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A unique constraint rejected the write (duplicate name, URL or follow)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Classify a sqlx error, surfacing lock contention and unique violations
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists(db_err.message().to_string());
            }
        }

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        let error_string = err.to_string().to_lowercase();
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
        {
            return DatabaseError::Locked;
        }

        DatabaseError::Other(err)
    }
}

/// Outcome of a post insert that did not fail.
///
/// `Conflict` means a post with the same URL already exists and nothing was
/// written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Conflict,
}

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
}

/// A subscribable source. `last_fetched_at` is `None` until the first claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// Feed joined with the name of the user who added it
#[derive(Debug, Clone)]
pub struct FeedWithCreator {
    pub feed: Feed,
    pub user_name: String,
}

/// A follow link, denormalized with both display names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFollowView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub feed_id: Uuid,
    pub feed_name: String,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: Option<String>,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub feed_id: Uuid,
}

/// A post ready to be written by the ingestion engine
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub title: Option<String>,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub feed_id: Uuid,
}

// ============================================================================
// Row Types
// ============================================================================

// Instants are stored as Unix milliseconds; rows convert on the way out.

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserDbRow {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
}

impl UserDbRow {
    pub(crate) fn into_user(self) -> User {
        User {
            id: self.id,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
            name: self.name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedDbRow {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub last_fetched_at: Option<i64>,
}

impl FeedDbRow {
    pub(crate) fn into_feed(self) -> Feed {
        Feed {
            id: self.id,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
            name: self.name,
            url: self.url,
            user_id: self.user_id,
            last_fetched_at: self.last_fetched_at.map(from_millis),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedWithCreatorRow {
    #[sqlx(flatten)]
    pub feed: FeedDbRow,
    pub user_name: String,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedFollowDbRow {
    pub id: Uuid,
    pub created_at: i64,
    pub user_id: Uuid,
    pub feed_id: Uuid,
    pub feed_name: String,
    pub user_name: String,
}

impl FeedFollowDbRow {
    pub(crate) fn into_view(self) -> FeedFollowView {
        FeedFollowView {
            id: self.id,
            created_at: from_millis(self.created_at),
            user_id: self.user_id,
            feed_id: self.feed_id,
            feed_name: self.feed_name,
            user_name: self.user_name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostDbRow {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub title: Option<String>,
    pub url: String,
    pub description: Option<String>,
    pub published_at: Option<i64>,
    pub feed_id: Uuid,
}

impl PostDbRow {
    pub(crate) fn into_post(self) -> Post {
        Post {
            id: self.id,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
            title: self.title,
            url: self.url,
            description: self.description,
            published_at: self.published_at.map(from_millis),
            feed_id: self.feed_id,
        }
    }
}
