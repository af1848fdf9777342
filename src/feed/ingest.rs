use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::parser::Item;
use crate::storage::{Database, Feed, InsertOutcome, NewPost};
use crate::util::parse_published;

/// Per-item outcome counts for one ingestion batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub inserted: usize,
    /// Items whose link was already stored
    pub duplicates: usize,
    /// Items without a link
    pub skipped: usize,
    /// Items the database rejected
    pub failed: usize,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.inserted + self.duplicates + self.skipped + self.failed
    }
}

/// Store every item of `feed` as a post, in document order.
///
/// Items are deduplicated by link through the storage uniqueness constraint.
/// A storage error on one item is logged and counted; the rest of the batch
/// is still attempted.
pub async fn ingest_items(
    db: &Database,
    feed: &Feed,
    items: &[Item],
    now: DateTime<Utc>,
) -> IngestReport {
    let mut report = IngestReport::default();

    for item in items {
        let Some(post) = build_post(feed, item, now) else {
            tracing::warn!(feed = %feed.url, title = %item.title, "Skipping item without link");
            report.skipped += 1;
            continue;
        };

        match db.insert_post(&post).await {
            Ok(InsertOutcome::Inserted) => report.inserted += 1,
            Ok(InsertOutcome::Conflict) => report.duplicates += 1,
            Err(e) => {
                tracing::warn!(feed = %feed.url, link = %post.url, error = %e, "Failed to store post");
                report.failed += 1;
            }
        }
    }

    report
}

fn build_post(feed: &Feed, item: &Item, now: DateTime<Utc>) -> Option<NewPost> {
    let url = item.link.trim();
    if url.is_empty() {
        return None;
    }

    let published_at = match parse_published(&item.pub_date) {
        Ok(dt) => Some(dt),
        Err(e) => {
            tracing::debug!(link = %url, error = %e, "Unknown publish date");
            None
        }
    };

    Some(NewPost {
        id: Uuid::new_v4(),
        created_at: now,
        title: non_empty(&item.title),
        url: url.to_string(),
        description: non_empty(&item.description),
        published_at,
        feed_id: feed.id,
    })
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
