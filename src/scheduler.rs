//! Fixed-cadence feed aggregation.
//!
//! Each cycle claims the single least-recently fetched feed, downloads and
//! decodes its document, and stores the items as posts. The claim advances
//! the feed's `last_fetched_at` before any network traffic, so a feed that
//! fails to fetch still moves to the back of the rotation.

use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;

use crate::feed::{ingest_items, parse_channel, FetchError, Fetcher, IngestReport, ParseError};
use crate::storage::{Database, DatabaseError, Feed};
use crate::util::{Clock, SystemClock};

/// Why a cycle produced no posts. None of these stop the scheduler.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("No feed available to fetch")]
    NoFeedAvailable,

    #[error("Failed to claim next feed: {0}")]
    Storage(#[from] DatabaseError),

    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Failed to parse {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },
}

/// Result of a cycle that reached ingestion
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// The claimed feed, with its advanced `last_fetched_at`
    pub feed: Feed,
    pub ingest: IngestReport,
}

pub struct Scheduler<C: Clock = SystemClock> {
    db: Database,
    fetcher: Fetcher,
    clock: C,
}

impl Scheduler<SystemClock> {
    pub fn new(db: Database, fetcher: Fetcher) -> Self {
        Self::with_clock(db, fetcher, SystemClock)
    }
}

impl<C: Clock> Scheduler<C> {
    pub fn with_clock(db: Database, fetcher: Fetcher, clock: C) -> Self {
        Self { db, fetcher, clock }
    }

    /// Run one claim, fetch, parse and ingest cycle.
    pub async fn tick(&self) -> Result<CycleReport, CycleError> {
        let feed = self
            .db
            .claim_next_feed(self.clock.now())
            .await?
            .ok_or(CycleError::NoFeedAvailable)?;

        tracing::debug!(feed = %feed.url, "Claimed feed");

        let bytes = self
            .fetcher
            .fetch(&feed.url)
            .await
            .map_err(|source| CycleError::Fetch {
                url: feed.url.clone(),
                source,
            })?;

        let channel = parse_channel(&bytes).map_err(|source| CycleError::Parse {
            url: feed.url.clone(),
            source,
        })?;

        let ingest = ingest_items(&self.db, &feed, &channel.items, self.clock.now()).await;

        Ok(CycleReport { feed, ingest })
    }

    /// Run a cycle now and then once every `period`, forever.
    ///
    /// Every outcome is logged; nothing short of process termination ends
    /// the loop. Slow cycles delay the next tick instead of bursting.
    pub async fn run(&self, period: Duration) {
        // interval() panics on a zero period
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            match self.tick().await {
                Ok(report) => {
                    tracing::info!(
                        feed = %report.feed.name,
                        url = %report.feed.url,
                        inserted = report.ingest.inserted,
                        duplicates = report.ingest.duplicates,
                        skipped = report.ingest.skipped,
                        failed = report.ingest.failed,
                        "Collected feed"
                    );
                }
                Err(CycleError::NoFeedAvailable) => {
                    tracing::debug!("No feeds to fetch, skipping cycle");
                }
                Err(e @ CycleError::Storage(_)) => {
                    tracing::error!(error = %e, "Aggregation cycle aborted");
                }
                Err(CycleError::Fetch { url, source }) => {
                    tracing::warn!(feed = %url, error = %source, "Failed to fetch feed");
                }
                Err(CycleError::Parse { url, source }) => {
                    tracing::warn!(feed = %url, error = %source, "Failed to parse feed");
                }
            }
        }
    }
}
