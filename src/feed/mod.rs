//! Feed retrieval, decoding and ingestion.
//!
//! - `fetcher` - bounded-time HTTP GET of a feed document
//! - `parser` - RSS decoding into a [`Channel`] with ordered [`Item`]s
//! - `ingest` - turning items into deduplicated posts
//!
//! The [`crate::scheduler`] drives all three for one feed per cycle.

mod fetcher;
mod ingest;
mod parser;

pub use fetcher::{
    FetchError, Fetcher, FetcherConfig, DEFAULT_MAX_FEED_SIZE, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT,
};
pub use ingest::{ingest_items, IngestReport};
pub use parser::{parse_channel, Channel, Item, ParseError};
