//! gator: a command-line RSS aggregator.
//!
//! Feeds are stored in SQLite, fetched one at a time by the [`scheduler`]
//! in least-recently-fetched order, and their items saved as posts that
//! each user can browse for the feeds they follow.

pub mod commands;
pub mod config;
pub mod feed;
pub mod scheduler;
pub mod storage;
pub mod util;
