//! Utility functions for common operations.
//!
//! - **Time**: publish-date normalization and the injectable [`Clock`]
//! - **URL validation**: checks applied to feed URLs before they are stored
//!
//! # Examples
//!
//! ```
//! use gator::util::{parse_published, validate_feed_url};
//!
//! let url = validate_feed_url("https://example.com/feed.xml", false).unwrap();
//! let published = parse_published("2023-01-01T10:00:00Z").unwrap();
//! ```

mod clock;
mod time;
mod url_validator;

pub use clock::{Clock, ManualClock, SystemClock};
pub(crate) use time::from_millis;
pub use time::{parse_published, TimeParseError};
pub use url_validator::{validate_feed_url, UrlValidationError};
