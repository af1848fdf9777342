use chrono::{DateTime, Utc};
use thiserror::Error;

/// RFC 1123 with a numeric zone, e.g. `Mon, 02 Jan 2006 15:04:05 -0700`.
const RFC1123_NUMERIC_ZONE: &str = "%a, %d %b %Y %H:%M:%S %z";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unrecognized publish date: {0:?}")]
pub struct TimeParseError(pub String);

/// Parses a feed item's publish date into a UTC instant.
///
/// Tries RFC 3339 first, then RFC 1123 with a numeric zone. Anything else
/// is an error; callers treat that as "publish date unknown".
///
/// # Examples
///
/// ```
/// use gator::util::parse_published;
///
/// assert!(parse_published("2023-01-01T10:00:00Z").is_ok());
/// assert!(parse_published("Mon, 02 Jan 2006 15:04:05 -0700").is_ok());
/// assert!(parse_published("not-a-date").is_err());
/// ```
pub fn parse_published(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let trimmed = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(trimmed, RFC1123_NUMERIC_ZONE) {
        return Ok(dt.with_timezone(&Utc));
    }

    Err(TimeParseError(s.to_string()))
}

/// Converts a stored Unix millisecond value back into an instant.
pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
