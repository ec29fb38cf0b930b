use serde::{Deserialize, Serialize};

/// Remote services a notification can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Remote issue tracker (GitHub notifications API).
    Github,
    /// Community site (ld246 open API).
    Community,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Github => write!(f, "github"),
            Source::Community => write!(f, "community"),
        }
    }
}

/// A single thing the user should be told about.
///
/// The `id` is stable across repeated fetches of the same logical event, so it
/// doubles as the dedup key for both the delivery guard and the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    /// Short plain-text summary
    pub content: String,
    /// Browser-facing link
    pub link: String,
    pub source: Source,
    /// Occurrence time in Unix epoch seconds
    pub time: i64,
}

/// Anything above this is a millisecond epoch (year 5138 in seconds).
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Normalize a remote epoch value to seconds.
///
/// The community site reports milliseconds; everything stored in a
/// [`Notification`] is seconds.
pub fn epoch_seconds(raw: i64) -> i64 {
    if raw.abs() >= MILLIS_THRESHOLD {
        raw / 1000
    } else {
        raw
    }
}
