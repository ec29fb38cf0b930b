pub mod community;
pub mod github;
mod http;
pub mod text;

use async_trait::async_trait;

use beacon_common::error::FetchError;
use beacon_common::types::{Notification, Source};

pub use community::CommunityMonitor;
pub use github::GithubMonitor;

/// Outcome of one independent sub-fetch within a poll.
///
/// A monitor may read several feeds per tick; a failure in one feed never
/// discards the batch produced by another.
#[derive(Debug)]
pub struct FeedBatch {
    /// Short feed label used in logs (e.g. "recent_activity")
    pub feed: &'static str,
    /// New notifications, already deduplicated against persisted state
    pub result: Result<Vec<Notification>, FetchError>,
}

impl FeedBatch {
    pub fn new(feed: &'static str, result: Result<Vec<Notification>, FetchError>) -> Self {
        Self { feed, result }
    }
}

/// Trait implemented by every polled remote source.
#[async_trait]
pub trait SourceMonitor: Send + Sync {
    /// Source tag stamped on every notification this monitor produces.
    fn source(&self) -> Source;

    /// Fetch every feed once and return what is new since the last poll.
    async fn poll(&self) -> Vec<FeedBatch>;
}
