//! Community site monitor (ld246 open API).
//!
//! Two independent feeds are read on every poll:
//!
//! 1. **Recent activity**: page 1 of the latest-replied article listing,
//!    reconciled against a persisted `oId -> {update time, comment count}` map.
//!    The map is rewritten from the listing after every successful fetch, so it
//!    never grows beyond one page.
//! 2. **Unread messages**: per-category unread counts, then the message list
//!    of every category with unread items. Surfaced messages are recorded in
//!    an append-only seen-set. Chat is summarized by count only, and the
//!    summary is re-emitted while unread chat remains.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use beacon_common::config::AppConfig;
use beacon_common::error::FetchError;
use beacon_common::persist::{load_or_default, save_json};
use beacon_common::types::{Notification, Source, epoch_seconds};

use crate::http::{build_client, decode, success_body};
use crate::text::{SUMMARY_MAX_CHARS, summarize_html, truncate};
use crate::{FeedBatch, SourceMonitor};

pub const RECENT_ACTIVITY_FILE: &str = "community_recent_activity.json";
pub const SEEN_MESSAGES_FILE: &str = "community_seen_messages.json";

/// Message data types whose `dataId` refers to an article (or a comment on one).
const ARTICLE_DATA_TYPES: [i64; 10] = [3, 4, 9, 15, 16, 20, 22, 33, 34, 35];

/// Last known state of an article in the latest-activity listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleState {
    /// Raw remote update time (create time when never updated)
    pub last_update_time: i64,
    pub comment_count: i64,
}

/// Message categories fetched in detail, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCategory {
    Commented,
    At,
    Reply,
    Following,
}

impl MessageCategory {
    pub const FETCHED: [MessageCategory; 4] = [
        MessageCategory::Commented,
        MessageCategory::At,
        MessageCategory::Reply,
        MessageCategory::Following,
    ];

    /// Path segment and seen-set key prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageCategory::Commented => "commented",
            MessageCategory::At => "at",
            MessageCategory::Reply => "reply",
            MessageCategory::Following => "following",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            MessageCategory::Commented => "New comment on your post",
            MessageCategory::At => "You were mentioned",
            MessageCategory::Reply => "New reply to you",
            MessageCategory::Following => "Update from something you follow",
        }
    }

    fn unread(&self, counts: &UnreadCounts) -> i64 {
        match self {
            MessageCategory::Commented => counts.unread_commented_notification_cnt,
            MessageCategory::At => counts.unread_at_notification_cnt,
            MessageCategory::Reply => counts.unread_reply_notification_cnt,
            MessageCategory::Following => counts.unread_following_notification_cnt,
        }
    }
}

impl std::fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ------------------------------------------------------------
// Wire types
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LatestData {
    articles: Vec<Article>,
}

/// One entry of the latest-activity listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(rename = "oId")]
    pub o_id: String,
    #[serde(default)]
    pub article_title: String,
    #[serde(default)]
    pub article_preview_content: String,
    #[serde(default)]
    pub article_create_time: i64,
    #[serde(default)]
    pub article_update_time: i64,
    #[serde(default)]
    pub article_comment_count: i64,
}

impl Article {
    /// Activity time: update time, or create time for never-updated articles.
    fn activity_time(&self) -> i64 {
        if self.article_update_time == 0 {
            self.article_create_time
        } else {
            self.article_update_time
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UnreadCounts {
    unread_notification_cnt: i64,
    unread_commented_notification_cnt: i64,
    unread_at_notification_cnt: i64,
    unread_reply_notification_cnt: i64,
    unread_chat_notification_cnt: i64,
    unread_following_notification_cnt: i64,
}

/// One entry of a category message list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data_type: i64,
    #[serde(default)]
    pub data_id: String,
    #[serde(default)]
    pub created_time: i64,
    #[serde(default)]
    pub has_read: bool,
}

// ------------------------------------------------------------
// Reconciliation
// ------------------------------------------------------------

/// Result of comparing a fresh listing against tracked state.
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub notifications: Vec<Notification>,
    /// Replacement state: exactly one entry per listed article
    pub next_state: HashMap<String, ArticleState>,
    pub new_items: usize,
    pub updated_items: usize,
    pub purged_items: usize,
}

/// Compare `articles` against `previous` and decide what to surface.
///
/// - unknown article: new, id `community_article_{oId}`
/// - newer update time or more comments: updated, id suffixed with the new
///   update time so each round of replies gets its own identifier
/// - anything else: unchanged, nothing surfaced
pub fn reconcile_articles(
    previous: &HashMap<String, ArticleState>,
    articles: &[Article],
    base_url: &str,
) -> Reconciliation {
    let mut out = Reconciliation::default();

    for article in articles {
        let time = article.activity_time();
        let current = ArticleState {
            last_update_time: time,
            comment_count: article.article_comment_count,
        };

        let updated = match previous.get(&article.o_id) {
            None => false,
            Some(seen) => {
                if time > seen.last_update_time || current.comment_count > seen.comment_count {
                    true
                } else {
                    out.next_state.insert(article.o_id.clone(), current);
                    continue;
                }
            }
        };

        let (id, title) = if updated {
            out.updated_items += 1;
            (
                format!("community_article_{}_{}", article.o_id, time),
                format!("New reply: {}", article.article_title),
            )
        } else {
            out.new_items += 1;
            (
                format!("community_article_{}", article.o_id),
                article.article_title.clone(),
            )
        };

        let mut content = summarize_html(&article.article_preview_content);
        if content.is_empty() {
            content = article.article_title.clone();
        }

        out.notifications.push(Notification {
            id,
            title,
            content,
            link: format!("{}/article/{}", base_url, article.o_id),
            source: Source::Community,
            time: epoch_seconds(time),
        });
        out.next_state.insert(article.o_id.clone(), current);
    }

    out.purged_items = previous
        .keys()
        .filter(|id| !out.next_state.contains_key(*id))
        .count();

    out
}

/// Link for a message: its article when the data type points at one,
/// otherwise the site root.
pub fn message_link(base_url: &str, data_type: i64, data_id: &str) -> String {
    if !data_id.is_empty() && ARTICLE_DATA_TYPES.contains(&data_type) {
        format!("{}/article/{}", base_url, data_id)
    } else {
        base_url.to_string()
    }
}

// ------------------------------------------------------------
// Monitor
// ------------------------------------------------------------

/// Poller for the community site.
pub struct CommunityMonitor {
    token: String,
    base_url: String,
    client: reqwest::Client,
    articles_path: PathBuf,
    messages_path: PathBuf,
    articles: RwLock<HashMap<String, ArticleState>>,
    seen_messages: RwLock<BTreeSet<String>>,
}

impl CommunityMonitor {
    /// Create a monitor, loading persisted dedup state from `data_dir`.
    pub fn new(token: impl Into<String>, base_url: impl Into<String>, data_dir: &Path) -> Self {
        let articles_path = data_dir.join(RECENT_ACTIVITY_FILE);
        let messages_path = data_dir.join(SEEN_MESSAGES_FILE);

        let articles: HashMap<String, ArticleState> = load_or_default(&articles_path);
        let seen_messages: BTreeSet<String> = load_or_default(&messages_path);

        tracing::debug!(
            articles = articles.len(),
            seen_messages = seen_messages.len(),
            "Loaded community dedup state"
        );

        Self {
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(),
            articles_path,
            messages_path,
            articles: RwLock::new(articles),
            seen_messages: RwLock::new(seen_messages),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.community_token.clone(),
            config.community_base_url.clone(),
            &config.data_dir,
        )
    }

    /// Snapshot of tracked article state.
    pub fn article_state(&self) -> HashMap<String, ArticleState> {
        self.articles.read().clone()
    }

    pub fn has_seen_message(&self, key: &str) -> bool {
        self.seen_messages.read().contains(key)
    }

    fn require_token(&self) -> Result<(), FetchError> {
        if self.token.trim().is_empty() {
            return Err(FetchError::MissingToken(Source::Community));
        }
        Ok(())
    }

    /// GET an API path and unwrap the `{code, msg, data}` envelope.
    ///
    /// `Ok(None)` means the server reported success without a payload.
    async fn get_data<T>(&self, path: &str) -> Result<Option<T>, FetchError>
    where
        T: DeserializeOwned,
    {
        let resp = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header(AUTHORIZATION, format!("token {}", self.token))
            .send()
            .await?;
        let body = success_body(resp).await?;
        let envelope: Envelope<T> = decode(&body, path)?;

        if envelope.code != 0 {
            return Err(FetchError::Api {
                code: envelope.code,
                message: envelope.msg,
            });
        }

        Ok(envelope.data)
    }

    /// Like [`Self::get_data`], for endpoints whose payload is mandatory.
    async fn require_data<T>(&self, path: &str) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
    {
        self.get_data(path)
            .await?
            .ok_or_else(|| FetchError::MissingData(path.to_string()))
    }

    /// Reconcile the latest-activity listing and return new or updated articles.
    ///
    /// A response without a listing is an error and leaves the tracked state
    /// untouched.
    pub async fn fetch_recent_activity(&self) -> Result<Vec<Notification>, FetchError> {
        self.require_token()?;

        let data: LatestData = self
            .require_data("/api/v2/articles/latest/reply?p=1")
            .await?;

        let reconciliation = {
            let mut state = self.articles.write();
            let mut reconciliation = reconcile_articles(&state, &data.articles, &self.base_url);
            *state = std::mem::take(&mut reconciliation.next_state);

            if let Err(e) = save_json(&self.articles_path, &*state) {
                tracing::warn!(error = %e, "Failed to persist community article state");
            }
            reconciliation
        };

        if reconciliation.purged_items > 0 {
            tracing::debug!(
                purged = reconciliation.purged_items,
                "Dropped articles no longer in the latest listing"
            );
        }

        tracing::info!(
            listed = data.articles.len(),
            new = reconciliation.new_items,
            updated = reconciliation.updated_items,
            "Reconciled community recent activity"
        );
        Ok(reconciliation.notifications)
    }

    /// Fetch unread messages across categories and return unseen ones.
    pub async fn fetch_unread_messages(&self) -> Result<Vec<Notification>, FetchError> {
        self.require_token()?;

        let counts: UnreadCounts = self
            .require_data("/api/v2/notifications/unread/count")
            .await?;

        tracing::debug!(
            total = counts.unread_notification_cnt,
            commented = counts.unread_commented_notification_cnt,
            at = counts.unread_at_notification_cnt,
            reply = counts.unread_reply_notification_cnt,
            following = counts.unread_following_notification_cnt,
            chat = counts.unread_chat_notification_cnt,
            "Community unread counts"
        );

        if counts.unread_notification_cnt == 0 {
            return Ok(Vec::new());
        }

        let mut notifications = Vec::new();

        for category in MessageCategory::FETCHED {
            if category.unread(&counts) <= 0 {
                continue;
            }
            match self.fetch_category(category).await {
                Ok(mut batch) => notifications.append(&mut batch),
                Err(e) => {
                    tracing::error!(category = %category, error = %e, "Failed to fetch community messages");
                }
            }
        }

        if let Some(chat) = self.chat_notification(counts.unread_chat_notification_cnt) {
            notifications.push(chat);
        }

        tracing::info!(count = notifications.len(), "Fetched community unread messages");
        Ok(notifications)
    }

    async fn fetch_category(
        &self,
        category: MessageCategory,
    ) -> Result<Vec<Notification>, FetchError> {
        let path = format!("/api/v2/notifications/{}?p=1", category.as_str());
        let messages: Vec<Message> = self.get_data(&path).await?.unwrap_or_default();

        let notifications = {
            let mut seen = self.seen_messages.write();
            let mut notifications = Vec::new();

            for message in &messages {
                if message.has_read {
                    continue;
                }
                let key = format!("{}_{}", category.as_str(), message.id);
                if !seen.insert(key) {
                    continue;
                }
                notifications.push(Notification {
                    id: format!("community_{}_{}", category.as_str(), message.id),
                    title: category.title().to_string(),
                    content: truncate(&message.msg, SUMMARY_MAX_CHARS),
                    link: message_link(&self.base_url, message.data_type, &message.data_id),
                    source: Source::Community,
                    time: epoch_seconds(message.created_time),
                });
            }

            if !notifications.is_empty()
                && let Err(e) = save_json(&self.messages_path, &*seen)
            {
                tracing::warn!(error = %e, "Failed to persist community seen messages");
            }
            notifications
        };

        tracing::debug!(
            category = %category,
            listed = messages.len(),
            new = notifications.len(),
            "Processed community message category"
        );
        Ok(notifications)
    }

    /// Synthetic chat summary, emitted on every poll with unread chat.
    ///
    /// The identifier embeds the count; repeats are absorbed downstream by
    /// the delivery guard and the store, which both key on it.
    fn chat_notification(&self, count: i64) -> Option<Notification> {
        (count > 0).then(|| Notification {
            id: format!("community_chat_{count}"),
            title: format!("Chat messages ({count})"),
            content: format!("You have {count} unread chat messages"),
            link: format!("{}/chats", self.base_url),
            source: Source::Community,
            time: chrono::Utc::now().timestamp(),
        })
    }
}

#[async_trait]
impl SourceMonitor for CommunityMonitor {
    fn source(&self) -> Source {
        Source::Community
    }

    async fn poll(&self) -> Vec<FeedBatch> {
        vec![
            FeedBatch::new("recent_activity", self.fetch_recent_activity().await),
            FeedBatch::new("unread_messages", self.fetch_unread_messages().await),
        ]
    }
}
