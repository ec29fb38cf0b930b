//! Remote issue tracker monitor (GitHub notifications API).
//!
//! Each poll fetches `/notifications` with a conditional-request cursor:
//! the `Last-Modified` value of the previous successful response is sent back
//! as both `?since=` and `If-Modified-Since`, so an idle account costs one
//! cheap 304 per tick. The cursor lives only in memory and starts empty on
//! every new monitor instance.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, IF_MODIFIED_SINCE, LAST_MODIFIED};
use serde::Deserialize;

use beacon_common::config::AppConfig;
use beacon_common::error::FetchError;
use beacon_common::types::{Notification, Source};

use crate::http::{build_client, decode, success_body};
use crate::text::{SUMMARY_MAX_CHARS, truncate};
use crate::{FeedBatch, SourceMonitor};

const ACCEPT_V3: &str = "application/vnd.github.v3+json";

/// Subject type that needs a second request to find its browser link.
const SUBJECT_RELEASE: &str = "Release";

#[derive(Debug, Deserialize)]
struct Thread {
    id: String,
    repository: Repository,
    subject: Subject,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct Subject {
    title: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Release {
    #[serde(default)]
    tag_name: String,
    #[serde(default)]
    html_url: String,
}

/// Poller for the issue tracker's notification threads.
pub struct GithubMonitor {
    token: String,
    api_base: String,
    web_base: String,
    client: reqwest::Client,
    /// Last-Modified of the most recent successful response.
    cursor: RwLock<Option<DateTime<Utc>>>,
}

impl GithubMonitor {
    pub fn new(
        token: impl Into<String>,
        api_base: impl Into<String>,
        web_base: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            web_base: web_base.into().trim_end_matches('/').to_string(),
            client: build_client(),
            cursor: RwLock::new(None),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.github_token.clone(),
            config.github_api_url.clone(),
            config.github_web_url.clone(),
        )
    }

    /// Current conditional-fetch cursor, if any response has set one.
    pub fn cursor(&self) -> Option<DateTime<Utc>> {
        *self.cursor.read()
    }

    /// Fetch threads updated since the stored cursor.
    pub async fn fetch(&self) -> Result<Vec<Notification>, FetchError> {
        self.fetch_since(None).await
    }

    /// Fetch threads updated after `since`, or after the stored cursor when
    /// `since` is `None`.
    ///
    /// The cursor is advanced after every 200 or 304 response that carries a
    /// fresher `Last-Modified`, and left untouched on any error.
    pub async fn fetch_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, FetchError> {
        if self.token.trim().is_empty() {
            return Err(FetchError::MissingToken(Source::Github));
        }

        let cursor = since.or_else(|| self.cursor());

        let mut request = self
            .client
            .get(format!("{}/notifications", self.api_base))
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, ACCEPT_V3);

        if let Some(cursor) = cursor {
            tracing::debug!(since = %cursor, "Conditional notifications request");
            request = request
                .query(&[("since", cursor.to_rfc3339_opts(SecondsFormat::Secs, true))])
                .header(IF_MODIFIED_SINCE, http_date(cursor));
        }

        let resp = request.send().await?;

        let last_modified = resp
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date);

        if let Some(interval) = resp
            .headers()
            .get("x-poll-interval")
            .and_then(|v| v.to_str().ok())
        {
            tracing::debug!(poll_interval = interval, "Server suggested poll interval");
        }

        if resp.status() == StatusCode::NOT_MODIFIED {
            tracing::debug!("Notifications not modified since last poll");
            self.advance_cursor(last_modified);
            return Ok(Vec::new());
        }

        let body = success_body(resp).await?;
        let threads: Vec<Thread> = decode(&body, "github notifications")?;
        self.advance_cursor(last_modified);

        let mut notifications = Vec::with_capacity(threads.len());
        for thread in threads {
            let link = self.thread_link(&thread).await;
            notifications.push(Notification {
                id: format!("github_{}", thread.id),
                title: format!("[{}] {}", thread.repository.full_name, thread.subject.title),
                content: truncate(&thread.subject.title, SUMMARY_MAX_CHARS),
                link,
                source: Source::Github,
                time: thread.updated_at.timestamp(),
            });
        }

        tracing::info!(count = notifications.len(), "Fetched GitHub notifications");
        Ok(notifications)
    }

    fn advance_cursor(&self, last_modified: Option<DateTime<Utc>>) {
        let Some(next) = last_modified else {
            return;
        };
        let mut cursor = self.cursor.write();
        match *cursor {
            Some(current) if current >= next => {}
            _ => {
                tracing::debug!(cursor = %next, "Advanced notifications cursor");
                *cursor = Some(next);
            }
        }
    }

    /// Browser-facing link for a thread's subject.
    async fn thread_link(&self, thread: &Thread) -> String {
        let fallback = thread.html_url.clone().unwrap_or_default();

        let Some(api_url) = thread.subject.url.as_deref().filter(|u| !u.is_empty()) else {
            return fallback;
        };

        if thread.subject.kind != SUBJECT_RELEASE {
            return self.browser_link(api_url);
        }

        match self
            .resolve_release_link(api_url, &thread.repository.full_name)
            .await
        {
            Ok(Some(link)) => link,
            Ok(None) => {
                tracing::warn!(api_url, "Release has neither html_url nor tag_name");
                fallback
            }
            Err(e) => {
                tracing::warn!(api_url, error = %e, "Failed to resolve release link");
                fallback
            }
        }
    }

    /// Convert an API reference into its browser equivalent.
    ///
    /// `{api}/repos/o/r/pulls/1` becomes `{web}/o/r/pull/1`; URLs outside the
    /// API base are returned unchanged.
    pub fn browser_link(&self, api_url: &str) -> String {
        let Some(path) = api_url.strip_prefix(&self.api_base) else {
            return api_url.to_string();
        };
        let link = match path.strip_prefix("/repos/") {
            Some(rest) => format!("{}/{}", self.web_base, rest),
            None => format!("{}{}", self.web_base, path),
        };
        link.replace("/pulls/", "/pull/")
    }

    async fn resolve_release_link(
        &self,
        api_url: &str,
        repo_full_name: &str,
    ) -> Result<Option<String>, FetchError> {
        let resp = self
            .client
            .get(api_url)
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, ACCEPT_V3)
            .send()
            .await?;
        let body = success_body(resp).await?;
        let release: Release = decode(&body, "github release")?;

        if !release.html_url.is_empty() {
            return Ok(Some(release.html_url));
        }
        if !release.tag_name.is_empty() {
            return Ok(Some(format!(
                "{}/{}/releases/tag/{}",
                self.web_base, repo_full_name, release.tag_name
            )));
        }
        Ok(None)
    }
}

#[async_trait]
impl SourceMonitor for GithubMonitor {
    fn source(&self) -> Source {
        Source::Github
    }

    async fn poll(&self) -> Vec<FeedBatch> {
        vec![FeedBatch::new("notifications", self.fetch().await)]
    }
}

/// Format as an RFC 7231 IMF-fixdate.
pub fn http_date(t: DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an HTTP date header value.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
