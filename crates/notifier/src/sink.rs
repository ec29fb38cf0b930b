use std::time::Duration;

use async_trait::async_trait;

use beacon_common::error::DeliveryError;
use beacon_common::types::Notification;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Final hand-off of a notification to the user.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Writes each notification as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl DeliverySink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        tracing::info!(
            id = %notification.id,
            source = %notification.source,
            title = %notification.title,
            link = %notification.link,
            "Notification"
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a configured URL.
///
/// Any non-2xx response counts as a failed delivery.
pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DeliverySink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(
                id = %notification.id,
                status = status.as_u16(),
                "Webhook rejected notification"
            );
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
            });
        }

        tracing::debug!(id = %notification.id, "Delivered notification to webhook");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_common::types::Source;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample() -> Notification {
        Notification {
            id: "github_1".to_string(),
            title: "[o/r] Title".to_string(),
            content: "Title".to_string(),
            link: "https://github.com/o/r/issues/1".to_string(),
            source: Source::Github,
            time: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn test_log_sink_always_succeeds() {
        assert!(LogSink.deliver(&sample()).await.is_ok());
    }

    #[tokio::test]
    async fn test_webhook_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({
                "id": "github_1",
                "source": "github"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sink = WebhookSink::new(format!("{}/hook", server.uri())).unwrap();
        sink.deliver(&sample()).await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_non_success_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sink = WebhookSink::new(server.uri()).unwrap();
        let err = sink.deliver(&sample()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected { status: 500 }));
    }
}
