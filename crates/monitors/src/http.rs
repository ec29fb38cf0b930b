use std::time::Duration;

use serde::de::DeserializeOwned;

use beacon_common::error::FetchError;

/// Request timeout for every remote call; a stuck endpoint must not wedge a
/// polling loop.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) const USER_AGENT: &str = concat!("beacon/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client for a monitor.
pub(crate) fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to build tuned HTTP client, using defaults");
            reqwest::Client::new()
        })
}

/// Read the body of a response, turning any non-2xx status into
/// [`FetchError::Status`].
pub(crate) async fn success_body(resp: reqwest::Response) -> Result<String, FetchError> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

/// Decode a JSON body, logging the raw payload on failure.
pub(crate) fn decode<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, FetchError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(what, error = %e, body, "Failed to decode response");
        FetchError::decode(e, body)
    })
}
