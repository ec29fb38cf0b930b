use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::types::Source;

/// Errors surfaced by the local HTTP control surface.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        };

        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

/// Failure of a single monitor fetch. Every variant is non-fatal: the tick is
/// abandoned and the next tick proceeds normally.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Input error, raised before any request is attempted.
    #[error("{0} token is not configured")]
    MissingToken(Source),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response (auth failure and rate limiting included).
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// 2xx response whose envelope reports an application-level failure.
    #[error("API error (code {code}): {message}")]
    Api { code: i64, message: String },

    /// Successful envelope without the payload the endpoint must carry.
    #[error("Response from {0} carried no data")]
    MissingData(String),

    #[error("Decode error: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        /// Raw body kept for diagnosis
        body: String,
    },
}

impl FetchError {
    pub fn decode(source: serde_json::Error, body: impl Into<String>) -> Self {
        FetchError::Decode {
            source,
            body: body.into(),
        }
    }
}

/// State file could not be written.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A delivery sink failed to present a notification.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Delivery transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Delivery rejected with status {status}")]
    Rejected { status: u16 },

    #[error("Delivery sink unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token_message_names_source() {
        let err = FetchError::MissingToken(Source::Github);
        assert_eq!(err.to_string(), "github token is not configured");
    }

    #[test]
    fn test_status_error_includes_body() {
        let err = FetchError::Status {
            status: 401,
            body: "Bad credentials".to_string(),
        };
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("Bad credentials"));
    }

    #[test]
    fn test_app_error_status_codes() {
        let resp = AppError::Conflict("stopped".into()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let resp = AppError::Validation("bad".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
