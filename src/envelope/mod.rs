//! JSON response envelope
//!
//! Every error answered by the gateway itself (filter rejections, method
//! mismatches, unknown routes) uses the same shape:
//!
//! ```json
//! {"statusCode": 401, "message": "unauthorized", "body": null}
//! ```

use crate::filter::ResponseSink;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Uniform JSON wrapper for gateway-generated responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope<T = serde_json::Value> {
    pub status_code: u16,
    pub message: String,
    pub body: Option<T>,
}

impl<T> ResponseEnvelope<T> {
    pub fn new(status: StatusCode, message: impl Into<String>, body: Option<T>) -> Self {
        Self {
            status_code: status.as_u16(),
            message: message.into(),
            body,
        }
    }
}

/// Build an envelope response through `sink`.
///
/// The status and JSON content type are always set. If the envelope cannot
/// be serialized the failure is logged and the body is left empty.
pub fn write_envelope<T: Serialize>(
    sink: &ResponseSink,
    message: &str,
    status: StatusCode,
    body: Option<T>,
) -> Response {
    let envelope = ResponseEnvelope::new(status, message, body);
    let bytes = match serde_json::to_vec(&envelope) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to encode response envelope: {}", e);
            Vec::new()
        }
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    sink.apply(&mut response);
    response
}

/// Envelope with no body
pub fn error_envelope(sink: &ResponseSink, message: &str, status: StatusCode) -> Response {
    write_envelope::<serde_json::Value>(sink, message, status, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderName;
    use std::collections::BTreeMap;

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_envelope_exact_shape() {
        let response = error_envelope(
            &ResponseSink::new(),
            "unauthorized",
            StatusCode::UNAUTHORIZED,
        );

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(
            body_string(response).await,
            r#"{"statusCode":401,"message":"unauthorized","body":null}"#
        );
    }

    #[tokio::test]
    async fn test_envelope_with_body() {
        let response = write_envelope(
            &ResponseSink::new(),
            "created",
            StatusCode::CREATED,
            Some(serde_json::json!({"id": 7})),
        );

        let parsed: ResponseEnvelope = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(parsed.status_code, 201);
        assert_eq!(parsed.message, "created");
        assert_eq!(parsed.body, Some(serde_json::json!({"id": 7})));
    }

    #[tokio::test]
    async fn test_envelope_applies_sink_headers() {
        let sink = ResponseSink::new().with_header(
            HeaderName::from_static("x-trace"),
            HeaderValue::from_static("t-1"),
        );
        let response = error_envelope(&sink, "denied", StatusCode::FORBIDDEN);
        assert_eq!(response.headers()["x-trace"], "t-1");
    }

    #[tokio::test]
    async fn test_encoding_failure_keeps_status() {
        // JSON object keys must be strings
        let mut body = BTreeMap::new();
        body.insert((1, 2), "pair");

        let response = write_envelope(
            &ResponseSink::new(),
            "broken",
            StatusCode::BAD_REQUEST,
            Some(body),
        );

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(body_string(response).await, "");
    }
}
