//! Response construction helpers.
//!
//! Every response the proxy originates is JSON with
//! `Content-Type: application/json`, including forwarded upstream bodies
//! and the error envelopes (429/500/503).

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;

/// Serialized `{"error": <message>}` payload.
pub fn error_payload(message: &str) -> Bytes {
    Bytes::from(serde_json::json!({ "error": message }).to_string())
}

/// A JSON error response with the given status.
pub fn json_error(status: StatusCode, message: &str) -> Response {
    json_response(status, error_payload(message))
}

/// Wrap already-encoded body bytes in a JSON response.
pub fn json_response(status: StatusCode, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_payload_is_the_wire_format() {
        let payload = error_payload("Too Many Requests.");
        assert_eq!(&payload[..], br#"{"error":"Too Many Requests."}"#);
    }

    #[test]
    fn json_error_sets_status_and_content_type() {
        let response = json_error(StatusCode::SERVICE_UNAVAILABLE, "no healthy backends");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
