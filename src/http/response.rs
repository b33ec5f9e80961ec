//! Response construction.
//!
//! # Responsibilities
//! - Build the streaming `200 OK` head for relayed payloads
//! - Build plain-text error responses
//! - Keep the header set identical across every response path
//!
//! # Design Decisions
//! - Every response asks the client to close the connection; one request
//!   per connection keeps the relay lifecycle tied to the socket
//! - Success responses disable caching; live streams must not be replayed

use axum::body::Body;
use axum::http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONNECTION, CONTENT_LENGTH,
    CONTENT_TYPE, PRAGMA,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

pub const STREAM_CONTENT_TYPE: &str = "application/octet-stream";
const STREAM_CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";
const ERROR_CACHE_CONTROL: &str = "private, no-cache, must-revalidate";

/// `200 OK` carrying relayed payload in `body`.
pub fn stream_response(body: Body) -> Response {
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static(STREAM_CONTENT_TYPE)),
            (ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            (CONNECTION, HeaderValue::from_static("close")),
            (CACHE_CONTROL, HeaderValue::from_static(STREAM_CACHE_CONTROL)),
            (PRAGMA, HeaderValue::from_static("no-cache")),
        ],
        body,
    )
        .into_response()
}

/// Answer to a valid `HEAD` request.
pub fn head_response() -> Response {
    stream_response(Body::empty())
}

/// Plain-text error whose body is `"<code> <reason>"`.
pub fn error_response(status: StatusCode, reason: &str) -> Response {
    let body = format!("{} {}", status.as_u16(), reason);
    (
        status,
        [
            (CONTENT_TYPE, HeaderValue::from_static("text/plain")),
            (CONTENT_LENGTH, HeaderValue::from(body.len())),
            (ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            (CONNECTION, HeaderValue::from_static("close")),
            (CACHE_CONTROL, HeaderValue::from_static(ERROR_CACHE_CONTROL)),
        ],
        body,
    )
        .into_response()
}
