//! Request-level errors and their HTTP mapping.

use std::io;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::response::error_response;
use crate::relay::path::PathRejection;

/// Everything that can end a relay request early.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The request path was refused.
    #[error(transparent)]
    Path(#[from] PathRejection),

    /// Only `GET` and `HEAD` are served.
    #[error("method {0} not allowed")]
    MethodNotAllowed(Method),

    /// The group produced nothing before the idle timeout.
    #[error("no data received after {:.2} seconds", .0.as_secs_f64())]
    NoData(Duration),

    /// Opening or reading the multicast socket failed.
    #[error("multicast socket error: {0}")]
    Socket(#[source] io::Error),

    /// Writing to the client failed for a reason other than disconnect.
    #[error("client write failed: {0}")]
    ClientWrite(#[source] io::Error),

    /// The server stopped before the relay produced a response.
    #[error("server shutting down")]
    ShuttingDown,
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Path(rejection) if rejection.is_forbidden() => StatusCode::FORBIDDEN,
            RelayError::Path(_) => StatusCode::BAD_REQUEST,
            RelayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::NoData(_) => StatusCode::NOT_FOUND,
            RelayError::Socket(_) | RelayError::ClientWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Text shown to the client after the status code.
    pub fn reason(&self) -> String {
        match self {
            RelayError::Path(rejection) if rejection.is_forbidden() => "Forbidden".to_string(),
            RelayError::Path(_) => "Bad request".to_string(),
            RelayError::MethodNotAllowed(_) => "Method not allowed".to_string(),
            RelayError::NoData(waited) => {
                format!("No data received after {:.2} seconds\n", waited.as_secs_f64())
            }
            RelayError::Socket(_) | RelayError::ClientWrite(_) => "Internal server error".to_string(),
            RelayError::ShuttingDown => "Service unavailable".to_string(),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        error_response(self.status(), &self.reason())
    }
}
