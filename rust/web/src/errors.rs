/// Error reporting shared by the socket and HTTP surfaces
///
/// This module provides:
/// - Severity classification used to pick a log level
/// - `IntoClientError` for errors delivered to a socket as an `error` event
/// - `IntoErrorResponse` for errors rendered as HTTP JSON bodies
use serde::{Deserialize, Serialize};
use std::fmt;
use warp::http::StatusCode;
use warp::reply::{self, Response};
use warp::Reply;

/// JSON body for HTTP error responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
    /// Machine-readable code, omitted on the public 404 body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
        }
    }

    pub fn with_code(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
        }
    }

    /// Convert to HTTP response with specified status code
    pub fn into_response(self, status: StatusCode) -> Response {
        reply::with_status(reply::json(&self), status).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {}", code, self.error),
            None => f.write_str(&self.error),
        }
    }
}

/// Error classification for logging levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Caused by the client; expected during normal operation
    Client,
    /// Unexpected server-side failure
    Server,
}

/// Errors that are reported back to a single connection.
///
/// Clients only ever see [`IntoClientError::client_message`]; the code and
/// severity stay in the server logs.
pub trait IntoClientError {
    /// Machine-readable code for logs
    fn error_code(&self) -> &'static str;

    /// Text sent in the `error{message}` event
    fn client_message(&self) -> String;

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Client
    }

    /// Logs the error against `connection_id` at a level matching its severity
    fn log_for(&self, connection_id: &str) {
        match self.severity() {
            ErrorSeverity::Client => tracing::info!(
                connection_id = %connection_id,
                code = self.error_code(),
                message = %self.client_message(),
                "rejected client request"
            ),
            ErrorSeverity::Server => tracing::error!(
                connection_id = %connection_id,
                code = self.error_code(),
                message = %self.client_message(),
                "failed to handle client request"
            ),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait IntoErrorResponse {
    fn status_code(&self) -> StatusCode;

    fn error_code(&self) -> &'static str;

    fn error_message(&self) -> String;

    fn severity(&self) -> ErrorSeverity {
        if self.status_code().is_server_error() {
            ErrorSeverity::Server
        } else {
            ErrorSeverity::Client
        }
    }

    fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse::with_code(self.error_message(), self.error_code())
    }

    /// Convert to HTTP response with logging
    fn into_http_response(self) -> Response
    where
        Self: Sized,
    {
        let status = self.status_code();
        let body = self.to_error_response();

        match self.severity() {
            ErrorSeverity::Client => {
                tracing::debug!(status = status.as_u16(), error = %body, "client error")
            }
            ErrorSeverity::Server => {
                tracing::error!(status = status.as_u16(), error = %body, "server error")
            }
        }

        body.into_response(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_omits_missing_code() {
        let error = ErrorResponse::new("Error 404: The page not found");
        let json = serde_json::to_value(&error).expect("serialize");

        assert_eq!(json["error"], "Error 404: The page not found");
        assert!(json.get("code").is_none());
    }

    #[test]
    fn error_response_display_includes_code() {
        let error = ErrorResponse::with_code("asset not found", "static_not_found");
        assert_eq!(error.to_string(), "static_not_found: asset not found");
    }

    struct Sample(StatusCode);

    impl IntoErrorResponse for Sample {
        fn status_code(&self) -> StatusCode {
            self.0
        }

        fn error_code(&self) -> &'static str {
            "sample"
        }

        fn error_message(&self) -> String {
            "sample failed".into()
        }
    }

    #[test]
    fn severity_follows_status_class() {
        assert_eq!(Sample(StatusCode::NOT_FOUND).severity(), ErrorSeverity::Client);
        assert_eq!(
            Sample(StatusCode::INTERNAL_SERVER_ERROR).severity(),
            ErrorSeverity::Server
        );
        let response = Sample(StatusCode::GONE).into_http_response();
        assert_eq!(response.status(), StatusCode::GONE);
    }
}
