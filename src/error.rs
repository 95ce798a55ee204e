//! Error types for registration, dispatch and response writing.
//!
//! Runtime failures are funnelled into [`RouteError`] and handed to the error
//! pipeline. Registration misuse and response-writing misuse have their own
//! small enums so callers can match on them.

use std::any::Any;
use std::fmt;

/// Which parser rejected the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseKind {
    /// `application/json` body
    Json,
    /// `application/x-www-form-urlencoded` body
    UrlEncoded,
    /// Query string
    Query,
}

impl fmt::Display for ParseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseKind::Json => write!(f, "json"),
            ParseKind::UrlEncoded => write!(f, "urlencoded"),
            ParseKind::Query => write!(f, "query"),
        }
    }
}

/// An error raised while processing a request.
///
/// Every variant maps to an HTTP status through [`RouteError::status`], which the
/// dispatcher uses when no error middleware handles the error.
#[derive(Debug)]
pub enum RouteError {
    /// Malformed request body or query string
    Parse {
        /// Parser that failed
        kind: ParseKind,
        /// Human readable reason
        message: String,
    },
    /// Request body larger than the configured limit
    PayloadTooLarge {
        /// Configured limit in bytes
        limit: usize,
        /// Actual body size in bytes
        actual: usize,
    },
    /// Error carrying an explicit status chosen by application code
    Status {
        /// HTTP status code
        status: u16,
        /// Human readable reason
        message: String,
    },
    /// Error returned by a handler or middleware
    Handler(anyhow::Error),
    /// Handler or error handler panicked
    Panic(String),
    /// The isolated execution context could not be created
    Spawn(String),
}

impl RouteError {
    /// Create an error with an explicit HTTP status.
    ///
    /// Handlers can return this through `anyhow` (`Err(RouteError::with_status(..).into())`)
    /// and the dispatcher unwraps it again, keeping the status.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        RouteError::Status {
            status,
            message: message.into(),
        }
    }

    /// HTTP status used by the fallback responder.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            RouteError::Parse { .. } => 400,
            RouteError::PayloadTooLarge { .. } => 413,
            RouteError::Status { status, .. } => *status,
            RouteError::Handler(_) | RouteError::Panic(_) | RouteError::Spawn(_) => 500,
        }
    }

    /// Convert an `anyhow::Error` coming back from user code.
    ///
    /// If the error already is a `RouteError` it is unwrapped instead of being
    /// nested inside `RouteError::Handler`.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<RouteError>() {
            Ok(route_err) => route_err,
            Err(other) => RouteError::Handler(other),
        }
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::Parse { kind, message } => {
                write!(f, "failed to parse {kind} request data: {message}")
            }
            RouteError::PayloadTooLarge { limit, actual } => {
                write!(f, "request body of {actual} bytes exceeds limit of {limit} bytes")
            }
            RouteError::Status { status, message } => write!(f, "{status}: {message}"),
            RouteError::Handler(err) => write!(f, "handler error: {err:#}"),
            RouteError::Panic(msg) => write!(f, "handler panicked: {msg}"),
            RouteError::Spawn(msg) => write!(f, "failed to spawn handler coroutine: {msg}"),
        }
    }
}

impl std::error::Error for RouteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RouteError::Handler(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Misuse of the response writing contract.
#[derive(Debug)]
pub enum ResponseError {
    /// The response was already finalized; at most one terminal write is allowed
    AlreadySent,
    /// Status code outside 100..=999
    InvalidStatus(u16),
    /// Header name or value is not valid HTTP
    InvalidHeader {
        /// Offending header name
        name: String,
    },
    /// `data` could not be serialized to JSON
    Serialize(serde_json::Error),
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseError::AlreadySent => write!(f, "response already sent"),
            ResponseError::InvalidStatus(code) => write!(f, "invalid status code {code}"),
            ResponseError::InvalidHeader { name } => write!(f, "invalid header '{name}'"),
            ResponseError::Serialize(err) => write!(f, "failed to serialize response: {err}"),
        }
    }
}

impl std::error::Error for ResponseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResponseError::Serialize(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ResponseError {
    fn from(err: serde_json::Error) -> Self {
        ResponseError::Serialize(err)
    }
}

/// Misuse of the registration API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The method string is not a valid HTTP method token
    InvalidMethod(String),
    /// Error middleware was registered after the one-shot flush at startup
    ErrorPipelineFinalized,
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::InvalidMethod(method) => {
                write!(f, "invalid HTTP method '{method}'")
            }
            RegistrationError::ErrorPipelineFinalized => write!(
                f,
                "error middleware registered after finalize; it will never run. \
                Register error middleware before calling JsonRoutes::finalize()"
            ),
        }
    }
}

impl std::error::Error for RegistrationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let parse = RouteError::Parse {
            kind: ParseKind::Json,
            message: "eof".into(),
        };
        assert_eq!(parse.status(), 400);
        assert_eq!(
            RouteError::PayloadTooLarge {
                limit: 1,
                actual: 2
            }
            .status(),
            413
        );
        assert_eq!(RouteError::with_status(418, "teapot").status(), 418);
        assert_eq!(RouteError::Panic("boom".into()).status(), 500);
    }

    #[test]
    fn test_from_anyhow_unwraps_route_error() {
        let err: anyhow::Error = RouteError::with_status(404, "missing").into();
        let route_err = RouteError::from_anyhow(err);
        assert_eq!(route_err.status(), 404);

        let other = RouteError::from_anyhow(anyhow::anyhow!("db down"));
        assert!(matches!(other, RouteError::Handler(_)));
        assert_eq!(other.status(), 500);
        assert!(other.to_string().contains("db down"));
    }

    #[test]
    fn test_panic_message_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
