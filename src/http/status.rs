//! Classification of non-success HTTP responses.

use reqwest::StatusCode;

/// A response that came back with a non-success status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    /// HTTP 401
    AuthenticationFailed(u16),
    /// HTTP 403
    Forbidden(u16),
    /// HTTP 404
    NotFound(u16),
    /// HTTP 429
    RateLimitExceeded(u16),
    /// Other 4xx
    ClientError(u16),
    /// 5xx and anything else unexpected
    ServerError(u16),
}

impl HttpFailure {
    pub fn status(&self) -> u16 {
        match self {
            HttpFailure::AuthenticationFailed(s)
            | HttpFailure::Forbidden(s)
            | HttpFailure::NotFound(s)
            | HttpFailure::RateLimitExceeded(s)
            | HttpFailure::ClientError(s)
            | HttpFailure::ServerError(s) => *s,
        }
    }
}

impl std::fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpFailure::AuthenticationFailed(s) => {
                write!(f, "HTTP {}: authentication failed. Check your license keys.", s)
            }
            HttpFailure::Forbidden(s) => {
                write!(f, "HTTP {}: access forbidden. You may need a license key.", s)
            }
            HttpFailure::NotFound(s) => write!(f, "HTTP {}: resource not found", s),
            HttpFailure::RateLimitExceeded(s) => {
                write!(f, "HTTP {}: too many requests. Try again later.", s)
            }
            HttpFailure::ClientError(s) => write!(f, "HTTP {}: request error", s),
            HttpFailure::ServerError(s) => write!(f, "HTTP {}: server error", s),
        }
    }
}

impl std::error::Error for HttpFailure {}

/// Maps a status code onto an [`HttpFailure`].
pub fn classify_status(status: StatusCode) -> HttpFailure {
    let code = status.as_u16();
    match status {
        StatusCode::UNAUTHORIZED => HttpFailure::AuthenticationFailed(code),
        StatusCode::FORBIDDEN => HttpFailure::Forbidden(code),
        StatusCode::NOT_FOUND => HttpFailure::NotFound(code),
        StatusCode::TOO_MANY_REQUESTS => HttpFailure::RateLimitExceeded(code),
        s if s.is_client_error() => HttpFailure::ClientError(code),
        _ => HttpFailure::ServerError(code),
    }
}

/// Converts an error from `error_for_status()` into an `anyhow::Error`,
/// replacing status errors with a classified [`HttpFailure`].
pub fn check_status(error: reqwest::Error) -> anyhow::Error {
    match error.status() {
        Some(status) => anyhow::Error::from(classify_status(status)),
        None => anyhow::Error::from(error),
    }
}
