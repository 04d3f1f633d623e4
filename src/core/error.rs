use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::delivery::grant::GrantError;
use crate::delivery::proxy::ProxyError;
use crate::download::error::ExtractError;
use crate::download::formats::NormalizeError;
use crate::download::platform::Platform;
use crate::download::signatures::FailureKind;

/// Centralized error taxonomy for everything that crosses into a caller.
///
/// Component errors (`ExtractError`, `NormalizeError`, `ProxyError`, ...) are
/// converted into this enum at the component boundary. Conversions keep the
/// classification and drop raw tool stderr, so `Display` and
/// [`AppError::user_message`] are always safe to show.
#[derive(Error, Debug)]
pub enum AppError {
    /// No usable extraction tool installed
    #[error("extraction tool unavailable")]
    BinaryUnavailable,

    /// Every strategy in the ladder failed (or the ladder aborted)
    #[error("all extraction strategies failed for {platform} (signature: {signature:?})")]
    StrategyExhausted {
        platform: Platform,
        signature: Option<FailureKind>,
    },

    /// A strategy ran out of time and could not escalate
    #[error("extraction timed out")]
    Timeout,

    /// Tool output was not a single well-formed JSON object
    #[error("malformed extraction response: {0}")]
    MalformedResponse(String),

    /// Metadata parsed but held no playable rendition
    #[error("no downloadable formats")]
    NoDownloadableFormats,

    /// Grant URL host failed the allow-list check
    #[error("untrusted host: {0}")]
    UntrustedHost(String),

    /// Fetching an allow-listed upstream failed
    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(String),

    /// Caller supplied something that is not an http(s) URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// URL parsed but belongs to no supported platform
    #[error("unsupported platform for {0}")]
    UnsupportedPlatform(String),

    /// Download token failed verification or expired
    #[error("invalid download grant: {0}")]
    InvalidGrant(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Fixed, user-facing text for this error. Never includes tool output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::BinaryUnavailable => "The extraction service is temporarily unavailable.".to_string(),
            AppError::StrategyExhausted { signature, .. } => match signature {
                Some(kind) => kind.user_message().to_string(),
                None => "Extraction failed. Check that the link is correct and public.".to_string(),
            },
            AppError::Timeout => "The platform took too long to respond. Try again in a minute.".to_string(),
            AppError::MalformedResponse(_) => {
                "The platform returned data we could not read. Try again later.".to_string()
            }
            AppError::NoDownloadableFormats => "No downloadable formats were found for this video.".to_string(),
            AppError::UntrustedHost(_) => "This download link is not allowed.".to_string(),
            AppError::UpstreamFetch(_) => "The media host could not be reached. Try again later.".to_string(),
            AppError::InvalidUrl(_) => "Please provide a valid http(s) video URL.".to_string(),
            AppError::UnsupportedPlatform(_) => "Only YouTube and Vimeo links are supported.".to_string(),
            AppError::InvalidGrant(_) => "This download link is invalid or has expired.".to_string(),
            AppError::Io(_) => "An internal error occurred.".to_string(),
        }
    }

    /// HTTP status used when the error reaches the web layer.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BinaryUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::StrategyExhausted { signature, .. } => match signature {
                Some(FailureKind::NotFound) => StatusCode::NOT_FOUND,
                Some(FailureKind::AuthRequired) | Some(FailureKind::AgeRestricted) => StatusCode::FORBIDDEN,
                Some(FailureKind::RegionBlocked) => StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
                Some(FailureKind::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            },
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            AppError::NoDownloadableFormats => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::UntrustedHost(_) => StatusCode::FORBIDDEN,
            AppError::UpstreamFetch(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidUrl(_) | AppError::UnsupportedPlatform(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidGrant(_) => StatusCode::UNAUTHORIZED,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Metric-style category name, also used in log lines.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::BinaryUnavailable => "binary_unavailable",
            AppError::StrategyExhausted { .. } => "strategy_exhausted",
            AppError::Timeout => "timeout",
            AppError::MalformedResponse(_) => "malformed_response",
            AppError::NoDownloadableFormats => "no_downloadable_formats",
            AppError::UntrustedHost(_) => "untrusted_host",
            AppError::UpstreamFetch(_) => "upstream_fetch",
            AppError::InvalidUrl(_) => "invalid_url",
            AppError::UnsupportedPlatform(_) => "unsupported_platform",
            AppError::InvalidGrant(_) => "invalid_grant",
            AppError::Io(_) => "io",
        }
    }
}

/// Coalesced requests hand every waiter its own copy of the outcome.
/// `io::Error` is not `Clone`; its copy keeps the kind and message.
impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            AppError::BinaryUnavailable => AppError::BinaryUnavailable,
            AppError::StrategyExhausted { platform, signature } => AppError::StrategyExhausted {
                platform: *platform,
                signature: *signature,
            },
            AppError::Timeout => AppError::Timeout,
            AppError::MalformedResponse(reason) => AppError::MalformedResponse(reason.clone()),
            AppError::NoDownloadableFormats => AppError::NoDownloadableFormats,
            AppError::UntrustedHost(host) => AppError::UntrustedHost(host.clone()),
            AppError::UpstreamFetch(reason) => AppError::UpstreamFetch(reason.clone()),
            AppError::InvalidUrl(reason) => AppError::InvalidUrl(reason.clone()),
            AppError::UnsupportedPlatform(host) => AppError::UnsupportedPlatform(host.clone()),
            AppError::InvalidGrant(reason) => AppError::InvalidGrant(reason.clone()),
            AppError::Io(e) => AppError::Io(std::io::Error::new(e.kind(), e.to_string())),
        }
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::BinaryUnavailable(_) => AppError::BinaryUnavailable,
            ExtractError::StrategyExhausted {
                platform, signature, ..
            } => AppError::StrategyExhausted { platform, signature },
            ExtractError::Timeout { .. } => AppError::Timeout,
            ExtractError::OutputTooLarge { .. } => {
                AppError::MalformedResponse("extraction output exceeded the size limit".to_string())
            }
            ExtractError::Io(e) => AppError::Io(e),
        }
    }
}

impl From<NormalizeError> for AppError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::NoDownloadableFormats => AppError::NoDownloadableFormats,
            NormalizeError::MalformedResponse(reason) => AppError::MalformedResponse(reason),
        }
    }
}

impl From<ProxyError> for AppError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::UntrustedHost(host) => AppError::UntrustedHost(host),
            ProxyError::UpstreamFetch(reason) => AppError::UpstreamFetch(reason),
        }
    }
}

impl From<GrantError> for AppError {
    fn from(err: GrantError) -> Self {
        AppError::InvalidGrant(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("[{}] {}", self.category(), self);
        } else {
            log::warn!("[{}] {}", self.category(), self);
        }
        let body = Json(json!({ "error": self.user_message(), "kind": self.category() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_required_maps_to_specific_message() {
        let err = AppError::StrategyExhausted {
            platform: Platform::Vimeo,
            signature: Some(FailureKind::AuthRequired),
        };
        assert!(err.user_message().to_lowercase().contains("sign"));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_unrecognized_failure_is_generic() {
        let err = AppError::StrategyExhausted {
            platform: Platform::Youtube,
            signature: None,
        };
        assert!(err.user_message().starts_with("Extraction failed"));
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_clone_keeps_classification() {
        let io = AppError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "jar locked"));
        let copy = io.clone();
        assert_eq!(copy.category(), "io");
        assert_eq!(copy.to_string(), io.to_string());

        let exhausted = AppError::StrategyExhausted {
            platform: Platform::Vimeo,
            signature: Some(FailureKind::AuthRequired),
        };
        assert_eq!(exhausted.clone().status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_binary_unavailable_is_503() {
        assert_eq!(AppError::BinaryUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_extract_error_conversion_drops_stderr() {
        let err: AppError = ExtractError::StrategyExhausted {
            platform: Platform::Youtube,
            signature: Some(FailureKind::BotDetection),
            last_strategy: "standard".to_string(),
            last_stderr: "ERROR: secret internal path /home/svc/.cache".to_string(),
        }
        .into();
        assert!(!err.to_string().contains("/home/svc"));
        assert!(!err.user_message().contains("/home/svc"));
    }
}
