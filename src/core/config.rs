use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration constants for the service

/// Explicit yt-dlp binary path
/// Read from YTDL_BIN environment variable
/// Joins the environment-bundled candidate group of the binary locator;
/// OS-level installs are still probed first.
pub static YTDL_BIN: Lazy<Option<String>> = Lazy::new(|| non_empty_var("YTDL_BIN"));

/// Path to the Netscape cookie jar handed to yt-dlp
/// Read from YTDL_COOKIES_FILE environment variable
/// Default: <temp dir>/grabgate_cookies.txt
/// Supports tilde (~) expansion for home directory
pub static YTDL_COOKIES_FILE: Lazy<PathBuf> = Lazy::new(|| match non_empty_var("YTDL_COOKIES_FILE") {
    Some(path) => PathBuf::from(shellexpand::tilde(&path).to_string()),
    None => env::temp_dir().join("grabgate_cookies.txt"),
});

/// Optional JSON file replacing the built-in failure signature table
/// Read from EXTRACT_SIGNATURES_FILE environment variable
pub static EXTRACT_SIGNATURES_FILE: Lazy<Option<String>> = Lazy::new(|| non_empty_var("EXTRACT_SIGNATURES_FILE"));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: not set (terminal only)
pub static LOG_FILE_PATH: Lazy<Option<String>> = Lazy::new(|| non_empty_var("LOG_FILE_PATH"));

/// Log level: error, warn, info, debug, trace
/// Read from LOG_LEVEL environment variable
/// Default: info
pub static LOG_LEVEL: Lazy<String> =
    Lazy::new(|| env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()).to_lowercase());

/// Port of the public HTTP server
/// Read from WEB_PORT environment variable
/// Default: 3000
pub static WEB_PORT: Lazy<u16> = Lazy::new(|| parse_var("WEB_PORT").unwrap_or(3000));

/// Accept URLs that are neither YouTube nor Vimeo
/// Read from ALLOW_GENERIC_SOURCES environment variable
/// Default: false
pub static ALLOW_GENERIC_SOURCES: Lazy<bool> = Lazy::new(|| parse_var("ALLOW_GENERIC_SOURCES").unwrap_or(false));

/// Coalesce concurrent extractions of the same URL
/// Read from SINGLE_FLIGHT environment variable
/// Default: true
pub static SINGLE_FLIGHT: Lazy<bool> = Lazy::new(|| parse_var("SINGLE_FLIGHT").unwrap_or(true));

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Extraction tool invocation budgets
pub mod extraction {
    use super::Duration;

    /// Timeout for the `--version` probe of each binary candidate (in seconds)
    pub const LOCATE_TIMEOUT_SECS: u64 = 5;

    /// Output cap for the `--version` probe (in bytes)
    pub const LOCATE_MAX_OUTPUT_BYTES: usize = 4 * 1024;

    /// Timeout for the first, plain attempt (in seconds)
    pub const STANDARD_TIMEOUT_SECS: u64 = 30;

    /// Timeout for client/header spoofing attempts (in seconds)
    pub const SPOOF_TIMEOUT_SECS: u64 = 35;

    /// Timeout for cookie-augmented and impersonation attempts (in seconds)
    pub const AUGMENTED_TIMEOUT_SECS: u64 = 45;

    /// Maximum bytes accepted on stdout or stderr of one invocation
    /// `-j` output for a long video with many formats stays well below 8 MiB
    pub const MAX_OUTPUT_BYTES: usize = 32 * 1024 * 1024;

    pub fn locate_timeout() -> Duration {
        Duration::from_secs(LOCATE_TIMEOUT_SECS)
    }

    pub fn standard_timeout() -> Duration {
        Duration::from_secs(STANDARD_TIMEOUT_SECS)
    }

    pub fn spoof_timeout() -> Duration {
        Duration::from_secs(SPOOF_TIMEOUT_SECS)
    }

    pub fn augmented_timeout() -> Duration {
        Duration::from_secs(AUGMENTED_TIMEOUT_SECS)
    }
}

/// Result cache configuration
pub mod cache {
    use super::Duration;

    /// Maximum number of cached VideoInfo entries
    pub const CAPACITY: usize = 100;

    /// Entry lifetime (in seconds)
    /// Platform media URLs are time-limited, so this stays short
    pub const TTL_SECS: u64 = 300;

    pub fn ttl() -> Duration {
        Duration::from_secs(TTL_SECS)
    }
}

/// Download grant (token) configuration
pub mod grant {
    use once_cell::sync::Lazy;
    use std::env;

    /// HMAC secret for download tokens
    /// Read from GRANT_SECRET environment variable
    /// Default: a random per-process secret (tokens die with the process)
    pub static SECRET: Lazy<String> = Lazy::new(|| {
        env::var("GRANT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| {
                log::warn!("GRANT_SECRET not set, using an ephemeral per-process secret");
                format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
            })
    });

    /// Token lifetime in seconds
    /// Read from GRANT_TTL_SECS environment variable
    /// Default: 3600 (1 hour)
    pub static TTL_SECS: Lazy<i64> = Lazy::new(|| {
        env::var("GRANT_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v: &i64| *v > 0)
            .unwrap_or(3600)
    });

    /// Token issuer claim
    /// Read from GRANT_ISSUER environment variable
    pub static ISSUER: Lazy<String> =
        Lazy::new(|| env::var("GRANT_ISSUER").unwrap_or_else(|_| "grabgate".to_string()));

    /// Token audience claim
    /// Read from GRANT_AUDIENCE environment variable
    pub static AUDIENCE: Lazy<String> =
        Lazy::new(|| env::var("GRANT_AUDIENCE").unwrap_or_else(|_| "grabgate-download".to_string()));
}

/// Download proxy configuration
pub mod proxy {
    use super::Duration;

    /// Registrable domains the proxy may fetch from
    pub const ALLOWED_DOMAINS: &[&str] = &[
        "googlevideo.com",
        "ytimg.com",
        "youtube.com",
        "vimeocdn.com",
        "akamaized.net",
        "vimeo.com",
    ];

    /// Direct media hosts answered with a redirect instead of a pass-through stream
    pub const REDIRECT_DOMAINS: &[&str] = &["googlevideo.com"];

    /// Connect timeout for upstream fetches (in seconds)
    pub const CONNECT_TIMEOUT_SECS: u64 = 15;

    /// User agent sent to upstream CDNs
    pub const USER_AGENT: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

    pub fn connect_timeout() -> Duration {
        Duration::from_secs(CONNECT_TIMEOUT_SECS)
    }
}

/// Validation configuration
pub mod validation {
    /// Maximum URL length accepted from callers
    pub const MAX_URL_LENGTH: usize = 2048;
}
