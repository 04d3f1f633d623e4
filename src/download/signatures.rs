//! Failure signatures recognized in yt-dlp stderr
//!
//! Classifies tool stderr into a [`FailureKind`] by case-insensitive
//! substring match. The table is data, not code: the built-in default can be
//! replaced by a JSON file (`EXTRACT_SIGNATURES_FILE`) as platforms change
//! their anti-automation wording.
//!
//! Stderr is untrusted. It is only ever matched against these patterns.

use serde::{Deserialize, Serialize};
use std::path::Path;
use strum::{Display, EnumString};

/// Classified reason an extraction attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Platform suspects automation ("confirm you're not a bot", 403 on player)
    BotDetection,
    /// Content needs a logged-in session or password
    AuthRequired,
    /// Age gate
    AgeRestricted,
    /// Geo block
    RegionBlocked,
    /// Removed, private or never existed
    NotFound,
    /// HTTP 429 and friends
    RateLimited,
    /// DNS, connection resets, socket timeouts inside the tool
    Network,
    /// The invocation itself exceeded its wall-clock budget
    Timeout,
}

impl FailureKind {
    /// Message for end users. Safe to show: fixed text per kind.
    pub fn user_message(self) -> &'static str {
        match self {
            FailureKind::BotDetection => "The platform blocked automated access to this video. Try again later.",
            FailureKind::AuthRequired => "This video requires signing in and cannot be downloaded.",
            FailureKind::AgeRestricted => "This video is age-restricted and cannot be downloaded.",
            FailureKind::RegionBlocked => "This video is not available in the server's region.",
            FailureKind::NotFound => "Video not found. It may be private or removed.",
            FailureKind::RateLimited => "Too many requests to the platform. Try again in a few minutes.",
            FailureKind::Network => "Network problem while contacting the platform. Try again in a minute.",
            FailureKind::Timeout => "The platform took too long to respond. Try again in a minute.",
        }
    }
}

/// One classification rule: any pattern hit selects `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRule {
    pub kind: FailureKind,
    pub patterns: Vec<String>,
}

/// Ordered rule list. First matching rule wins, so more specific rules
/// (e.g. the bot challenge, which also says "sign in") come first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureTable {
    pub rules: Vec<SignatureRule>,
}

fn rule(kind: FailureKind, patterns: &[&str]) -> SignatureRule {
    SignatureRule {
        kind,
        patterns: patterns.iter().map(|p| p.to_lowercase()).collect(),
    }
}

impl Default for SignatureTable {
    fn default() -> Self {
        Self {
            rules: vec![
                rule(
                    FailureKind::BotDetection,
                    &[
                        "sign in to confirm you're not a bot",
                        "sign in to confirm you’re not a bot",
                        "confirm you're not a bot",
                        "bot detection",
                        "http error 403",
                        "signature extraction failed",
                        "unable to extract initial player response",
                        "requested format is not available",
                        "po token",
                    ],
                ),
                rule(
                    FailureKind::AgeRestricted,
                    &[
                        "confirm your age",
                        "age-restricted",
                        "age restricted",
                        "inappropriate for some users",
                    ],
                ),
                rule(
                    FailureKind::RegionBlocked,
                    &[
                        "not available in your country",
                        "blocked it in your country",
                        "geo restriction",
                        "geo-restricted",
                        "not made this video available in your country",
                    ],
                ),
                rule(
                    FailureKind::AuthRequired,
                    &[
                        "cookies are no longer valid",
                        "login required",
                        "logged-in",
                        "log in",
                        "please sign in",
                        "sign in",
                        "use --cookies",
                        "--video-password",
                        "password protected",
                        "http error 401",
                        "authentication required",
                        "only available for registered users",
                    ],
                ),
                rule(
                    FailureKind::NotFound,
                    &[
                        "private video",
                        "video unavailable",
                        "this video is not available",
                        "video is private",
                        "has been removed",
                        "does not exist",
                        "http error 404",
                        "unsupported url",
                        "is not a valid url",
                    ],
                ),
                rule(
                    FailureKind::RateLimited,
                    &["http error 429", "too many requests", "rate-limit", "rate limit"],
                ),
                rule(
                    FailureKind::Network,
                    &[
                        "timed out",
                        "connection reset",
                        "connection refused",
                        "temporary failure in name resolution",
                        "network is unreachable",
                        "failed to connect",
                    ],
                ),
            ],
        }
    }
}

impl SignatureTable {
    /// Classify stderr. `None` means the failure is unrecognized.
    pub fn classify(&self, stderr: &str) -> Option<FailureKind> {
        if stderr.trim().is_empty() {
            return None;
        }
        let haystack = stderr.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.patterns.iter().any(|p| !p.is_empty() && haystack.contains(p.as_str())))
            .map(|rule| rule.kind)
    }

    /// Parse a table from JSON. Patterns are lowercased on load.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut table: SignatureTable = serde_json::from_str(json)?;
        for rule in &mut table.rules {
            for pattern in &mut rule.patterns {
                *pattern = pattern.to_lowercase();
            }
        }
        Ok(table)
    }

    /// Load the table named by `EXTRACT_SIGNATURES_FILE`, or the default.
    ///
    /// A broken override file is logged and ignored rather than taking the
    /// service down.
    pub fn load_configured() -> Self {
        match crate::core::config::EXTRACT_SIGNATURES_FILE.as_deref() {
            Some(path) => Self::load_file(Path::new(path)).unwrap_or_else(|e| {
                log::error!("Failed to load signature table from {}: {}, using defaults", path, e);
                Self::default()
            }),
            None => Self::default(),
        }
    }

    fn load_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs_err::read_to_string(path)?;
        let table = Self::from_json(&content)?;
        log::info!("Loaded {} failure signature rules from {}", table.rules.len(), path.display());
        Ok(table)
    }
}
