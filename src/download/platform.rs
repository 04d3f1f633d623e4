//! Source platform detection
//!
//! Chooses which strategy ladder to run. This is routing, not a trust
//! decision: the download proxy re-checks hosts against its own allow-list.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use url::Url;

/// Platform a source URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Youtube,
    Vimeo,
    Generic,
}

const YOUTUBE_DOMAINS: &[&str] = &["youtube.com", "youtu.be", "youtube-nocookie.com"];
const VIMEO_DOMAINS: &[&str] = &["vimeo.com"];

impl Platform {
    /// Name used in `--extractor-args <name>:...`.
    pub fn extractor_key(self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Vimeo => "vimeo",
            Platform::Generic => "generic",
        }
    }
}

/// Classify a URL by hostname.
///
/// A host matches a platform domain when it equals it or is a subdomain of
/// it, so `notyoutube.com` and `youtube.com.evil.net` stay generic.
pub fn detect(url: &str) -> Platform {
    let host = match Url::parse(url.trim()) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.trim_end_matches('.').to_lowercase(),
            None => return Platform::Generic,
        },
        Err(_) => return Platform::Generic,
    };

    if matches_any(&host, YOUTUBE_DOMAINS) {
        Platform::Youtube
    } else if matches_any(&host, VIMEO_DOMAINS) {
        Platform::Vimeo
    } else {
        Platform::Generic
    }
}

fn matches_any(host: &str, domains: &[&str]) -> bool {
    domains.iter().any(|domain| {
        host == *domain
            || host
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// A classified, immutable user submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRequest {
    url: String,
    platform: Platform,
}

impl SourceRequest {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into().trim().to_string();
        let platform = detect(&url);
        Self { url, platform }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }
}
