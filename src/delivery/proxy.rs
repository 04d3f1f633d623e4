//! Download proxy
//!
//! Serves a verified [`DownloadGrant`]. The grant URL's host is re-checked
//! against [`HostPolicy`] before anything touches the network, whatever the
//! grant claims. Direct platform media hosts get a redirect. Other trusted
//! hosts are fetched and streamed chunk by chunk, so the body is never
//! buffered whole.

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use reqwest::redirect;
use std::fmt;
use thiserror::Error;

use crate::core::config;
use crate::delivery::grant::DownloadGrant;
use crate::delivery::hosts::{HostDecision, HostPolicy};

/// Upstream redirects followed, each re-checked against the allow-list
const MAX_UPSTREAM_REDIRECTS: usize = 5;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("untrusted host: {0}")]
    UntrustedHost(String),

    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(String),
}

/// Byte stream of an upstream body.
pub type BodyStream = BoxStream<'static, Result<Bytes, reqwest::Error>>;

/// A pass-through response.
pub struct ProxiedStream {
    /// 200, or 206 for a satisfied range request
    pub status: u16,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub filename: String,
    pub body: BodyStream,
}

impl fmt::Debug for ProxiedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxiedStream")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum Delivery {
    Redirect(String),
    Stream(ProxiedStream),
}

pub struct DownloadProxy {
    client: reqwest::Client,
    policy: HostPolicy,
}

impl DownloadProxy {
    pub fn new(policy: HostPolicy) -> Result<Self, ProxyError> {
        let redirect_policy = policy.clone();
        let client = reqwest::Client::builder()
            .user_agent(config::proxy::USER_AGENT)
            .connect_timeout(config::proxy::connect_timeout())
            .redirect(redirect::Policy::custom(move |attempt| {
                if follow_redirect(&redirect_policy, attempt.url(), attempt.previous().len()) {
                    attempt.follow()
                } else {
                    attempt.stop()
                }
            }))
            .build()
            .map_err(|e| ProxyError::UpstreamFetch(format!("HTTP client build failed: {e}")))?;

        Ok(Self { client, policy })
    }

    /// Proxy with the configured allow-list.
    pub fn from_config() -> Result<Self, ProxyError> {
        Self::new(HostPolicy::default())
    }

    /// Serve a verified grant. `range` is the caller's `Range` header, if any.
    pub async fn serve(&self, grant: &DownloadGrant, range: Option<&str>) -> Result<Delivery, ProxyError> {
        let decision = self.policy.check(&grant.url).map_err(|host| {
            log::warn!("🚫 Rejected download grant for untrusted host {}", host);
            ProxyError::UntrustedHost(host)
        })?;

        if decision == HostDecision::Redirect {
            log::debug!("Redirecting {} download to platform media host", grant.quality);
            return Ok(Delivery::Redirect(grant.url.clone()));
        }

        let mut request = self.client.get(&grant.url);
        if let Some(range) = range.filter(|r| r.starts_with("bytes=")) {
            request = request.header(RANGE, range);
        }

        let response = request.send().await.map_err(|e| {
            let e = e.without_url();
            log::error!("Upstream request failed: {}", e);
            ProxyError::UpstreamFetch(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            log::error!("Upstream answered {} for {} download", status, grant.quality);
            return Err(ProxyError::UpstreamFetch(format!("upstream returned {status}")));
        }

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| mime_for(&grant.format).to_string());
        let content_range = headers
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        log::info!(
            "Streaming {} {} download ({} bytes)",
            grant.quality,
            grant.format,
            content_length.map_or_else(|| "unknown".to_string(), |n| n.to_string())
        );

        Ok(Delivery::Stream(ProxiedStream {
            status: status.as_u16(),
            content_type,
            content_length,
            content_range,
            filename: download_filename(grant),
            body: response.bytes_stream().boxed(),
        }))
    }
}

/// MIME type for a container label.
pub fn mime_for(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "m4a" => "audio/mp4",
        "mp3" => "audio/mpeg",
        "opus" | "weba" => "audio/webm",
        "ogg" => "audio/ogg",
        _ => "application/octet-stream",
    }
}

/// `video-<quality>.<format>`, restricted to safe filename characters.
pub fn download_filename(grant: &DownloadGrant) -> String {
    fn clean(s: &str) -> String {
        s.chars()
            .filter_map(|c| match c {
                'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => Some(c),
                ' ' => Some('-'),
                _ => None,
            })
            .collect()
    }
    let ext = clean(&grant.format);
    let ext = if ext.is_empty() { "bin".to_string() } else { ext };
    format!("video-{}.{}", clean(&grant.quality), ext)
}

/// Whether an upstream redirect to `target` may be followed after `hops`
/// earlier redirects. The target gets the full URL check, scheme included.
fn follow_redirect(policy: &HostPolicy, target: &reqwest::Url, hops: usize) -> bool {
    hops < MAX_UPSTREAM_REDIRECTS && policy.check(target.as_str()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(url: &str) -> DownloadGrant {
        DownloadGrant {
            url: url.to_string(),
            quality: "Audio Only".to_string(),
            format: "m4a".to_string(),
        }
    }

    #[tokio::test]
    async fn test_untrusted_host_rejected_before_fetch() {
        let proxy = DownloadProxy::from_config().unwrap();
        let err = proxy
            .serve(&grant("https://evil-googlevideo.com/videoplayback"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::UntrustedHost(h) if h == "evil-googlevideo.com"));
    }

    #[tokio::test]
    async fn test_media_host_redirects() {
        let proxy = DownloadProxy::from_config().unwrap();
        let url = "https://videoXYZ.googlevideo.com/videoplayback?id=1";
        match proxy.serve(&grant(url), None).await.unwrap() {
            Delivery::Redirect(target) => assert_eq!(target, url),
            other => panic!("expected redirect, got {other:?}"),
        }
    }

    #[test]
    fn test_redirect_targets_are_rechecked() {
        let policy = HostPolicy::default();
        let url = |s: &str| reqwest::Url::parse(s).unwrap();

        assert!(follow_redirect(&policy, &url("https://rr1.googlevideo.com/videoplayback"), 0));
        assert!(!follow_redirect(&policy, &url("http://rr1.googlevideo.com/videoplayback"), 0));
        assert!(!follow_redirect(&policy, &url("https://user:pw@rr1.googlevideo.com/videoplayback"), 0));
        assert!(!follow_redirect(&policy, &url("https://evil-googlevideo.com/videoplayback"), 0));
        assert!(!follow_redirect(
            &policy,
            &url("https://rr1.googlevideo.com/videoplayback"),
            MAX_UPSTREAM_REDIRECTS
        ));
    }

    #[test]
    fn test_filename_is_sanitized() {
        let g = DownloadGrant {
            url: String::new(),
            quality: "Audio Only".to_string(),
            format: "../m4a".to_string(),
        };
        assert_eq!(download_filename(&g), "video-Audio-Only.m4a");
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("MP4"), "video/mp4");
        assert_eq!(mime_for("m4a"), "audio/mp4");
        assert_eq!(mime_for("xyz"), "application/octet-stream");
    }
}
