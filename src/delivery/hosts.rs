//! Host allow-list for proxied downloads
//!
//! A host is trusted when it equals an allow-listed registrable domain or
//! is a subdomain of one, i.e. ends with `"." + domain`. A plain suffix test
//! would let `evil-googlevideo.com` through; this one does not.

use url::Url;

use crate::core::config;

/// How the proxy should deliver a URL that passed the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostDecision {
    /// Direct platform media host: answer with a redirect
    Redirect,
    /// Trusted, but fetched and streamed through
    Stream,
}

#[derive(Debug, Clone)]
pub struct HostPolicy {
    allowed: Vec<String>,
    redirect: Vec<String>,
    require_https: bool,
}

impl Default for HostPolicy {
    fn default() -> Self {
        Self::new(config::proxy::ALLOWED_DOMAINS, config::proxy::REDIRECT_DOMAINS)
    }
}

impl HostPolicy {
    pub fn new(allowed: &[&str], redirect: &[&str]) -> Self {
        Self {
            allowed: allowed.iter().map(|d| normalize_host(d)).collect(),
            redirect: redirect.iter().map(|d| normalize_host(d)).collect(),
            require_https: true,
        }
    }

    /// Accept plain `http` upstreams. Only meant for local test servers.
    pub fn allow_insecure(mut self) -> Self {
        self.require_https = false;
        self
    }

    /// Check a host name alone.
    pub fn is_trusted_host(&self, host: &str) -> bool {
        let host = normalize_host(host);
        !host.is_empty() && self.allowed.iter().any(|domain| host_matches(&host, domain))
    }

    /// Validate a full URL, returning its delivery mode.
    ///
    /// The error string names the offending host (or the reason there is
    /// none) for logging.
    pub fn check(&self, raw_url: &str) -> Result<HostDecision, String> {
        let url = Url::parse(raw_url).map_err(|e| format!("unparseable URL: {e}"))?;

        match url.scheme() {
            "https" => {}
            "http" if !self.require_https => {}
            other => return Err(format!("scheme '{other}' not allowed")),
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err("credentials in URL".to_string());
        }

        let host = url.host_str().map(normalize_host).ok_or_else(|| "URL has no host".to_string())?;
        if !self.is_trusted_host(&host) {
            return Err(host);
        }

        if self.redirect.iter().any(|domain| host_matches(&host, domain)) {
            Ok(HostDecision::Redirect)
        } else {
            Ok(HostDecision::Stream)
        }
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_lowercase()
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.strip_suffix(domain).is_some_and(|prefix| prefix.ends_with('.'))
}
