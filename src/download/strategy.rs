//! Declarative extraction strategies
//!
//! Each platform gets an ordered ladder of [`Strategy`] descriptors: a name,
//! an argv shape, a time budget and the failure kinds that justify moving on
//! to the next rung. The ladder runner in `extractor.rs` is a single loop over
//! this table.

use std::path::Path;
use std::time::Duration;

use crate::core::config;
use crate::download::platform::Platform;
use crate::download::signatures::FailureKind;

/// Browser target handed to `--impersonate`
pub const IMPERSONATE_TARGET: &str = "chrome";

/// Desktop user agent used by header spoofing
pub const SPOOF_USER_AGENT: &str = config::proxy::USER_AGENT;

/// Argv shape of a strategy, on top of the common `-j --no-warnings` base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// No extra arguments
    Standard,
    /// `--extractor-args <platform>:player_client=<client>`
    ClientSpoof { client: &'static str },
    /// `--user-agent <desktop UA> --add-header Referer:<referer>`
    HeaderSpoof { referer: &'static str },
    /// `--cookies <jar>`
    CookieAuth,
    /// `--cookies <jar>` plus client spoofing
    CookieClientSpoof { client: &'static str },
    /// `--impersonate <target>`
    Impersonate { target: &'static str },
}

/// One rung of a ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub name: &'static str,
    pub kind: StrategyKind,
    pub timeout: Duration,
    /// Classified failures after which the next rung is worth trying.
    /// Anything else (including an unclassified failure) aborts the ladder.
    pub escalate_on: &'static [FailureKind],
}

/// Failures a different client, cookies or impersonation can plausibly fix
const YOUTUBE_ESCALATION: &[FailureKind] = &[
    FailureKind::BotDetection,
    FailureKind::RateLimited,
    FailureKind::AuthRequired,
    FailureKind::AgeRestricted,
    FailureKind::Network,
    FailureKind::Timeout,
];

const VIMEO_ESCALATION: &[FailureKind] = &[
    FailureKind::AuthRequired,
    FailureKind::BotDetection,
    FailureKind::RateLimited,
    FailureKind::Network,
    FailureKind::Timeout,
];

const GENERIC_ESCALATION: &[FailureKind] = &[FailureKind::BotDetection, FailureKind::RateLimited];

impl Strategy {
    fn new(name: &'static str, kind: StrategyKind, timeout: Duration, escalate_on: &'static [FailureKind]) -> Self {
        Self {
            name,
            kind,
            timeout,
            escalate_on,
        }
    }

    /// Whether this rung needs a cookie jar on disk.
    pub fn needs_cookies(&self) -> bool {
        matches!(self.kind, StrategyKind::CookieAuth | StrategyKind::CookieClientSpoof { .. })
    }

    pub fn escalates_on(&self, kind: FailureKind) -> bool {
        self.escalate_on.contains(&kind)
    }

    /// Build the full argv for this rung.
    ///
    /// The URL always comes last, after `--`, so a value starting with `-`
    /// can never be read as an option.
    pub fn build_args(&self, platform: Platform, url: &str, cookie_file: Option<&Path>) -> Vec<String> {
        let mut args: Vec<String> = vec!["-j".into(), "--no-warnings".into(), "--no-playlist".into()];

        match self.kind {
            StrategyKind::Standard => {}
            StrategyKind::ClientSpoof { client } => push_client(&mut args, platform, client),
            StrategyKind::HeaderSpoof { referer } => {
                args.push("--user-agent".into());
                args.push(SPOOF_USER_AGENT.into());
                args.push("--add-header".into());
                args.push(format!("Referer:{referer}"));
            }
            StrategyKind::CookieAuth => push_cookies(&mut args, cookie_file),
            StrategyKind::CookieClientSpoof { client } => {
                push_cookies(&mut args, cookie_file);
                push_client(&mut args, platform, client);
            }
            StrategyKind::Impersonate { target } => {
                args.push("--impersonate".into());
                args.push(target.into());
            }
        }

        args.push("--".into());
        args.push(url.to_string());
        args
    }
}

fn push_client(args: &mut Vec<String>, platform: Platform, client: &str) {
    args.push("--extractor-args".into());
    args.push(format!("{}:player_client={}", platform.extractor_key(), client));
}

fn push_cookies(args: &mut Vec<String>, cookie_file: Option<&Path>) {
    if let Some(path) = cookie_file {
        args.push("--cookies".into());
        args.push(path.to_string_lossy().into_owned());
    }
}

/// Ordered ladder for a platform, cheapest first.
pub fn ladder_for(platform: Platform) -> Vec<Strategy> {
    use config::extraction::{augmented_timeout, spoof_timeout, standard_timeout};

    match platform {
        Platform::Youtube => vec![
            Strategy::new("standard", StrategyKind::Standard, standard_timeout(), YOUTUBE_ESCALATION),
            Strategy::new(
                "client-spoof:android",
                StrategyKind::ClientSpoof { client: "android" },
                standard_timeout(),
                YOUTUBE_ESCALATION,
            ),
            Strategy::new(
                "client-spoof:ios",
                StrategyKind::ClientSpoof { client: "ios" },
                spoof_timeout(),
                YOUTUBE_ESCALATION,
            ),
            Strategy::new("cookie-auth", StrategyKind::CookieAuth, augmented_timeout(), YOUTUBE_ESCALATION),
            Strategy::new(
                "cookie+client-spoof:ios",
                StrategyKind::CookieClientSpoof { client: "ios" },
                augmented_timeout(),
                YOUTUBE_ESCALATION,
            ),
            Strategy::new(
                "impersonate:chrome",
                StrategyKind::Impersonate {
                    target: IMPERSONATE_TARGET,
                },
                augmented_timeout(),
                YOUTUBE_ESCALATION,
            ),
        ],
        Platform::Vimeo => vec![
            Strategy::new("standard", StrategyKind::Standard, standard_timeout(), VIMEO_ESCALATION),
            Strategy::new(
                "header-spoof",
                StrategyKind::HeaderSpoof {
                    referer: "https://vimeo.com/",
                },
                spoof_timeout(),
                VIMEO_ESCALATION,
            ),
            Strategy::new("cookie-auth", StrategyKind::CookieAuth, augmented_timeout(), VIMEO_ESCALATION),
            Strategy::new(
                "impersonate:chrome",
                StrategyKind::Impersonate {
                    target: IMPERSONATE_TARGET,
                },
                augmented_timeout(),
                VIMEO_ESCALATION,
            ),
        ],
        Platform::Generic => vec![
            Strategy::new("standard", StrategyKind::Standard, standard_timeout(), GENERIC_ESCALATION),
            Strategy::new(
                "impersonate:chrome",
                StrategyKind::Impersonate {
                    target: IMPERSONATE_TARGET,
                },
                augmented_timeout(),
                GENERIC_ESCALATION,
            ),
        ],
    }
}
