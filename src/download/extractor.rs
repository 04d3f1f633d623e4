//! Extraction strategy ladder
//!
//! Runs a platform's strategies in order through a [`ProcessRunner`]:
//! - success: stop, return stdout
//! - recognized failure the rung escalates on: next rung
//! - anything else: abort the whole ladder
//!
//! Cookie strategies materialize the jar lazily, at most once per run. If
//! that fails they are skipped and the ladder continues.

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::config;
use crate::core::process::{ProcessError, ProcessRunner, RunLimits};
use crate::download::binary::{BinaryLocator, CandidateFailure, LocateError};
use crate::download::cookies;
use crate::download::error::ExtractError;
use crate::download::platform::{Platform, SourceRequest};
use crate::download::signatures::{FailureKind, SignatureTable};
use crate::download::strategy::{ladder_for, Strategy};

/// Longest stderr excerpt written to logs
const STDERR_LOG_CHARS: usize = 500;

/// Outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Recognized(FailureKind),
    Unrecognized,
}

/// One invocation of the tool. Lives only for the duration of a ladder run.
#[derive(Debug, Clone)]
pub struct ExtractionAttempt {
    pub strategy: &'static str,
    pub outcome: AttemptOutcome,
    pub stdout: String,
    pub stderr: String,
}

/// Raw tool output of the winning strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInfo {
    pub json: String,
    pub strategy: &'static str,
    /// 1-based index of the winning rung among attempted rungs
    pub attempts: usize,
}

/// State of the cookie jar within one ladder run.
enum CookieJar {
    Unresolved,
    Ready(PathBuf),
    Unavailable,
}

pub struct Extractor {
    runner: Arc<dyn ProcessRunner>,
    locator: BinaryLocator,
    signatures: SignatureTable,
    cookie_file: PathBuf,
    max_output_bytes: usize,
}

impl Extractor {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        locator: BinaryLocator,
        signatures: SignatureTable,
        cookie_file: PathBuf,
    ) -> Self {
        Self {
            runner,
            locator,
            signatures,
            cookie_file,
            max_output_bytes: config::extraction::MAX_OUTPUT_BYTES,
        }
    }

    /// Extractor wired to the environment configuration.
    pub fn from_config(runner: Arc<dyn ProcessRunner>) -> Self {
        Self::new(
            runner,
            BinaryLocator::default(),
            SignatureTable::load_configured(),
            config::YTDL_COOKIES_FILE.clone(),
        )
    }

    pub fn with_max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    pub fn locator(&self) -> &BinaryLocator {
        &self.locator
    }

    pub fn runner(&self) -> &dyn ProcessRunner {
        self.runner.as_ref()
    }

    /// Run the platform's ladder for `request`.
    pub async fn extract(&self, request: &SourceRequest) -> Result<RawInfo, ExtractError> {
        let ladder = ladder_for(request.platform());
        self.run_ladder(request.url(), request.platform(), &ladder).await
    }

    /// Run an explicit ladder. The binary is re-resolved on every call.
    pub async fn run_ladder(&self, url: &str, platform: Platform, ladder: &[Strategy]) -> Result<RawInfo, ExtractError> {
        let binary = self.locator.locate(self.runner.as_ref()).await?;

        let mut jar = CookieJar::Unresolved;
        let mut attempted = 0usize;
        let mut last_failure: Option<(&'static str, Option<FailureKind>, String)> = None;

        for (index, strategy) in ladder.iter().enumerate() {
            let cookie_file = if strategy.needs_cookies() {
                match self.resolve_jar(&mut jar).await {
                    Some(path) => Some(path),
                    None => {
                        log::warn!(
                            "🍪 Skipping strategy '{}' for {}: cookie jar unavailable",
                            strategy.name,
                            platform
                        );
                        continue;
                    }
                }
            } else {
                None
            };

            attempted += 1;
            log::info!(
                "📡 Extraction attempt {}/{} for {} using [{}]",
                index + 1,
                ladder.len(),
                platform,
                strategy.name
            );

            let args = strategy.build_args(platform, url, cookie_file.as_deref());
            let limits = RunLimits::new(strategy.timeout, self.max_output_bytes);

            let attempt = match self.runner.run(&binary.path, &args, limits).await {
                Ok(output) => ExtractionAttempt {
                    strategy: strategy.name,
                    outcome: AttemptOutcome::Success,
                    stdout: output.stdout,
                    stderr: output.stderr,
                },
                Err(ProcessError::NonZeroExit { stderr, .. }) => ExtractionAttempt {
                    strategy: strategy.name,
                    outcome: match self.signatures.classify(&stderr) {
                        Some(kind) => AttemptOutcome::Recognized(kind),
                        None => AttemptOutcome::Unrecognized,
                    },
                    stdout: String::new(),
                    stderr,
                },
                Err(ProcessError::Timeout(after)) => {
                    if !strategy.escalates_on(FailureKind::Timeout) {
                        log::warn!("⏱️ Strategy '{}' timed out, not retryable", strategy.name);
                        return Err(ExtractError::Timeout {
                            strategy: strategy.name.to_string(),
                            secs: after.as_secs(),
                        });
                    }
                    ExtractionAttempt {
                        strategy: strategy.name,
                        outcome: AttemptOutcome::Recognized(FailureKind::Timeout),
                        stdout: String::new(),
                        stderr: String::new(),
                    }
                }
                Err(ProcessError::OutputTooLarge(limit)) => {
                    log::error!("Strategy '{}' exceeded the {} byte output cap", strategy.name, limit);
                    return Err(ExtractError::OutputTooLarge {
                        strategy: strategy.name.to_string(),
                        limit,
                    });
                }
                Err(ProcessError::NotFound(path)) => {
                    // Binary vanished between locate and run
                    return Err(ExtractError::BinaryUnavailable(LocateError::NotFound {
                        attempts: vec![CandidateFailure {
                            candidate: path,
                            reason: "disappeared before invocation".to_string(),
                        }],
                    }));
                }
                Err(ProcessError::Io(e)) => return Err(ExtractError::Io(e)),
            };

            match attempt.outcome {
                AttemptOutcome::Success => {
                    log::info!("✅ Extraction succeeded for {} using [{}]", platform, attempt.strategy);
                    return Ok(RawInfo {
                        json: attempt.stdout,
                        strategy: attempt.strategy,
                        attempts: attempted,
                    });
                }
                AttemptOutcome::Recognized(kind) if strategy.escalates_on(kind) => {
                    log::warn!(
                        "🔄 Strategy '{}' failed with {}, escalating: {}",
                        attempt.strategy,
                        kind,
                        excerpt(&attempt.stderr)
                    );
                    last_failure = Some((attempt.strategy, Some(kind), attempt.stderr));
                }
                AttemptOutcome::Recognized(kind) => {
                    log::warn!(
                        "❌ Strategy '{}' failed with {}, which no later strategy can fix",
                        attempt.strategy,
                        kind
                    );
                    return Err(exhausted(platform, attempt.strategy, Some(kind), attempt.stderr));
                }
                AttemptOutcome::Unrecognized => {
                    log::error!(
                        "❌ Strategy '{}' failed with an unrecognized error, aborting ladder: {}",
                        attempt.strategy,
                        excerpt(&attempt.stderr)
                    );
                    return Err(exhausted(platform, attempt.strategy, None, attempt.stderr));
                }
            }
        }

        log::error!("All {} extraction strategies failed for {}", ladder.len(), platform);
        Err(match last_failure {
            Some((strategy, signature, stderr)) => exhausted(platform, strategy, signature, stderr),
            None => exhausted(platform, "none", None, String::new()),
        })
    }

    async fn resolve_jar(&self, jar: &mut CookieJar) -> Option<PathBuf> {
        if let CookieJar::Unresolved = jar {
            *jar = match cookies::ensure_cookie_file(&self.cookie_file).await {
                Ok(path) => CookieJar::Ready(path),
                Err(e) => {
                    log::warn!("Cookie jar {} unavailable: {}", self.cookie_file.display(), e);
                    CookieJar::Unavailable
                }
            };
        }
        match jar {
            CookieJar::Ready(path) => Some(path.clone()),
            _ => None,
        }
    }
}

fn exhausted(platform: Platform, strategy: &str, signature: Option<FailureKind>, stderr: String) -> ExtractError {
    ExtractError::StrategyExhausted {
        platform,
        signature,
        last_strategy: strategy.to_string(),
        last_stderr: stderr,
    }
}

/// First [`STDERR_LOG_CHARS`] characters of stderr, on one line.
fn excerpt(stderr: &str) -> String {
    stderr
        .chars()
        .take(STDERR_LOG_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}
