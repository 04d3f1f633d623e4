//! yt-dlp binary discovery
//!
//! Walks an ordered candidate list and returns the first one that actually
//! runs `--version` successfully. Order: OS-level install paths, then
//! environment-bundled paths (YTDL_BIN, virtualenv, user-local, ./bin), then
//! the bare command name resolved through PATH.
//!
//! The result is deliberately not cached: each extraction re-resolves, so a
//! binary replaced or upgraded between requests is picked up immediately.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::config;
use crate::core::process::{ProcessRunner, RunLimits};

#[cfg(windows)]
const BIN_NAME: &str = "yt-dlp.exe";
#[cfg(not(windows))]
const BIN_NAME: &str = "yt-dlp";

/// One failed candidate, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    pub candidate: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("no usable yt-dlp found (tried {})", format_attempts(.attempts))]
    NotFound { attempts: Vec<CandidateFailure> },
}

fn format_attempts(attempts: &[CandidateFailure]) -> String {
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.candidate, a.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A resolved, verified tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedBinary {
    pub path: String,
    pub version: String,
}

/// OS-level install locations for this platform.
pub fn system_candidates() -> Vec<String> {
    let mut paths = Vec::new();
    if cfg!(target_os = "macos") {
        paths.push(format!("/opt/homebrew/bin/{BIN_NAME}"));
        paths.push(format!("/usr/local/bin/{BIN_NAME}"));
        paths.push(format!("/usr/bin/{BIN_NAME}"));
    } else if cfg!(windows) {
        if let Ok(program_files) = std::env::var("ProgramFiles") {
            paths.push(format!("{program_files}\\yt-dlp\\{BIN_NAME}"));
        }
    } else {
        paths.push(format!("/usr/local/bin/{BIN_NAME}"));
        paths.push(format!("/usr/bin/{BIN_NAME}"));
        // Flatpak / container images
        paths.push(format!("/app/bin/{BIN_NAME}"));
    }
    paths
}

/// Paths provided by the runtime environment rather than the OS.
pub fn environment_candidates() -> Vec<String> {
    let mut paths = Vec::new();
    if let Some(explicit) = config::YTDL_BIN.as_deref() {
        paths.push(shellexpand::tilde(explicit).to_string());
    }
    if let Ok(venv) = std::env::var("VIRTUAL_ENV") {
        let dir = if cfg!(windows) { "Scripts" } else { "bin" };
        paths.push(PathBuf::from(venv).join(dir).join(BIN_NAME).to_string_lossy().into_owned());
    }
    paths.push(shellexpand::tilde(&format!("~/.local/bin/{BIN_NAME}")).to_string());
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("bin").join(BIN_NAME).to_string_lossy().into_owned());
    }
    paths
}

/// Full ordered candidate list, de-duplicated, ending with the bare name.
pub fn default_candidates() -> Vec<String> {
    let mut all = system_candidates();
    all.extend(environment_candidates());
    all.push(BIN_NAME.to_string());

    let mut seen = std::collections::HashSet::new();
    all.retain(|c| seen.insert(c.clone()));
    all
}

/// Resolves the extraction tool by invoking each candidate.
pub struct BinaryLocator {
    candidates: Vec<String>,
    limits: RunLimits,
}

impl Default for BinaryLocator {
    fn default() -> Self {
        Self::new(default_candidates())
    }
}

impl BinaryLocator {
    pub fn new(candidates: Vec<String>) -> Self {
        Self {
            candidates,
            limits: RunLimits::new(
                config::extraction::locate_timeout(),
                config::extraction::LOCATE_MAX_OUTPUT_BYTES,
            ),
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Return the first candidate whose `--version` exits 0 with output.
    pub async fn locate(&self, runner: &dyn ProcessRunner) -> Result<LocatedBinary, LocateError> {
        let version_arg = vec!["--version".to_string()];
        let mut attempts = Vec::new();

        for candidate in &self.candidates {
            match runner.run(candidate, &version_arg, self.limits).await {
                Ok(output) => {
                    let version = output.stdout.trim().to_string();
                    if version.is_empty() {
                        attempts.push(CandidateFailure {
                            candidate: candidate.clone(),
                            reason: "empty --version output".to_string(),
                        });
                        continue;
                    }
                    log::debug!("Using yt-dlp at {} (version {})", candidate, version);
                    return Ok(LocatedBinary {
                        path: candidate.clone(),
                        version,
                    });
                }
                Err(e) => attempts.push(CandidateFailure {
                    candidate: candidate.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        log::error!("No usable yt-dlp binary: {}", format_attempts(&attempts));
        Err(LocateError::NotFound { attempts })
    }
}
