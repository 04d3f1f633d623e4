//! Common test utilities
//!
//! This module is shared across all integration tests:
//! - `ScriptedRunner`, a `ProcessRunner` that replays canned yt-dlp results
//! - JSON fixtures shaped like `yt-dlp -j` output
//! - constructors wiring the service to a temp cookie jar

#![allow(dead_code)]

use async_trait::async_trait;
use grabgate::core::process::{ProcessError, ProcessOutput, ProcessRunner, RunLimits};
use grabgate::download::{BinaryLocator, ExtractionService, Extractor, ResultCache, SignatureTable};
use serde_json::json;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

pub const BOT_STDERR: &str =
    "ERROR: [youtube] dQw4w9WgXcQ: Sign in to confirm you're not a bot. Use --cookies-from-browser or --cookies";
pub const VIMEO_AUTH_STDERR: &str =
    "ERROR: [vimeo] 123456: This video is only available for registered users. Use --cookies";

/// One scripted extraction result.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(String),
    Fail(String),
    Timeout,
}

/// Replays scripted replies for extraction calls; `--version` always succeeds.
pub struct ScriptedRunner {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    calls: Mutex<Vec<Vec<String>>>,
    delay: Duration,
}

impl ScriptedRunner {
    /// Pops one reply per extraction call, panics when exhausted.
    pub fn sequence(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: None,
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    /// Answers every extraction call with the same reply.
    pub fn always(reply: Reply) -> Self {
        Self {
            fallback: Some(reply),
            ..Self::sequence(Vec::new())
        }
    }

    /// Sleep before answering, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// argv of every extraction call so far (probes excluded).
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, _program: &str, args: &[String], limits: RunLimits) -> Result<ProcessOutput, ProcessError> {
        if args == ["--version".to_string()] {
            return Ok(ProcessOutput {
                stdout: "2025.01.15\n".to_string(),
                stderr: String::new(),
            });
        }

        self.calls.lock().unwrap().push(args.to_vec());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| panic!("unexpected extraction call: {args:?}"));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match reply {
            Reply::Json(stdout) if stdout.len() > limits.max_output_bytes => {
                Err(ProcessError::OutputTooLarge(limits.max_output_bytes))
            }
            Reply::Json(stdout) => Ok(ProcessOutput {
                stdout,
                stderr: String::new(),
            }),
            Reply::Fail(stderr) => Err(ProcessError::NonZeroExit { code: Some(1), stderr }),
            Reply::Timeout => Err(ProcessError::Timeout(limits.timeout)),
        }
    }
}

/// A YouTube-like document: muxed 360p, video-only 1080p/720p, two audio tracks.
pub fn youtube_json(title: &str) -> String {
    json!({
        "id": "dQw4w9WgXcQ",
        "title": title,
        "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
        "duration": 212.0,
        "formats": [
            { "format_id": "139", "url": "https://rr1.googlevideo.com/a139", "ext": "m4a",
              "vcodec": "none", "acodec": "mp4a.40.5", "abr": 48.8, "filesize": 1_300_000 },
            { "format_id": "251", "url": "https://rr1.googlevideo.com/a251", "ext": "webm",
              "vcodec": "none", "acodec": "opus", "abr": 129.5, "filesize": 3_400_000 },
            { "format_id": "18", "url": "https://rr1.googlevideo.com/v18", "ext": "mp4",
              "height": 360, "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "filesize_approx": 9_000_000 },
            { "format_id": "136", "url": "https://rr1.googlevideo.com/v136", "ext": "mp4",
              "height": 720, "vcodec": "avc1.4d401f", "acodec": "none" },
            { "format_id": "137", "url": "https://rr1.googlevideo.com/v137", "ext": "mp4",
              "height": 1080, "vcodec": "avc1.640028", "acodec": "none" }
        ]
    })
    .to_string()
}

/// Extractor using the scripted runner and a cookie jar under `dir`.
pub fn extractor<R: ProcessRunner + 'static>(runner: std::sync::Arc<R>, dir: &Path) -> Extractor {
    Extractor::new(
        runner,
        BinaryLocator::new(vec!["/usr/bin/yt-dlp".to_string()]),
        SignatureTable::default(),
        dir.join("cookies.txt"),
    )
}

/// Service with default cache parameters and single-flight as requested.
pub fn service<R: ProcessRunner + 'static>(
    runner: std::sync::Arc<R>,
    dir: &Path,
    single_flight: bool,
) -> ExtractionService {
    ExtractionService::new(extractor(runner, dir), ResultCache::new(Duration::from_secs(300), 100))
        .with_single_flight(single_flight)
}
