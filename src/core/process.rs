//! Process execution with timeout and output limits
//!
//! Every external tool invocation goes through a [`ProcessRunner`]. Arguments
//! are always handed to the OS as a discrete argv array; nothing here ever
//! builds a shell command string, so a hostile URL is just one more argument.
//!
//! Spawned children are `kill_on_drop`, which ties the subprocess lifetime to
//! the future awaiting it: if the HTTP request that started an extraction is
//! dropped, the child dies with it.

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Bounds applied to a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    pub timeout: Duration,
    /// Cap applied to stdout and stderr independently.
    pub max_output_bytes: usize,
}

impl RunLimits {
    pub fn new(timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            timeout,
            max_output_bytes,
        }
    }
}

/// Captured output of a successful (zero exit) invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Typed failure of a single invocation.
///
/// `stderr` inside [`ProcessError::NonZeroExit`] is untrusted tool output. It
/// may be pattern-matched against known signatures but must never reach an
/// external caller verbatim.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("process timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("executable not found: {0}")]
    NotFound(String),

    #[error("process output exceeded {0} bytes")]
    OutputTooLarge(usize),

    #[error("process exited with code {code:?}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("process IO error: {0}")]
    Io(#[from] io::Error),
}

impl ProcessError {
    /// Stderr of a failed run, empty for failures that never produced any.
    pub fn stderr(&self) -> &str {
        match self {
            ProcessError::NonZeroExit { stderr, .. } => stderr,
            _ => "",
        }
    }
}

/// Runs an executable with an argv array.
///
/// The extraction ladder and the binary locator only see this trait, which
/// lets tests script tool behavior without spawning anything.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String], limits: RunLimits) -> Result<ProcessOutput, ProcessError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String], limits: RunLimits) -> Result<ProcessOutput, ProcessError> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        run_with_limits(&mut cmd, program, limits).await
    }
}

/// Spawn `cmd` and collect its output under `limits`.
///
/// On timeout or output overflow the child is killed and reaped before the
/// typed error is returned.
pub async fn run_with_limits(cmd: &mut Command, program: &str, limits: RunLimits) -> Result<ProcessOutput, ProcessError> {
    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => ProcessError::NotFound(program.to_string()),
        _ => ProcessError::Io(e),
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("child stderr was not captured"))?;

    let cap = limits.max_output_bytes;
    let collected = tokio::time::timeout(limits.timeout, async {
        let (out, err) = tokio::try_join!(read_capped(stdout, cap), read_capped(stderr, cap))?;
        let status = child.wait().await?;
        Ok::<_, ProcessError>((out, err, status))
    })
    .await;

    let (out, err, status) = match collected {
        Ok(Ok(done)) => done,
        Ok(Err(e)) => {
            let _ = child.kill().await;
            return Err(e);
        }
        Err(_) => {
            log::warn!("{} timed out after {}s, killing", program, limits.timeout.as_secs());
            let _ = child.kill().await;
            return Err(ProcessError::Timeout(limits.timeout));
        }
    };

    let stdout = String::from_utf8_lossy(&out).into_owned();
    let stderr = String::from_utf8_lossy(&err).into_owned();

    if status.success() {
        Ok(ProcessOutput { stdout, stderr })
    } else {
        Err(ProcessError::NonZeroExit {
            code: status.code(),
            stderr,
        })
    }
}

/// Read a stream to EOF, failing as soon as more than `cap` bytes arrive.
async fn read_capped<R: AsyncRead + Unpin>(reader: R, cap: usize) -> Result<Vec<u8>, ProcessError> {
    let mut buf = Vec::new();
    let limit = u64::try_from(cap).unwrap_or(u64::MAX).saturating_add(1);
    reader.take(limit).read_to_end(&mut buf).await?;
    if buf.len() > cap {
        return Err(ProcessError::OutputTooLarge(cap));
    }
    Ok(buf)
}
