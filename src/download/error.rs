use thiserror::Error;

use crate::download::binary::LocateError;
use crate::download::platform::Platform;
use crate::download::signatures::FailureKind;

/// Failure of a whole extraction ladder run.
///
/// `last_stderr` is kept for logging and classification only. It is
/// deliberately absent from `Display`, and the conversion into
/// [`crate::core::error::AppError`] drops it.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// No candidate binary passed the `--version` probe
    #[error(transparent)]
    BinaryUnavailable(#[from] LocateError),

    /// Ladder exhausted, or aborted on an unrecognized failure
    #[error("extraction failed for {platform} after strategy '{last_strategy}' (signature: {signature:?})")]
    StrategyExhausted {
        platform: Platform,
        signature: Option<FailureKind>,
        last_strategy: String,
        last_stderr: String,
    },

    /// A strategy hit its wall-clock budget and the ladder could not escalate
    #[error("strategy '{strategy}' timed out after {secs}s")]
    Timeout { strategy: String, secs: u64 },

    /// Tool wrote more than the configured cap
    #[error("strategy '{strategy}' produced more than {limit} bytes")]
    OutputTooLarge { strategy: String, limit: usize },

    #[error("IO error during extraction: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Classified signature, if the failure carried one.
    pub fn signature(&self) -> Option<FailureKind> {
        match self {
            ExtractError::StrategyExhausted { signature, .. } => *signature,
            ExtractError::Timeout { .. } => Some(FailureKind::Timeout),
            _ => None,
        }
    }

    /// Short category used in log lines.
    pub fn category(&self) -> &'static str {
        match self {
            ExtractError::BinaryUnavailable(_) => "binary_unavailable",
            ExtractError::StrategyExhausted { .. } => "strategy_exhausted",
            ExtractError::Timeout { .. } => "timeout",
            ExtractError::OutputTooLarge { .. } => "output_too_large",
            ExtractError::Io(_) => "io",
        }
    }
}
