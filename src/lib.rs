//! grabgate - media URL extraction behind a token-gated download proxy
//!
//! Resolves YouTube and Vimeo links to direct, time-limited media URLs by
//! driving yt-dlp through an escalating ladder of invocation strategies,
//! normalizes the result into a fixed set of quality buckets, and serves
//! chosen formats through signed, expiring download tokens.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, subprocess execution, HTTP surface
//! - `download`: platform detection, binary discovery, strategy ladder,
//!   normalization, caching
//! - `delivery`: download grants, host allow-list, redirect/streaming proxy

pub mod cli;
pub mod core;
pub mod delivery;
pub mod download;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use delivery::{DownloadGrant, DownloadProxy, GrantCodec, HmacGrantCodec};
pub use download::{ExtractionService, Platform, Quality, VideoInfo};
