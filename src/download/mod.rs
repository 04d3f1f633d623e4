//! Media URL extraction: platform routing, the yt-dlp strategy ladder,
//! normalization and caching

pub mod binary;
pub mod cache;
pub mod cookies;
pub mod error;
pub mod extractor;
pub mod formats;
pub mod platform;
pub mod service;
pub mod signatures;
pub mod strategy;

// Re-exports for convenience
pub use binary::{BinaryLocator, LocateError, LocatedBinary};
pub use cache::ResultCache;
pub use error::ExtractError;
pub use extractor::{Extractor, RawInfo};
pub use formats::{normalize, CanonicalFormat, NormalizeError, Quality, VideoInfo};
pub use platform::{detect, Platform, SourceRequest};
pub use service::ExtractionService;
pub use signatures::{FailureKind, SignatureTable};
