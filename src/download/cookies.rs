//! Cookie jar management for yt-dlp
//!
//! This module provides functionality to:
//! - Materialize the cookie file cookie-dependent strategies need
//!   (reuse an existing jar, or write a minimal placeholder)
//! - Replace the jar from user-supplied Netscape content
//! - Inspect a jar for diagnostics
//!
//! The jar is process-wide shared state. Every write goes through
//! [`COOKIES_WRITE_MUTEX`] and lands via write-to-temp-then-rename, so a
//! concurrent reader (a running yt-dlp) sees either the old or the new
//! file, never a torn one.

use anyhow::Result;
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Mutex to prevent concurrent cookie file writes (race condition protection)
static COOKIES_WRITE_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// First line of every Netscape cookie jar
pub const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";

/// Jar written when no real cookies were provided.
///
/// Holds one harmless session cookie so yt-dlp accepts the file as a jar.
fn placeholder_jar() -> String {
    format!(
        "{NETSCAPE_HEADER}\n# Generated by grabgate. Replace with an exported browser jar for authenticated access.\n.youtube.com\tTRUE\t/\tTRUE\t0\tPREF\thl=en\n"
    )
}

/// Ensure a usable cookie file exists at `path` and return it.
///
/// Idempotent: a non-empty existing file is reused untouched. Otherwise a
/// placeholder jar is written atomically. Callers treat an error as
/// "skip cookie strategies", never as a request failure.
pub async fn ensure_cookie_file(path: &Path) -> Result<PathBuf> {
    if is_non_empty_file(path).await {
        return Ok(path.to_path_buf());
    }

    let _lock = COOKIES_WRITE_MUTEX.lock().await;

    // Another task may have created it while we waited
    if is_non_empty_file(path).await {
        return Ok(path.to_path_buf());
    }

    write_atomic(path, &placeholder_jar()).await?;
    log::info!("Created placeholder cookie jar at {}", path.display());
    Ok(path.to_path_buf())
}

/// Replace the jar at `path` with `content` after validating its format.
///
/// Returns the number of cookie entries written.
pub async fn update_cookies_from_content(path: &Path, content: &str) -> Result<usize> {
    let count = validate_cookie_content(content)?;

    let _lock = COOKIES_WRITE_MUTEX.lock().await;
    write_atomic(path, content).await?;

    log::info!("Cookies file updated atomically: {} ({} entries)", path.display(), count);
    Ok(count)
}

/// Check that `content` looks like a Netscape jar with at least one entry.
pub fn validate_cookie_content(content: &str) -> Result<usize> {
    let has_header = content.lines().any(|l| l.contains("Netscape HTTP Cookie File"));
    let count = cookie_lines(content).count();

    if !has_header && count == 0 {
        return Err(anyhow::anyhow!(
            "Invalid cookies format. Expected Netscape HTTP Cookie File format"
        ));
    }
    if count == 0 {
        return Err(anyhow::anyhow!("Cookie file contains no cookie entries"));
    }
    Ok(count)
}

/// Count entries whose domain is `domain` or one of its subdomains.
///
/// A leading dot on the cookie domain is ignored, so `.vimeo.com` counts
/// for `vimeo.com` while `notvimeo.com` does not.
pub fn count_cookies_for_domain(content: &str, domain: &str) -> usize {
    let domain = domain.trim_start_matches('.').to_lowercase();
    cookie_lines(content)
        .filter(|fields| {
            let cookie_domain = fields[0].trim_start_matches('.').to_lowercase();
            cookie_domain == domain || cookie_domain.ends_with(&format!(".{domain}"))
        })
        .count()
}

/// Netscape format: domain TAB flag TAB path TAB secure TAB expires TAB name TAB value
fn cookie_lines(content: &str) -> impl Iterator<Item = Vec<&str>> {
    content
        .lines()
        .map(str::trim)
        // "#HttpOnly_" prefixed lines are real cookies, not comments
        .map(|line| line.strip_prefix("#HttpOnly_").unwrap_or(line))
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.split('\t').collect::<Vec<_>>())
        .filter(|fields| fields.len() >= 7)
}

async fn is_non_empty_file(path: &Path) -> bool {
    match fs_err::tokio::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Atomic write: write to temp file, then rename.
/// Must be called with [`COOKIES_WRITE_MUTEX`] held.
async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::tokio::create_dir_all(parent).await?;
    }

    let temp_path = PathBuf::from(format!("{}.tmp.{}", path.display(), std::process::id()));
    fs_err::tokio::write(&temp_path, content).await?;

    if let Err(e) = fs_err::tokio::rename(&temp_path, path).await {
        // Clean up temp file on rename failure
        let _ = fs_err::tokio::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}
