//! Logging initialization and configuration checking
//!
//! This module provides:
//! - Logger initialization (console + optional file)
//! - Startup diagnostics for binary candidates, cookies, cache and allow-list

use anyhow::Result;
use simplelog::*;
use std::str::FromStr;

use crate::core::config;
use crate::download::binary;

/// Initialize logger for console output, plus file output when a path is given
///
/// # Arguments
/// * `log_file_path` - Optional path to the log file (appended to)
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to open the log file or install the logger
pub fn init_logger(log_file_path: Option<&str>) -> Result<()> {
    let level = parse_level(&config::LOG_LEVEL);

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(path) = log_file_path {
        let log_file = fs_err::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;
        loggers.push(WriteLogger::new(level, Config::default(), log_file.into_parts().0));
    }

    CombinedLogger::init(loggers).map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Map a `LOG_LEVEL` value to a filter, defaulting to `Info`.
pub fn parse_level(value: &str) -> LevelFilter {
    LevelFilter::from_str(value.trim()).unwrap_or(LevelFilter::Info)
}

/// Logs the resolved configuration at application startup
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("⚙️  grabgate configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    log::info!("yt-dlp candidates (in order):");
    for (i, candidate) in binary::default_candidates().iter().enumerate() {
        log::info!("   {}. {}", i + 1, candidate);
    }

    let cookies = config::YTDL_COOKIES_FILE.as_path();
    if cookies.exists() {
        log::info!("🍪 Cookie jar: {} (present)", cookies.display());
    } else {
        log::warn!(
            "🍪 Cookie jar: {} (absent, a placeholder is created on first use)",
            cookies.display()
        );
    }

    match config::EXTRACT_SIGNATURES_FILE.as_deref() {
        Some(path) => log::info!("Failure signatures: {}", path),
        None => log::info!("Failure signatures: built-in table"),
    }

    log::info!(
        "Result cache: {} entries, {}s TTL, single-flight {}",
        config::cache::CAPACITY,
        config::cache::TTL_SECS,
        if *config::SINGLE_FLIGHT { "on" } else { "off" }
    );
    log::info!(
        "Sources: YouTube, Vimeo{}",
        if *config::ALLOW_GENERIC_SOURCES { ", generic" } else { "" }
    );
    log::info!("Proxy allow-list: {}", config::proxy::ALLOWED_DOMAINS.join(", "));
    log::info!("Redirect hosts: {}", config::proxy::REDIRECT_DOMAINS.join(", "));
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
