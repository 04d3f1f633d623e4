use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;

use grabgate::cli::{Cli, Commands};
use grabgate::core::web_server::{self, WebState};
use grabgate::core::{config, init_logger, log_startup_configuration, SystemRunner};
use grabgate::delivery::{DownloadProxy, HmacGrantCodec};
use grabgate::download::{cookies, BinaryLocator, ExtractionService};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the selected subcommand.
///
/// # Errors
/// Returns an error if initialization fails or the subcommand fails.
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env before any config is read
    let _ = dotenv();

    let cli = Cli::parse_args();

    // Log panics instead of losing them in a detached task
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    init_logger(config::LOG_FILE_PATH.as_deref())?;

    match cli.command {
        None => run_server(*config::WEB_PORT).await,
        Some(Commands::Serve { port }) => run_server(port.unwrap_or(*config::WEB_PORT)).await,
        Some(Commands::Info { url, json }) => run_info(&url, json).await,
        Some(Commands::Locate) => run_locate().await,
        Some(Commands::ImportCookies { file }) => run_import_cookies(&file).await,
    }
}

async fn run_server(port: u16) -> Result<()> {
    log_startup_configuration();

    let service = ExtractionService::from_config(Arc::new(SystemRunner));
    if let Err(e) = service.extractor().locator().locate(service.extractor().runner()).await {
        // Not fatal: the binary may be installed after start
        log::error!("⚠️  {}", e);
    }

    let state = WebState {
        service: Arc::new(service),
        grants: Arc::new(HmacGrantCodec::from_config()),
        proxy: Arc::new(DownloadProxy::from_config()?),
    };

    web_server::start_web_server(port, state).await
}

async fn run_info(url: &str, json: bool) -> Result<()> {
    let service = ExtractionService::from_config(Arc::new(SystemRunner)).with_generic_sources(true);

    let info = service
        .get_info(url)
        .await
        .map_err(|e| anyhow::anyhow!("{} ({})", e.user_message(), e.category()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(info.as_ref())?);
        return Ok(());
    }

    println!("{}", info.title);
    println!("duration: {}s", info.duration);
    if let Some(thumbnail) = &info.thumbnail {
        println!("thumbnail: {}", thumbnail);
    }
    for format in &info.formats {
        let audio = if format.has_audio {
            "audio"
        } else if format.can_merge_audio {
            "video-only, mergeable"
        } else {
            "video-only"
        };
        let size = format
            .filesize
            .map(|b| format!("{:.1} MiB", b as f64 / (1024.0 * 1024.0)))
            .unwrap_or_else(|| "?".to_string());
        println!("  {:<15} {:<5} {:>12}  {}", format.quality.to_string(), format.format, size, audio);
    }
    Ok(())
}

async fn run_locate() -> Result<()> {
    let located = BinaryLocator::default().locate(&SystemRunner).await?;
    println!("{} ({})", located.path, located.version);
    Ok(())
}

async fn run_import_cookies(file: &std::path::Path) -> Result<()> {
    let content = fs_err::tokio::read_to_string(file).await?;
    let target = config::YTDL_COOKIES_FILE.as_path();
    let count = cookies::update_cookies_from_content(target, &content).await?;

    println!("Imported {} cookies into {}", count, target.display());
    for domain in ["youtube.com", "vimeo.com"] {
        println!("  {}: {}", domain, cookies::count_cookies_for_domain(&content, domain));
    }
    Ok(())
}
