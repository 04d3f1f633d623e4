use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grabgate")]
#[command(author, version, about = "Media URL extraction service with a token-gated download proxy", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Port to listen on (overrides WEB_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Extract formats for one URL and print them
    Info {
        /// Source video URL
        url: String,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve the yt-dlp binary and print its path and version
    Locate,

    /// Replace the cookie jar with an exported Netscape cookie file
    ImportCookies {
        /// Path to the exported cookies.txt
        file: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
