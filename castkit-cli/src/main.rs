//! castkit CLI
//!
//! Stream your screen to an RTMP server through ffmpeg.
//!
//! # Usage
//!
//! ```bash
//! # Show capture devices and windows
//! castkit list-devices
//!
//! # Check that ffmpeg and the display are usable
//! castkit check
//!
//! # Start streaming (Ctrl+C to stop)
//! castkit cast rtmp://a.rtmp.youtube.com/live2/KEY --quality fast
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// castkit - screen capture to RTMP via ffmpeg
#[derive(Parser)]
#[command(name = "castkit")]
#[command(version)]
#[command(about = "Stream your screen to RTMP with ffmpeg (macOS and Linux)", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v info, -vv debug incl. ffmpeg output, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List capture devices and windows
    #[command(alias = "ls")]
    ListDevices(commands::ListArgs),

    /// Check platform support and ffmpeg availability
    Check,

    /// Start streaming to an RTMP server
    Cast(commands::CastArgs),

    /// Manage configuration
    Config(commands::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(format!("castkit={}", level).parse()?),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::ListDevices(args) => commands::list_devices(args).await?,
        Commands::Check => commands::check().await?,
        Commands::Cast(args) => commands::cast(args).await?,
        Commands::Config(args) => commands::config(args).await?,
    }

    Ok(())
}
