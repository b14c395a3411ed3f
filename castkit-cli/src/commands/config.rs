//! Config command - manage the configuration file

use std::path::PathBuf;

use anyhow::{Context, Result};
use castkit_core::config::{sample_config, ConfigFile};
use castkit_core::types::mask_url;
use clap::{Args, Subcommand};

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Use this file instead of the default location
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the path to the config file
    Path,

    /// Show the effective settings
    Show,

    /// Write the sample config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the sample configuration to stdout
    Sample,
}

/// Run config subcommand
pub async fn config(args: ConfigArgs) -> Result<()> {
    let path = args.file.unwrap_or_else(ConfigFile::default_path);

    match args.command {
        ConfigCommand::Path => {
            let state = if path.exists() { "exists" } else { "not created yet" };
            println!("{} ({})", path.display(), state);
        }
        ConfigCommand::Show => {
            let file = ConfigFile::load_from(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?;

            if path.exists() {
                println!("Configuration file: {}\n", path.display());
            } else {
                println!("No configuration file at {}, showing defaults.\n", path.display());
            }

            let url = if file.stream.url.is_empty() {
                "(ask on start)".to_string()
            } else {
                mask_url(&file.stream.url)
            };
            let or_default = |s: &str| if s.is_empty() { "(platform default)".to_string() } else { s.to_string() };

            println!("[stream]");
            println!("  url:              {}", url);
            println!("[video]");
            println!("  resolution:       {}", file.video.resolution);
            println!("  framerate:        {} fps", file.video.framerate);
            println!("  bitrate:          {} kbps", file.video.bitrate);
            println!("  quality:          {}", file.video.quality);
            println!("  device:           {}", or_default(&file.video.device));
            println!("[audio]");
            println!("  enabled:          {}", file.audio.enabled);
            println!("  bitrate:          {} kbps", file.audio.bitrate);
            println!("  device:           {}", or_default(&file.audio.device));
            println!("  backend:          {}", file.audio.backend);
            println!("[encoder]");
            println!("  binary:           {}", file.encoder.binary);
            println!("  startup grace:    {} ms", file.encoder.startup_grace_ms);
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                println!("Configuration file already exists: {}", path.display());
                println!("Use --force to overwrite it.");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
            std::fs::write(&path, sample_config())
                .with_context(|| format!("Failed to write {}", path.display()))?;

            println!("Created configuration file: {}", path.display());
            println!("Set [stream] url to skip the URL prompt on 'castkit cast'.");
        }
        ConfigCommand::Sample => {
            print!("{}", sample_config());
        }
    }

    Ok(())
}
