//! Cast command - capture the screen and stream it to an RTMP server

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use castkit_core::{
    config::{CaptureConfig, CaptureMode, ConfigFile, Quality},
    discovery,
    encoder::ProcessEvent,
    error::CastError,
    preflight,
    session::SessionManager,
    types::{mask_url, parse_bitrate, DeviceDescriptor, DeviceKind, Platform, Resolution},
};
use clap::Args;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::signal;
use tracing::{debug, error, warn};

use super::print_hint;

/// Arguments for the cast command
#[derive(Args)]
pub struct CastArgs {
    /// RTMP URL including the stream key (asked for when omitted)
    url: Option<String>,

    /// Stream video only
    #[arg(long)]
    no_audio: bool,

    /// Quality preset (fast, medium, slow, high)
    #[arg(short, long)]
    quality: Option<String>,

    /// Capture framerate (macOS is capped at 30)
    #[arg(long)]
    fps: Option<u32>,

    /// Capture resolution, e.g. 1920x1080
    #[arg(short, long)]
    resolution: Option<Resolution>,

    /// Video bitrate in kbps, e.g. 2500 or 2500k
    #[arg(long, value_parser = parse_bitrate)]
    video_bitrate: Option<u32>,

    /// Audio bitrate in kbps, e.g. 128 or 128k
    #[arg(long, value_parser = parse_bitrate)]
    audio_bitrate: Option<u32>,

    /// Video input id (see 'castkit list-devices')
    #[arg(long)]
    video_device: Option<String>,

    /// Audio input id (see 'castkit list-devices')
    #[arg(long)]
    audio_device: Option<String>,

    /// Window to keep in front while capturing the screen
    #[arg(short, long, value_name = "TITLE")]
    window: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Start a stream and run it until Ctrl+C or until the encoder exits
pub async fn cast(args: CastArgs) -> Result<()> {
    println!("castkit - Starting Stream\n");

    let platform = Platform::current().context("Cannot stream from this system")?;

    let file = match &args.config {
        Some(path) => ConfigFile::load_from(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ConfigFile::load_or_default(),
    };

    if let Err(e) = preflight::require_dependencies(platform, &file.encoder.binary).await {
        eprintln!("Error: {}", e);
        eprintln!("Install ffmpeg with: {}", preflight::install_hint(platform));
        return Err(e.into());
    }

    let interactive = std::io::stdin().is_terminal();
    let mut prompt = Prompt::new();

    let url = match args.url.clone().or_else(|| non_empty(&file.stream.url)) {
        Some(url) => url,
        None if interactive => prompt
            .ask("Stream URL (rtmp://server/app/key)")
            .await?
            .ok_or_else(|| anyhow!("A stream URL is required"))?,
        None => {
            return Err(anyhow!(
                "A stream URL is required (pass it as an argument or set [stream] url)"
            ))
        }
    };

    let mut config = file.to_capture_config(platform, Some(url.as_str()))?;
    apply_flags(&mut config, &args);

    if interactive {
        choose_devices(&mut config, &args, &file, &mut prompt).await?;
    }

    print_config(&config);
    let requested_backend = config.audio_backend;

    let mut manager = SessionManager::new()
        .with_encoder(file.encoder.binary.clone())
        .with_startup_grace(file.encoder.startup_grace());

    let handle = match manager.start(config).await {
        Ok(handle) => handle,
        Err(e) => {
            print_hint(&e);
            return Err(anyhow::Error::new(e).context("Failed to start stream"));
        }
    };
    debug!("Session {} running", handle);

    if let Some(session) = manager.session() {
        let started = session.config();
        if started.audio_backend != requested_backend {
            println!(
                "Note: {} audio failed to start, streaming with {} device {}.",
                requested_backend,
                started.audio_backend,
                started.audio_device_id()
            );
        }
    }

    println!("Streaming! Press Ctrl+C to stop...\n");

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let exit = loop {
        tokio::select! {
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl+C")?;
                println!("\nReceived interrupt signal...");
                break None;
            }
            event = manager.next_event() => match event {
                Some(ProcessEvent::Output { .. }) => continue,
                Some(ProcessEvent::Exited { code }) => break Some(code),
                Some(ProcessEvent::Error(e)) => {
                    error!("Encoder supervision failed: {}", e);
                    return Err(anyhow!("Stream failed: {}", e));
                }
                None => break Some(None),
            },
        }
    };

    match exit {
        None => {
            println!("Stopping stream...");
            manager.stop().await?;
            println!("Stream stopped.");
            Ok(())
        }
        Some(Some(0)) => {
            println!("Stream ended.");
            Ok(())
        }
        Some(code) => {
            warn!("Encoder stopped unexpectedly");
            let err = CastError::EncoderExit(code);
            eprintln!("Run with -vv to see ffmpeg's output.");
            Err(err.into())
        }
    }
}

fn apply_flags(config: &mut CaptureConfig, args: &CastArgs) {
    if args.no_audio {
        config.include_audio = false;
    }
    if let Some(quality) = &args.quality {
        config.quality = Quality::from_name(quality);
    }
    if let Some(fps) = args.fps {
        config.framerate = fps;
    }
    if let Some(resolution) = args.resolution {
        config.resolution = resolution;
    }
    if let Some(kbps) = args.video_bitrate {
        config.video_bitrate = kbps;
    }
    if let Some(kbps) = args.audio_bitrate {
        config.audio_bitrate = kbps;
    }
    if let Some(device) = &args.video_device {
        config.video_device = Some(device.clone());
    }
    if let Some(device) = &args.audio_device {
        config.audio_device = Some(device.clone());
    }
    if let Some(title) = &args.window {
        config.capture_mode = CaptureMode::Window;
        config.window_title = Some(title.clone());
    }
}

/// Offer the discovered devices for any id not given by flag or config file
async fn choose_devices(
    config: &mut CaptureConfig,
    args: &CastArgs,
    file: &ConfigFile,
    prompt: &mut Prompt,
) -> Result<()> {
    let need_video = args.video_device.is_none() && file.video.device.is_empty();
    let need_audio =
        config.include_audio && args.audio_device.is_none() && file.audio.device.is_empty();
    if !need_video && !need_audio {
        return Ok(());
    }

    let listing = discovery::discover_with(config.platform, &file.encoder.binary).await;
    if listing.is_empty() {
        debug!("No devices discovered, using platform defaults");
        return Ok(());
    }

    for (kind, wanted) in [(DeviceKind::Video, need_video), (DeviceKind::Audio, need_audio)] {
        if !wanted {
            continue;
        }
        let devices: Vec<_> = listing.of_kind(kind).collect();
        if devices.is_empty() {
            continue;
        }

        let default = match kind {
            DeviceKind::Video => config.video_device_id().to_string(),
            DeviceKind::Audio => config.audio_device_id().to_string(),
        };
        println!("{} devices:", kind);
        for device in &devices {
            let hint = device.hint.as_deref().map(|h| format!(" ({})", h)).unwrap_or_default();
            println!("  [{}] {}{}", device.index, device.name, hint);
        }

        let question = format!("{} device [{}]", kind, default);
        if let Some(answer) = prompt.ask(&question).await? {
            let id = device_id(config.platform, &devices, &answer);
            match kind {
                DeviceKind::Video => config.video_device = Some(id),
                DeviceKind::Audio => config.audio_device = Some(id),
            }
        }
        println!();
    }

    Ok(())
}

/// Map an answer to the id ffmpeg expects
///
/// AVFoundation takes the index; PulseAudio takes the source name, so an
/// index typed on Linux is resolved to the listed name.
fn device_id(platform: Platform, devices: &[DeviceDescriptor], answer: &str) -> String {
    match platform {
        Platform::MacOs => answer.to_string(),
        Platform::Linux => answer
            .parse::<u32>()
            .ok()
            .and_then(|index| devices.iter().find(|d| d.index == index))
            .map(|d| d.name.clone())
            .unwrap_or_else(|| answer.to_string()),
    }
}

fn print_config(config: &CaptureConfig) {
    println!("Configuration:");
    println!("  Platform:    {}", config.platform);
    println!("  Target:      {}", mask_url(&config.target_url));
    println!("  Resolution:  {}", config.resolution);
    println!("  Framerate:   {} fps", config.effective_framerate());
    if config.effective_framerate() != config.framerate {
        println!("               (requested {}, capped on {})", config.framerate, config.platform);
    }
    println!("  Quality:     {} (preset {})", config.quality, config.quality.x264_preset());
    println!("  Video:       {} kbps from {}", config.video_bitrate, config.video_device_id());
    if config.include_audio {
        println!("  Audio:       {} kbps from {}", config.audio_bitrate, config.audio_device_id());
    } else {
        println!("  Audio:       disabled");
    }
    if let Some(title) = &config.window_title {
        println!("  Window:      {} (full screen is captured, keep it in front)", title);
    }
    println!();
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Line-based questions on stdin
struct Prompt {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompt {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Ask a question; `None` for an empty answer or end of input
    async fn ask(&mut self, question: &str) -> Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(format!("{}: ", question).as_bytes()).await?;
        stdout.flush().await?;

        let line = self.lines.next_line().await.context("Failed to read answer")?;
        Ok(line.and_then(|l| non_empty(&l)))
    }
}
