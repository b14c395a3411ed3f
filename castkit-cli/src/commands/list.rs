//! List devices command

use anyhow::{Context, Result};
use castkit_core::{
    discovery,
    types::{DeviceKind, Platform},
};
use clap::Args;

/// Arguments for the list-devices command
#[derive(Args)]
pub struct ListArgs {
    /// Print devices and windows as JSON
    #[arg(long)]
    json: bool,
}

/// List capture devices and windows
pub async fn list_devices(args: ListArgs) -> Result<()> {
    let platform = Platform::current().context("Cannot list devices")?;

    let listing = discovery::discover(platform).await;
    let windows = discovery::list_windows(platform).await;

    if args.json {
        let output = serde_json::json!({
            "platform": platform,
            "devices": listing.iter().collect::<Vec<_>>(),
            "windows": windows,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("castkit - Capture Devices ({})\n", platform);

    if listing.is_empty() {
        println!("No devices found.");
        println!(
            "\nDefaults will be used: video \"{}\", audio \"{}\".",
            platform.default_video_device(),
            platform.default_audio_device()
        );
    }

    for (kind, title) in [(DeviceKind::Video, "Video"), (DeviceKind::Audio, "Audio")] {
        let devices: Vec<_> = listing.of_kind(kind).collect();
        if devices.is_empty() {
            continue;
        }

        println!("{} devices:", title);
        println!("{:<6} {:<50} {}", "Index", "Name", "Hint");
        println!("{}", "-".repeat(80));
        for device in devices {
            println!(
                "{:<6} {:<50} {}",
                device.index,
                truncate(&device.name, 48),
                device.hint.as_deref().unwrap_or("")
            );
        }
        println!();
    }

    if !windows.is_empty() {
        println!("Windows:");
        for window in &windows {
            if window.id.is_empty() {
                println!("  {}", window.title);
            } else {
                println!("  {:<12} {}", window.id, window.title);
            }
        }
        println!();
    }

    match platform {
        Platform::MacOs => {
            println!("Use the index with --video-device / --audio-device, e.g. 'castkit cast --video-device 1'.");
        }
        Platform::Linux => {
            println!("Use the display or source name with --video-device / --audio-device.");
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 3).collect();
        format!("{}...", head)
    }
}
