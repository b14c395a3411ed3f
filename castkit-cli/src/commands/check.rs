//! Check command - show platform support and dependency status

use anyhow::Result;
use castkit_core::{config::ConfigFile, preflight, types::Platform};

/// Show platform information and preflight results
pub async fn check() -> Result<()> {
    println!("castkit - System Check\n");

    let platform = match Platform::current() {
        Ok(platform) => platform,
        Err(e) => {
            println!("  [!!] {}", e);
            println!();
            println!("castkit supports macOS (AVFoundation) and Linux (X11).");
            return Err(e.into());
        }
    };

    let file = ConfigFile::load_or_default();
    let binary = file.encoder.binary.as_str();

    println!("Platform:");
    println!("  OS:              {}", platform);
    match platform.max_framerate() {
        Some(max) => println!("  Max framerate:   {} fps", max),
        None => println!("  Max framerate:   unlimited"),
    }
    println!("  Default video:   {}", platform.default_video_device());
    println!("  Default audio:   {}", platform.default_audio_device());
    println!();

    let capture_ok = preflight::check_dependencies(platform);
    let encoder_ok = preflight::check_encoder_available(binary).await;

    let icon = |ok: bool| if ok { "[OK]" } else { "[!!]" };

    println!("Dependencies:");
    match platform {
        Platform::MacOs => println!("  {} AVFoundation", icon(capture_ok)),
        Platform::Linux => println!(
            "  {} X11 display:  {}",
            icon(capture_ok),
            std::env::var("DISPLAY").unwrap_or_else(|_| "not set".to_string())
        ),
    }
    println!("  {} {}", icon(encoder_ok), binary);

    if !capture_ok || !encoder_ok {
        println!();
        println!("  Troubleshooting:");
        if !capture_ok {
            println!("    - x11grab needs a running X11 session with DISPLAY set");
        }
        if !encoder_ok {
            println!("    - Install ffmpeg: {}", preflight::install_hint(platform));
        }
    }

    println!();
    println!("Configuration: {}", ConfigFile::default_path().display());

    println!();
    if capture_ok && encoder_ok {
        println!("Ready to stream. Run 'castkit cast' to start.");
    } else {
        println!("Fix the issues above before running 'castkit cast'.");
    }

    Ok(())
}
