//! ffmpeg argument construction
//!
//! Turns a [`CaptureConfig`] into the exact argument list handed to ffmpeg.
//! Flag names and order matter: ffmpeg applies input options to the next
//! `-i` and output options to the next output target.

use tracing::info;

use crate::config::{CaptureConfig, CaptureMode};
use crate::error::Result;
use crate::types::Platform;

/// Audio sample rate sent to the RTMP server
pub const AUDIO_SAMPLE_RATE: u32 = 44100;

/// Audio channel count sent to the RTMP server
pub const AUDIO_CHANNELS: u32 = 2;

/// Folds center, back and LFE channels of a surround input into stereo
pub const STEREO_DOWNMIX_FILTER: &str =
    "pan=stereo|FL=0.5*FC+0.707*FL+0.707*BL+0.5*LFE|FR=0.5*FC+0.707*FR+0.707*BR+0.5*LFE";

/// Build the ffmpeg arguments for a stream session
pub fn build(config: &CaptureConfig) -> Result<Vec<String>> {
    config.validate()?;

    let mut args = ArgList::default();
    let fps = config.effective_framerate();

    if config.capture_mode == CaptureMode::Window {
        // validate() guarantees a title in window mode
        let title = config.window_title.as_deref().unwrap_or_default();
        info!(
            "Window capture requested for \"{}\"; capturing the full screen, keep the window visible and in front",
            title
        );
    } else {
        info!("Capturing entire screen");
    }

    match config.platform {
        Platform::MacOs => {
            args.push_all(["-f", "avfoundation"]);
            args.push("-framerate").push(fps);
            args.push("-video_size").push(config.resolution);
            args.push_all([
                "-pixel_format",
                "uyvy422",
                "-capture_cursor",
                "1",
                "-capture_mouse_clicks",
                "1",
            ]);
            args.push("-i").push(config.video_device_id());

            if config.include_audio {
                args.push_all(["-f", "avfoundation"]);
                args.push("-i").push(format!(":{}", config.audio_device_id()));
            }
        }
        Platform::Linux => {
            args.push_all(["-f", "x11grab"]);
            args.push("-framerate").push(fps);
            args.push("-video_size").push(config.resolution);
            args.push("-i").push(config.video_device_id());

            if config.include_audio {
                args.push("-f").push(config.audio_backend.ffmpeg_format());
                args.push("-i").push(config.audio_device_id());
            }
        }
    }

    let video_bitrate = format!("{}k", config.video_bitrate);
    args.push_all(["-c:v", "libx264"]);
    args.push("-preset").push(config.quality.x264_preset());
    args.push("-b:v").push(&video_bitrate);
    args.push("-maxrate").push(&video_bitrate);
    args.push("-bufsize").push(format!("{}k", u64::from(config.video_bitrate) * 2));
    args.push_all(["-pix_fmt", "yuv420p"]);
    args.push("-r").push(fps);

    if config.include_audio {
        args.push_all(["-c:a", "aac"]);
        args.push("-b:a").push(format!("{}k", config.audio_bitrate));
        args.push("-ar").push(AUDIO_SAMPLE_RATE);
        args.push("-ac").push(AUDIO_CHANNELS);
        if config.platform == Platform::MacOs {
            args.push("-af").push(STEREO_DOWNMIX_FILTER);
        }
    } else {
        args.push("-an");
    }

    if config.platform == Platform::MacOs {
        args.push_all(["-fps_mode", "cfr", "-async", "1", "-strict", "experimental"]);
    }

    args.push_all(["-f", "flv"]);
    args.push(config.target_url.trim());

    Ok(args.into_inner())
}

/// Preset name that `build` will pass for a quality string
pub fn preset_for(quality: &str) -> &'static str {
    crate::config::Quality::from_name(quality).x264_preset()
}

#[derive(Default)]
struct ArgList(Vec<String>);

impl ArgList {
    fn push(&mut self, arg: impl ToString) -> &mut Self {
        self.0.push(arg.to_string());
        self
    }

    fn push_all<const N: usize>(&mut self, args: [&str; N]) -> &mut Self {
        self.0.extend(args.iter().map(|a| a.to_string()));
        self
    }

    fn into_inner(self) -> Vec<String> {
        self.0
    }
}
