//! Configuration types for castkit
//!
//! Provides the capture configuration, quality presets and the config file.

mod file;

pub use file::{sample_config, ConfigFile};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CastError, Result};
use crate::types::{Platform, Resolution};

/// Encoder quality preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum Quality {
    /// Fastest encoding, lowest quality
    Fast,
    /// Balanced encoding (default)
    #[default]
    Medium,
    /// Slower encoding, better quality
    Slow,
    /// Best quality, slowest encoding
    High,
}

impl Quality {
    /// Get the libx264 preset name
    pub fn x264_preset(&self) -> &'static str {
        match self {
            Self::Fast => "ultrafast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::High => "veryslow",
        }
    }

    /// Parse a quality name, falling back to `Medium` for anything unknown
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "fast" => Self::Fast,
            "medium" => Self::Medium,
            "slow" => Self::Slow,
            "high" => Self::High,
            other => {
                warn!("Unknown quality '{}', using medium", other);
                Self::Medium
            }
        }
    }

    /// Get the quality name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<String> for Quality {
    fn from(s: String) -> Self {
        Self::from_name(&s)
    }
}

impl From<&str> for Quality {
    fn from(s: &str) -> Self {
        Self::from_name(s)
    }
}

impl From<Quality> for String {
    fn from(q: Quality) -> Self {
        q.name().to_string()
    }
}

/// What part of the display to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureMode {
    /// Whole display
    #[default]
    FullScreen,
    /// A single window, selected by title
    ///
    /// Neither AVFoundation nor the x11grab invocation isolate a window, so
    /// this still records the full screen and only logs which window to keep
    /// in front.
    Window,
}

impl std::fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FullScreen => write!(f, "full-screen"),
            Self::Window => write!(f, "window"),
        }
    }
}

impl std::str::FromStr for CaptureMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "screen" | "full-screen" | "fullscreen" => Ok(Self::FullScreen),
            "window" => Ok(Self::Window),
            _ => Err(format!("Unknown capture mode: {}", s)),
        }
    }
}

/// Linux audio input driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    /// PulseAudio (or pipewire-pulse)
    #[default]
    Pulse,
    /// Raw ALSA, used as the fallback
    Alsa,
}

impl AudioBackend {
    /// Get the ffmpeg input format name
    pub fn ffmpeg_format(&self) -> &'static str {
        match self {
            Self::Pulse => "pulse",
            Self::Alsa => "alsa",
        }
    }
}

impl std::fmt::Display for AudioBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ffmpeg_format())
    }
}

impl std::str::FromStr for AudioBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pulse" | "pulseaudio" => Ok(Self::Pulse),
            "alsa" => Ok(Self::Alsa),
            _ => Err(format!("Unknown audio backend: {}", s)),
        }
    }
}

/// ALSA device used when falling back from PulseAudio
pub const ALSA_FALLBACK_DEVICE: &str = "hw:0";

/// Full capture configuration for one stream session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Host kind the arguments are built for
    pub platform: Platform,
    /// Destination, e.g. rtmp://a.rtmp.youtube.com/live2/KEY
    pub target_url: String,
    /// Capture and encode an audio stream
    #[serde(default = "default_true")]
    pub include_audio: bool,
    /// Encoder quality preset
    #[serde(default)]
    pub quality: Quality,
    /// Capture framerate (capped per platform)
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    /// Capture resolution
    #[serde(default)]
    pub resolution: Resolution,
    /// Video bitrate in kbps
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: u32,
    /// Audio bitrate in kbps
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: u32,
    /// Platform-specific video input id (None = platform default)
    #[serde(default)]
    pub video_device: Option<String>,
    /// Platform-specific audio input id (None = platform default)
    #[serde(default)]
    pub audio_device: Option<String>,
    /// Full screen or window
    #[serde(default)]
    pub capture_mode: CaptureMode,
    /// Window to keep in front when `capture_mode` is `Window`
    #[serde(default)]
    pub window_title: Option<String>,
    /// Audio driver (Linux only)
    #[serde(default)]
    pub audio_backend: AudioBackend,
}

fn default_true() -> bool {
    true
}

fn default_framerate() -> u32 {
    30
}

fn default_video_bitrate() -> u32 {
    2500
}

fn default_audio_bitrate() -> u32 {
    128
}

impl CaptureConfig {
    /// Create a config with defaults for the given platform
    pub fn new(platform: Platform, target_url: impl Into<String>) -> Self {
        Self {
            platform,
            target_url: target_url.into(),
            include_audio: true,
            quality: Quality::default(),
            framerate: default_framerate(),
            resolution: Resolution::default(),
            video_bitrate: default_video_bitrate(),
            audio_bitrate: default_audio_bitrate(),
            video_device: None,
            audio_device: None,
            capture_mode: CaptureMode::default(),
            window_title: None,
            audio_backend: AudioBackend::default(),
        }
    }

    /// Enable or disable audio
    pub fn with_audio(mut self, include_audio: bool) -> Self {
        self.include_audio = include_audio;
        self
    }

    /// Set the quality preset
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Set the framerate
    pub fn with_framerate(mut self, framerate: u32) -> Self {
        self.framerate = framerate;
        self
    }

    /// Set the resolution
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set video and audio bitrates in kbps
    pub fn with_bitrates(mut self, video_kbps: u32, audio_kbps: u32) -> Self {
        self.video_bitrate = video_kbps;
        self.audio_bitrate = audio_kbps;
        self
    }

    /// Set the video input id
    pub fn with_video_device(mut self, device: impl Into<String>) -> Self {
        self.video_device = Some(device.into());
        self
    }

    /// Set the audio input id
    pub fn with_audio_device(mut self, device: impl Into<String>) -> Self {
        self.audio_device = Some(device.into());
        self
    }

    /// Switch to window capture mode
    pub fn with_window(mut self, title: impl Into<String>) -> Self {
        self.capture_mode = CaptureMode::Window;
        self.window_title = Some(title.into());
        self
    }

    /// Set the Linux audio backend
    pub fn with_audio_backend(mut self, backend: AudioBackend) -> Self {
        self.audio_backend = backend;
        self
    }

    /// Framerate after applying the platform cap
    pub fn effective_framerate(&self) -> u32 {
        match self.platform.max_framerate() {
            Some(max) => self.framerate.min(max),
            None => self.framerate,
        }
    }

    /// Video input id, falling back to the platform default
    pub fn video_device_id(&self) -> &str {
        non_empty(self.video_device.as_deref()).unwrap_or(self.platform.default_video_device())
    }

    /// Audio input id, falling back to the platform default
    pub fn audio_device_id(&self) -> &str {
        non_empty(self.audio_device.as_deref()).unwrap_or(self.platform.default_audio_device())
    }

    /// Whether a failed launch may be retried with ALSA
    pub fn alsa_fallback_eligible(&self) -> bool {
        self.platform == Platform::Linux
            && self.include_audio
            && self.audio_backend != AudioBackend::Alsa
    }

    /// The same configuration with audio switched to ALSA's first card
    pub fn alsa_fallback(&self) -> Self {
        let mut config = self.clone();
        config.audio_backend = AudioBackend::Alsa;
        config.audio_device = Some(ALSA_FALLBACK_DEVICE.to_string());
        config
    }

    /// Check the configuration invariants
    pub fn validate(&self) -> Result<()> {
        if self.target_url.trim().is_empty() {
            return Err(CastError::invalid("target URL is empty"));
        }
        if self.framerate == 0 {
            return Err(CastError::invalid("framerate must be positive"));
        }
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(CastError::invalid(format!(
                "resolution {} must have positive width and height",
                self.resolution
            )));
        }
        if self.video_bitrate == 0 {
            return Err(CastError::invalid("video bitrate must be positive"));
        }
        if self.include_audio && self.audio_bitrate == 0 {
            return Err(CastError::invalid("audio bitrate must be positive"));
        }
        if self.capture_mode == CaptureMode::Window
            && non_empty(self.window_title.as_deref()).is_none()
        {
            return Err(CastError::invalid(
                "window capture mode requires a window title",
            ));
        }
        Ok(())
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}
