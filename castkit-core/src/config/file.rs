//! Configuration file loading and merging
//!
//! Loads user configuration from `~/.config/castkit/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{AudioBackend, CaptureConfig, Quality};
use crate::error::{CastError, Result};
use crate::types::{Platform, Resolution};

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Stream destination
    #[serde(default)]
    pub stream: StreamSettings,

    /// Video capture and encoding
    #[serde(default)]
    pub video: VideoSettings,

    /// Audio capture and encoding
    #[serde(default)]
    pub audio: AudioSettings,

    /// Encoder process settings
    #[serde(default)]
    pub encoder: EncoderSettings,
}

/// Stream destination settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamSettings {
    /// RTMP URL including the stream key (empty = ask on start)
    #[serde(default)]
    pub url: String,
}

/// Video settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Capture resolution, e.g. "1280x720"
    #[serde(default = "default_resolution")]
    pub resolution: String,

    /// Capture framerate
    #[serde(default = "default_framerate")]
    pub framerate: u32,

    /// Video bitrate in kbps
    #[serde(default = "default_video_bitrate")]
    pub bitrate: u32,

    /// Quality preset (fast, medium, slow, high)
    #[serde(default = "default_quality")]
    pub quality: String,

    /// Video input id (empty = platform default)
    #[serde(default)]
    pub device: String,
}

/// Audio settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Capture audio at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Audio bitrate in kbps
    #[serde(default = "default_audio_bitrate")]
    pub bitrate: u32,

    /// Audio input id (empty = platform default)
    #[serde(default)]
    pub device: String,

    /// Linux audio backend (pulse, alsa)
    #[serde(default = "default_backend")]
    pub backend: String,
}

/// Encoder process settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderSettings {
    /// ffmpeg binary name or path
    #[serde(default = "default_binary")]
    pub binary: String,

    /// How long the encoder must stay alive before the stream counts as running
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,
}

// Default value functions
fn default_resolution() -> String {
    "1280x720".to_string()
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

fn default_quality() -> String {
    "medium".to_string()
}

fn default_backend() -> String {
    "pulse".to_string()
}

fn default_binary() -> String {
    crate::encoder::ENCODER_BINARY.to_string()
}

fn default_startup_grace_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            framerate: default_framerate(),
            bitrate: default_video_bitrate(),
            quality: default_quality(),
            device: String::new(),
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            bitrate: default_audio_bitrate(),
            device: String::new(),
            backend: default_backend(),
        }
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            startup_grace_ms: default_startup_grace_ms(),
        }
    }
}

impl EncoderSettings {
    /// Startup grace period as a Duration
    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("castkit").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("castkit")
                .join("config.toml")
        } else {
            PathBuf::from("/etc/castkit/config.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| CastError::from(e).with_context("Failed to read config file"))?;

        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| CastError::config(format!("Failed to parse config file: {}", e)))?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CastError::from(e).with_context("Failed to create config directory")
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CastError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| CastError::from(e).with_context("Failed to write config file"))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Merge the file settings into a capture configuration
    ///
    /// `target_url` overrides `[stream] url` when given.
    pub fn to_capture_config(
        &self,
        platform: Platform,
        target_url: Option<&str>,
    ) -> Result<CaptureConfig> {
        let resolution: Resolution = self
            .video
            .resolution
            .parse()
            .map_err(|e: String| CastError::config(e))?;
        let audio_backend: AudioBackend = self
            .audio
            .backend
            .parse()
            .map_err(|e: String| CastError::config(e))?;

        let url = target_url.unwrap_or(&self.stream.url);
        let mut config = CaptureConfig::new(platform, url)
            .with_audio(self.audio.enabled)
            .with_quality(Quality::from_name(&self.video.quality))
            .with_framerate(self.video.framerate)
            .with_resolution(resolution)
            .with_bitrates(self.video.bitrate, self.audio.bitrate)
            .with_audio_backend(audio_backend);

        if !self.video.device.is_empty() {
            config = config.with_video_device(&self.video.device);
        }
        if !self.audio.device.is_empty() {
            config = config.with_audio_device(&self.audio.device);
        }

        Ok(config)
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# castkit configuration

[stream]
# RTMP destination including the stream key.
# Leave empty to be asked when the stream starts.
url = ""

[video]
# Capture resolution
resolution = "1280x720"

# Framerate (macOS captures at most 30 fps)
framerate = 30

# Video bitrate in kbps
bitrate = 2500

# Quality preset: fast, medium, slow, high
quality = "medium"

# Video input id (empty = default: "1" on macOS, ":0.0" on Linux)
# Run 'castkit list-devices' to see what is available.
device = ""

[audio]
# Capture audio
enabled = true

# Audio bitrate in kbps
bitrate = 128

# Audio input id (empty = default: "0" on macOS, "default" on Linux)
device = ""

# Linux audio backend: pulse, alsa
# castkit retries once with alsa/hw:0 if pulse fails to start.
backend = "pulse"

[encoder]
# ffmpeg binary name or absolute path
binary = "ffmpeg"

# Milliseconds ffmpeg must stay alive before the stream counts as running
startup_grace_ms = 500
"#
    .to_string()
}
