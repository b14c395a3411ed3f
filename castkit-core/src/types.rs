//! Core types for castkit
//!
//! Platform, resolution and device descriptors shared by discovery, the
//! argument builder and the session manager.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{CastError, Result};

/// Global handle counter for unique session IDs
static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque handle for a stream session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Create a new unique handle
    pub fn new() -> Self {
        Self(HANDLE_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

/// Supported host kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// macOS, captured through AVFoundation
    MacOs,
    /// Linux, captured through x11grab with PulseAudio/ALSA audio
    Linux,
}

impl Platform {
    /// Detect the host platform
    pub fn current() -> Result<Self> {
        match std::env::consts::OS {
            "macos" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            other => Err(CastError::Unsupported(format!(
                "castkit only supports macOS and Linux (detected {})",
                other
            ))),
        }
    }

    /// Highest capture framerate the platform handles reliably
    pub fn max_framerate(&self) -> Option<u32> {
        match self {
            Self::MacOs => Some(30),
            Self::Linux => None,
        }
    }

    /// Default video input identifier
    pub fn default_video_device(&self) -> &'static str {
        match self {
            Self::MacOs => "1",
            Self::Linux => ":0.0",
        }
    }

    /// Default audio input identifier
    pub fn default_audio_device(&self) -> &'static str {
        match self {
            Self::MacOs => "0",
            Self::Linux => "default",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MacOs => write!(f, "macOS"),
            Self::Linux => write!(f, "Linux"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "macos" | "darwin" | "mac" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

/// Capture resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("Invalid resolution '{}', expected WIDTHxHEIGHT", s))?;
        let width = w
            .trim()
            .parse()
            .map_err(|_| format!("Invalid resolution width '{}'", w))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| format!("Invalid resolution height '{}'", h))?;
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for Resolution {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Resolution> for String {
    fn from(r: Resolution) -> Self {
        r.to_string()
    }
}

/// Parse a bitrate like "2500", "2500k" or "2500K" into kbps
pub fn parse_bitrate(s: &str) -> std::result::Result<u32, String> {
    let trimmed = s.trim();
    let digits = trimmed.strip_suffix(['k', 'K']).unwrap_or(trimmed);
    digits
        .parse::<u32>()
        .map_err(|_| format!("Invalid bitrate '{}', expected kbps like 2500k", s))
}

/// Mask the stream key in a URL for safe logging
pub fn mask_url(url: &str) -> String {
    // rtmp://server/app/stream_key -> rtmp://server/app/****
    if let Some(idx) = url.rfind('/') {
        let (base, key) = url.split_at(idx + 1);
        if !key.is_empty() && !key.contains(':') && base.matches('/').count() > 2 {
            return format!("{}****", base);
        }
    }
    url.to_string()
}

/// Kind of capture device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Video,
    Audio,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// A discovered capture device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Index as reported by the enumeration command
    pub index: u32,
    /// Human-readable name
    pub name: String,
    /// Video or audio
    pub kind: DeviceKind,
    /// What the device is probably for
    pub hint: Option<String>,
}

/// A window that could be targeted by window capture mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    /// Window manager identifier (empty when the lister has none)
    pub id: String,
    /// Window or application title
    pub title: String,
}
