//! castkit Core Library
//!
//! Screen capture to RTMP streaming for macOS and Linux, driven through an
//! external ffmpeg process.
//!
//! This library provides:
//! - Capture device discovery (AVFoundation, X11 + PulseAudio)
//! - Encoder command line construction for both platforms
//! - A supervised stream session with a one-shot ALSA fallback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────┐    ┌─────────────────┐
//! │ CaptureConfig   │───▶│ encoder::    │───▶│ SessionManager  │───▶ ffmpeg ───▶ RTMP
//! │ (+ discovery)   │    │ build (args) │    │ (Launcher)      │
//! └─────────────────┘    └──────────────┘    └─────────────────┘
//! ```

pub mod config;
pub mod discovery;
pub mod encoder;
pub mod error;
pub mod preflight;
pub mod session;
pub mod types;

pub use config::{AudioBackend, CaptureConfig, CaptureMode, ConfigFile, Quality};
pub use discovery::{discover, list_windows, DeviceListing};
pub use encoder::{Launcher, ProcessEvent, SystemLauncher};
pub use error::{CastError, Result};
pub use session::{SessionManager, SessionState};
pub use types::{DeviceDescriptor, DeviceKind, Handle, Platform, Resolution, WindowInfo};
