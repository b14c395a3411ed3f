//! Error types for castkit

use thiserror::Error;

/// Result type alias using CastError
pub type Result<T> = std::result::Result<T, CastError>;

/// Main error type for castkit operations
#[derive(Debug, Error)]
pub enum CastError {
    /// A session is already starting, running or stopping
    #[error("Stream session already running")]
    AlreadyRunning,

    /// Malformed capture configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Preflight check failed
    #[error("Missing dependency: {0}")]
    DependencyMissing(String),

    /// Encoder process could not be spawned or died during startup
    #[error("Encoder launch failed: {0}")]
    EncoderLaunch(String),

    /// Encoder process exited
    #[error("Encoder exited with code {}", .0.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    EncoderExit(Option<i32>),

    /// Device enumeration failed
    #[error("Device discovery failed: {0}")]
    Discovery(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unsupported host or operation
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CastError>,
    },
}

impl CastError {
    /// Create an invalid configuration error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a dependency error
    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::DependencyMissing(msg.into())
    }

    /// Create an encoder launch error
    pub fn launch(msg: impl Into<String>) -> Self {
        Self::EncoderLaunch(msg.into())
    }

    /// Create a discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping context wrappers
    pub fn root(&self) -> &CastError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error is an encoder launch failure (eligible for the audio fallback)
    pub fn is_launch_failure(&self) -> bool {
        matches!(self.root(), Self::EncoderLaunch(_))
    }

    /// A short suggestion the CLI can print next to the error
    pub fn user_hint(&self) -> Option<&'static str> {
        match self.root() {
            Self::AlreadyRunning => {
                Some("Stop the current stream first (Ctrl+C in the terminal running 'castkit cast')")
            }
            Self::InvalidConfiguration(_) => {
                Some("Check the cast flags or the [video]/[audio] sections of config.toml")
            }
            Self::DependencyMissing(_) => Some(
                "Install ffmpeg (brew install ffmpeg / sudo apt install ffmpeg) and make sure DISPLAY is set on Linux",
            ),
            Self::EncoderLaunch(_) => {
                Some("Run 'castkit check' to verify ffmpeg, then 'castkit list-devices' for device ids")
            }
            Self::Discovery(_) => Some("Device ids can still be given manually with --video-device/--audio-device"),
            Self::Config(_) => Some("Check ~/.config/castkit/config.toml or run 'castkit config init --force'"),
            _ => None,
        }
    }

    /// Whether the user can fix this without code changes
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self.root(),
            Self::AlreadyRunning
                | Self::InvalidConfiguration(_)
                | Self::DependencyMissing(_)
                | Self::Discovery(_)
                | Self::Config(_)
        )
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}
