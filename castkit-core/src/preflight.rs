//! Dependency checks run before streaming
//!
//! These are advisory: the session manager never calls them, the CLI decides
//! whether a failed check aborts.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{CastError, Result};
use crate::types::Platform;

/// Check the platform's capture prerequisites
///
/// macOS always passes (AVFoundation ships with the OS). Linux needs an X11
/// display for x11grab.
pub fn check_dependencies(platform: Platform) -> bool {
    check_display(platform, std::env::var("DISPLAY").ok().as_deref())
}

fn check_display(platform: Platform, display: Option<&str>) -> bool {
    match platform {
        Platform::MacOs => {
            info!("macOS detected - AVFoundation will be used");
            true
        }
        Platform::Linux => match display {
            Some(name) if !name.is_empty() => {
                debug!("X11 display {} available", name);
                true
            }
            _ => {
                warn!("No DISPLAY environment variable found. Make sure X11 is running.");
                false
            }
        },
    }
}

/// Check that the encoder binary runs (`<binary> -version` exits with 0)
pub async fn check_encoder_available(binary: &str) -> bool {
    let status = Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => true,
        Ok(status) => {
            warn!("{} -version exited with {}", binary, status);
            false
        }
        Err(e) => {
            warn!("{} is not available: {}", binary, e);
            false
        }
    }
}

/// Run both checks, turning a failure into `DependencyMissing`
pub async fn require_dependencies(platform: Platform, binary: &str) -> Result<()> {
    if !check_dependencies(platform) {
        return Err(CastError::dependency(
            "DISPLAY is not set; x11grab needs a running X11 session",
        ));
    }
    if !check_encoder_available(binary).await {
        return Err(CastError::dependency(format!(
            "{} is not installed or not in PATH",
            binary
        )));
    }
    Ok(())
}

/// Install instructions for the encoder on this platform
pub fn install_hint(platform: Platform) -> &'static str {
    match platform {
        Platform::MacOs => "brew install ffmpeg",
        Platform::Linux => "sudo apt update && sudo apt install ffmpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macos_always_passes() {
        assert!(check_display(Platform::MacOs, None));
    }

    #[test]
    fn test_linux_needs_display() {
        assert!(check_display(Platform::Linux, Some(":0")));
        assert!(!check_display(Platform::Linux, None));
        assert!(!check_display(Platform::Linux, Some("")));
    }

    #[tokio::test]
    async fn test_missing_encoder_is_unavailable() {
        assert!(!check_encoder_available("castkit-no-such-encoder").await);
    }

    #[tokio::test]
    async fn test_require_reports_missing_encoder() {
        let err = require_dependencies(Platform::MacOs, "castkit-no-such-encoder")
            .await
            .unwrap_err();
        assert!(matches!(err, CastError::DependencyMissing(_)));
    }
}
