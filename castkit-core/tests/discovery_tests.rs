//! Integration tests for device and window discovery

use castkit_core::discovery::{self, parse_osascript, parse_wmctrl, DeviceListing};
use castkit_core::types::{DeviceKind, Platform};

const AVFOUNDATION_LISTING: &str = "\
ffmpeg version 6.1.1 Copyright (c) 2000-2023 the FFmpeg developers
  built with Apple clang version 15.0.0 (clang-1500.1.0.2.5)
[AVFoundation indev @ 0x7f9a1c004a80] AVFoundation video devices:
[AVFoundation indev @ 0x7f9a1c004a80] [0] FaceTime HD Camera
[AVFoundation indev @ 0x7f9a1c004a80] [1] Capture screen 0
[AVFoundation indev @ 0x7f9a1c004a80] [2] Capture screen 1
[AVFoundation indev @ 0x7f9a1c004a80] AVFoundation audio devices:
[AVFoundation indev @ 0x7f9a1c004a80] [0] MacBook Pro Microphone
[AVFoundation indev @ 0x7f9a1c004a80] [1] BlackHole 2ch
[AVFoundation indev @ 0x7f9a1c004a80] [2] ZoomAudioDevice
[in#0 @ 0x600003b0c000] Error opening input: Input/output error
Error opening input file .
";

#[test]
fn test_avfoundation_listing() {
    let listing = DeviceListing::from_avfoundation(AVFOUNDATION_LISTING);
    let devices: Vec<_> = listing.iter().collect();

    assert_eq!(devices.len(), 6);

    let video: Vec<_> = listing.of_kind(DeviceKind::Video).collect();
    assert_eq!(video.len(), 3);
    assert_eq!(video[0].name, "FaceTime HD Camera");
    assert_eq!(video[0].hint, None);
    assert_eq!(video[1].index, 1);
    assert_eq!(video[1].hint.as_deref(), Some("likely screen capture"));

    let audio: Vec<_> = listing.of_kind(DeviceKind::Audio).collect();
    assert_eq!(audio.len(), 3);
    assert_eq!(audio[0].hint.as_deref(), Some("likely built-in microphone"));
    assert_eq!(audio[1].name, "BlackHole 2ch");
    assert_eq!(audio[1].hint.as_deref(), Some("likely system audio capture"));
    assert_eq!(audio[2].hint, None);
}

#[test]
fn test_malformed_output_is_empty() {
    let garbage = "ffmpeg: command not found\n[0] not a device\nrandom text";
    let listing = DeviceListing::from_avfoundation(garbage);

    assert!(listing.is_empty());
    assert_eq!(listing.iter().count(), 0);
    assert!(DeviceListing::from_avfoundation("").is_empty());
}

#[test]
fn test_listing_is_restartable() {
    let listing = DeviceListing::from_avfoundation(AVFOUNDATION_LISTING);

    let first: Vec<_> = listing.iter().collect();
    let partial: Vec<_> = listing.iter().take(2).collect();
    let second: Vec<_> = (&listing).into_iter().collect();

    assert_eq!(first, second);
    assert_eq!(&first[..2], &partial[..]);
}

#[test]
fn test_window_parsers() {
    let windows = parse_wmctrl("0x01e00003  0 workstation Mozilla Firefox\n0x02400004  1 workstation  \n");
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].id, "0x01e00003");
    assert_eq!(windows[0].title, "Mozilla Firefox");

    let apps = parse_osascript("Finder, Safari, Electron\n");
    let titles: Vec<_> = apps.iter().map(|w| w.title.as_str()).collect();
    assert_eq!(titles, ["Finder", "Safari", "Electron"]);

    assert!(parse_wmctrl("").is_empty());
    assert!(parse_osascript("  \n").is_empty());
}

#[test]
fn test_discovery_failure_degrades_to_empty() {
    let listing = tokio_test::block_on(discovery::discover_with(
        Platform::MacOs,
        "castkit-no-such-encoder",
    ));
    assert!(listing.is_empty());
}
