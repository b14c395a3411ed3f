//! Capture device and window discovery
//!
//! Runs the platform's enumeration commands and parses their text output:
//! - macOS: `ffmpeg -f avfoundation -list_devices true -i ""` (stderr)
//! - Linux: the X11 display plus `pactl list sources short`
//! - windows: `osascript` on macOS, `wmctrl -l` on Linux
//!
//! Discovery is advisory. A failing command is logged and yields nothing,
//! since device ids can always be given by hand.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::encoder::ENCODER_BINARY;
use crate::error::{CastError, Result};
use crate::types::{DeviceDescriptor, DeviceKind, Platform, WindowInfo};

const VIDEO_SECTION_HEADER: &str = "AVFoundation video devices:";
const AUDIO_SECTION_HEADER: &str = "AVFoundation audio devices:";

/// Case-insensitive keyword matches; the first matching row wins
const HINTS: &[(DeviceKind, &[&str], &str)] = &[
    (
        DeviceKind::Video,
        &["screen", "display", "capture"],
        "likely screen capture",
    ),
    (
        DeviceKind::Audio,
        &["built-in", "microphone"],
        "likely built-in microphone",
    ),
    (
        DeviceKind::Audio,
        &["blackhole", "soundflower", ".monitor"],
        "likely system audio capture",
    ),
];

/// Hint for a device name, if any keyword matches
pub fn hint_for(kind: DeviceKind, name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    HINTS
        .iter()
        .find(|(k, keywords, _)| *k == kind && keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(_, _, hint)| *hint)
}

/// Raw enumeration output, parsed on demand
///
/// Iterating never consumes the listing: every call to [`DeviceListing::iter`]
/// starts over from the first line.
#[derive(Debug, Clone, Default)]
pub struct DeviceListing {
    source: ListingSource,
}

#[derive(Debug, Clone, Default)]
enum ListingSource {
    #[default]
    Empty,
    AvFoundation(String),
    Linux {
        display: Option<String>,
        sources: String,
    },
}

impl DeviceListing {
    /// A listing with no devices
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap the stderr of an AVFoundation device listing
    pub fn from_avfoundation(output: impl Into<String>) -> Self {
        Self {
            source: ListingSource::AvFoundation(output.into()),
        }
    }

    /// Wrap an X11 display and the stdout of `pactl list sources short`
    pub fn from_linux(display: Option<String>, pactl_output: impl Into<String>) -> Self {
        Self {
            source: ListingSource::Linux {
                display,
                sources: pactl_output.into(),
            },
        }
    }

    /// Iterate over the discovered devices
    pub fn iter(&self) -> Box<dyn Iterator<Item = DeviceDescriptor> + '_> {
        match &self.source {
            ListingSource::Empty => Box::new(std::iter::empty()),
            ListingSource::AvFoundation(output) => Box::new(AvFoundationDevices::new(output)),
            ListingSource::Linux { display, sources } => {
                let display = display.as_ref().map(|d| DeviceDescriptor {
                    index: 0,
                    name: d.clone(),
                    kind: DeviceKind::Video,
                    hint: Some("X11 display".to_string()),
                });
                Box::new(display.into_iter().chain(PulseSources::new(sources)))
            }
        }
    }

    /// Devices of one kind
    pub fn of_kind(&self, kind: DeviceKind) -> impl Iterator<Item = DeviceDescriptor> + '_ {
        self.iter().filter(move |d| d.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl<'a> IntoIterator for &'a DeviceListing {
    type Item = DeviceDescriptor;
    type IntoIter = Box<dyn Iterator<Item = DeviceDescriptor> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Preamble,
    Video,
    Audio,
}

/// Line parser for AVFoundation listings
struct AvFoundationDevices<'a> {
    lines: std::str::Lines<'a>,
    section: Section,
}

impl<'a> AvFoundationDevices<'a> {
    fn new(output: &'a str) -> Self {
        Self {
            lines: output.lines(),
            section: Section::Preamble,
        }
    }
}

impl Iterator for AvFoundationDevices<'_> {
    type Item = DeviceDescriptor;

    fn next(&mut self) -> Option<DeviceDescriptor> {
        loop {
            let line = self.lines.next()?;

            if line.contains(VIDEO_SECTION_HEADER) {
                self.section = Section::Video;
                continue;
            }
            if line.contains(AUDIO_SECTION_HEADER) {
                self.section = Section::Audio;
                continue;
            }

            let kind = match self.section {
                Section::Preamble => continue,
                Section::Video => DeviceKind::Video,
                Section::Audio => DeviceKind::Audio,
            };

            if let Some((index, name)) = parse_indexed_entry(line) {
                return Some(descriptor(kind, index, name));
            }
        }
    }
}

/// Line parser for `pactl list sources short`
struct PulseSources<'a> {
    lines: std::str::Lines<'a>,
}

impl<'a> PulseSources<'a> {
    fn new(output: &'a str) -> Self {
        Self {
            lines: output.lines(),
        }
    }
}

impl Iterator for PulseSources<'_> {
    type Item = DeviceDescriptor;

    fn next(&mut self) -> Option<DeviceDescriptor> {
        loop {
            let line = self.lines.next()?;
            let mut fields = line.split_whitespace();
            let (Some(index), Some(name)) = (fields.next(), fields.next()) else {
                continue;
            };
            if let Ok(index) = index.parse() {
                return Some(descriptor(DeviceKind::Audio, index, name));
            }
        }
    }
}

fn descriptor(kind: DeviceKind, index: u32, name: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        index,
        name: name.to_string(),
        kind,
        hint: hint_for(kind, name).map(str::to_string),
    }
}

/// Find the first `[N] name` pair in a line
///
/// AVFoundation lines look like
/// `[AVFoundation indev @ 0x7f8b] [1] Capture screen 0`, so bracket groups
/// that are not purely numeric are skipped.
fn parse_indexed_entry(line: &str) -> Option<(u32, &str)> {
    for (start, _) in line.match_indices('[') {
        let rest = &line[start + 1..];
        let digits_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits_len == 0 || !rest[digits_len..].starts_with(']') {
            continue;
        }
        let Ok(index) = rest[..digits_len].parse() else {
            continue;
        };
        let name = rest[digits_len + 1..].trim();
        if !name.is_empty() {
            return Some((index, name));
        }
    }
    None
}

/// Parse `wmctrl -l` output (`0x03a00007  0 host Title words`)
pub fn parse_wmctrl(output: &str) -> Vec<WindowInfo> {
    output
        .lines()
        .filter_map(|line| {
            let (id, rest) = split_column(line)?;
            let (_desktop, rest) = split_column(rest)?;
            let (_host, title) = split_column(rest)?;
            let title = title.trim();
            (!title.is_empty()).then(|| WindowInfo {
                id: id.to_string(),
                title: title.to_string(),
            })
        })
        .collect()
}

fn split_column(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    let end = s.find(char::is_whitespace)?;
    Some((&s[..end], s[end..].trim_start()))
}

/// Parse the comma-separated application list printed by osascript
pub fn parse_osascript(output: &str) -> Vec<WindowInfo> {
    output
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| WindowInfo {
            id: String::new(),
            title: name.to_string(),
        })
        .collect()
}

struct ListingOutput {
    stdout: String,
    stderr: String,
}

/// Run an enumeration command
///
/// With `require_success` a non-zero exit is an error; AVFoundation listings
/// always exit non-zero because the dummy input cannot be opened.
async fn run_listing(program: &str, args: &[&str], require_success: bool) -> Result<ListingOutput> {
    debug!("Running {} {:?}", program, args);
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| CastError::discovery(format!("{} could not be run: {}", program, e)))?;

    if require_success && !output.status.success() {
        return Err(CastError::discovery(format!(
            "{} exited with {}",
            program, output.status
        )));
    }

    Ok(ListingOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Discover capture devices using the default encoder binary
pub async fn discover(platform: Platform) -> DeviceListing {
    discover_with(platform, ENCODER_BINARY).await
}

/// Discover capture devices, listing AVFoundation devices through `encoder`
pub async fn discover_with(platform: Platform, encoder: &str) -> DeviceListing {
    match platform {
        Platform::MacOs => {
            let args = ["-f", "avfoundation", "-list_devices", "true", "-i", ""];
            match run_listing(encoder, &args, false).await {
                Ok(output) => DeviceListing::from_avfoundation(output.stderr),
                Err(e) => {
                    warn!("{}", e);
                    DeviceListing::empty()
                }
            }
        }
        Platform::Linux => {
            let display = Some(platform.default_video_device().to_string());
            match run_listing("pactl", &["list", "sources", "short"], true).await {
                Ok(output) => DeviceListing::from_linux(display, output.stdout),
                Err(e) => {
                    warn!("{}. Default audio device will be used.", e);
                    DeviceListing::from_linux(display, "")
                }
            }
        }
    }
}

/// List windows (or foreground applications on macOS) for window capture
pub async fn list_windows(platform: Platform) -> Vec<WindowInfo> {
    let result = match platform {
        Platform::MacOs => run_listing(
            "osascript",
            &[
                "-e",
                "tell application \"System Events\" to get name of (processes where background only is false)",
            ],
            true,
        )
        .await
        .map(|o| parse_osascript(&o.stdout)),
        Platform::Linux => run_listing("wmctrl", &["-l"], true)
            .await
            .map(|o| parse_wmctrl(&o.stdout)),
    };

    result.unwrap_or_else(|e| {
        warn!("Could not list windows: {}", e);
        Vec::new()
    })
}
