//! External encoder (ffmpeg) invocation
//!
//! castkit never touches media itself: it builds an ffmpeg command line and
//! supervises the resulting process.

pub mod args;
pub mod process;

pub use args::build;
pub use process::{
    Launcher, OutputStream, ProcessDriver, ProcessEvent, ProcessHandle, SystemLauncher,
};

/// Default encoder binary, looked up on PATH
pub const ENCODER_BINARY: &str = "ffmpeg";
