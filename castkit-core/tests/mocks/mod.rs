//! Mock infrastructure for testing
//!
//! Provides a scripted [`Launcher`] so session tests never spawn ffmpeg.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use castkit_core::encoder::{Launcher, OutputStream, ProcessEvent, ProcessHandle};

/// Exit code ffmpeg reports after a SIGINT
pub const INTERRUPTED_EXIT_CODE: i32 = 255;

/// What a mocked encoder does once launched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Spawning fails outright
    FailToSpawn,
    /// Prints an error and exits immediately
    ExitOnStart(Option<i32>),
    /// Prints a progress line and runs until interrupted
    RunUntilInterrupted,
    /// Runs for a while, then exits on its own
    ExitAfter(Duration, Option<i32>),
    /// Runs for a while, then loses supervision
    ErrorAfter(Duration),
    /// Runs until interrupted, then loses supervision instead of exiting
    ErrorOnInterrupt,
}

/// Message carried by the mocked supervision errors
pub const SUPERVISION_ERROR: &str = "Failed to wait for encoder: mock wait failure";

/// Launcher that plays back a script of behaviors, one per launch
///
/// Once the script runs out every further launch uses the fallback behavior.
pub struct MockLauncher {
    script: Mutex<VecDeque<Behavior>>,
    fallback: Behavior,
    launches: Mutex<Vec<(String, Vec<String>)>>,
}

impl MockLauncher {
    /// Every launch behaves the same
    pub fn always(behavior: Behavior) -> Self {
        Self::scripted(Vec::new(), behavior)
    }

    /// Launches follow `script`, then `fallback`
    pub fn scripted(script: Vec<Behavior>, fallback: Behavior) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            launches: Mutex::new(Vec::new()),
        }
    }

    /// Number of launch attempts so far
    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    /// Arguments of every launch attempt, in order
    pub fn launched_args(&self) -> Vec<Vec<String>> {
        self.launches
            .lock()
            .unwrap()
            .iter()
            .map(|(_, args)| args.clone())
            .collect()
    }

    /// Program of the most recent launch attempt
    pub fn last_program(&self) -> Option<String> {
        self.launches
            .lock()
            .unwrap()
            .last()
            .map(|(program, _)| program.clone())
    }
}

impl Launcher for MockLauncher {
    fn launch(&self, program: &str, args: &[String]) -> io::Result<ProcessHandle> {
        self.launches
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));
        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        match behavior {
            Behavior::FailToSpawn => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "mock encoder not found",
            )),
            Behavior::ExitOnStart(code) => {
                let (handle, driver) = ProcessHandle::channel(Some(1000));
                driver.emit(stderr_line("Unknown input format: 'pulse'"));
                driver.emit(ProcessEvent::Exited { code });
                Ok(handle)
            }
            Behavior::RunUntilInterrupted => {
                let (handle, mut driver) = ProcessHandle::channel(Some(1001));
                driver.emit(stderr_line("frame=    1 fps=0.0 q=0.0 size=0kB"));
                tokio::spawn(async move {
                    if driver.interrupted().await.is_some() {
                        driver.emit(stderr_line("Exiting normally, received signal 2."));
                        driver.emit(ProcessEvent::Exited {
                            code: Some(INTERRUPTED_EXIT_CODE),
                        });
                    }
                });
                Ok(handle)
            }
            Behavior::ExitAfter(delay, code) => {
                let (handle, driver) = ProcessHandle::channel(Some(1002));
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    driver.emit(stderr_line("Connection to tcp://x:1935 failed"));
                    driver.emit(ProcessEvent::Exited { code });
                });
                Ok(handle)
            }
            Behavior::ErrorAfter(delay) => {
                let (handle, driver) = ProcessHandle::channel(Some(1003));
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    driver.emit(ProcessEvent::Error(SUPERVISION_ERROR.to_string()));
                });
                Ok(handle)
            }
            Behavior::ErrorOnInterrupt => {
                let (handle, mut driver) = ProcessHandle::channel(Some(1004));
                tokio::spawn(async move {
                    if driver.interrupted().await.is_some() {
                        driver.emit(ProcessEvent::Error(SUPERVISION_ERROR.to_string()));
                    }
                });
                Ok(handle)
            }
        }
    }
}

fn stderr_line(line: &str) -> ProcessEvent {
    ProcessEvent::Output {
        stream: OutputStream::Stderr,
        line: line.to_string(),
    }
}

/// Whether `args` contains `flag` immediately followed by `value`
pub fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
    args.windows(2).any(|w| w[0] == flag && w[1] == value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_pair() {
        let args = vec!["-f".to_string(), "alsa".to_string(), "-i".to_string()];
        assert!(has_pair(&args, "-f", "alsa"));
        assert!(!has_pair(&args, "alsa", "-f"));
        assert!(!has_pair(&args, "-i", "hw:0"));
    }

    #[tokio::test]
    async fn test_fail_to_spawn() {
        let launcher = MockLauncher::always(Behavior::FailToSpawn);
        assert!(launcher.launch("ffmpeg", &[]).is_err());
        assert_eq!(launcher.launch_count(), 1);
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let launcher = MockLauncher::scripted(
            vec![Behavior::ExitOnStart(Some(1))],
            Behavior::FailToSpawn,
        );
        let mut handle = launcher.launch("ffmpeg", &[]).unwrap();
        assert!(matches!(handle.recv().await, Some(ProcessEvent::Output { .. })));
        assert_eq!(
            handle.recv().await,
            Some(ProcessEvent::Exited { code: Some(1) })
        );
        assert!(launcher.launch("ffmpeg", &[]).is_err());
    }

    #[tokio::test]
    async fn test_error_after_delay() {
        let launcher = MockLauncher::always(Behavior::ErrorAfter(Duration::from_millis(10)));
        let mut handle = launcher.launch("ffmpeg", &[]).unwrap();
        let event = handle.recv().await.unwrap();
        assert!(event.is_terminal());
        assert_eq!(event, ProcessEvent::Error(SUPERVISION_ERROR.to_string()));
    }
}
