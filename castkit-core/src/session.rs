//! Stream session lifecycle
//!
//! The [`SessionManager`] owns at most one encoder process at a time and
//! drives the state machine
//!
//! ```text
//! Idle ──start──▶ Starting ──alive──▶ Running ──stop──▶ Stopping ──exit──▶ Exited
//!                    │                   │
//!                    └──launch error──▶ Failed ◀──process error──┘
//! ```
//!
//! Process events are not pushed into the manager: the caller consumes them
//! with [`SessionManager::next_event`] or [`SessionManager::poll_events`],
//! and each consumed event advances the state.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::CaptureConfig;
use crate::encoder::{self, Launcher, OutputStream, ProcessEvent, ProcessHandle, SystemLauncher};
use crate::error::{CastError, Result};
use crate::types::{mask_url, Handle};

/// Default time the encoder must survive before the session counts as running
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_millis(500);

/// Session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No session has been started
    Idle,
    /// Encoder spawned, waiting to see it stay alive
    Starting,
    /// Encoder running
    Running,
    /// Interrupt sent, waiting for the encoder to exit
    Stopping,
    /// Encoder exited with the given code (`None` = killed by a signal)
    Exited(Option<i32>),
    /// Encoder could not be started or supervised
    Failed(String),
}

impl SessionState {
    /// Whether a session currently owns an encoder process
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running | Self::Stopping)
    }

    /// Whether the state is final for the current session
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited(_) | Self::Failed(_))
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Exited(Some(code)) => write!(f, "exited ({})", code),
            Self::Exited(None) => write!(f, "exited (signal)"),
            Self::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// One encoder run
pub struct Session {
    handle: Handle,
    config: CaptureConfig,
    args: Vec<String>,
    process: ProcessHandle,
    /// Events observed during the startup probe, not yet handed out
    pending: VecDeque<ProcessEvent>,
}

impl Session {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Configuration the encoder was actually started with
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Arguments passed to the encoder
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// OS process id of the encoder
    pub fn pid(&self) -> Option<u32> {
        self.process.pid()
    }

    fn next_queued(&mut self) -> Option<ProcessEvent> {
        self.pending.pop_front().or_else(|| self.process.try_recv())
    }
}

/// Manages the single stream session
pub struct SessionManager {
    launcher: Arc<dyn Launcher>,
    encoder: String,
    startup_grace: Duration,
    state: SessionState,
    session: Option<Session>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    /// Create a manager that spawns the system ffmpeg
    pub fn new() -> Self {
        Self::with_launcher(Arc::new(SystemLauncher))
    }

    /// Create a manager with a custom process launcher
    pub fn with_launcher(launcher: Arc<dyn Launcher>) -> Self {
        Self {
            launcher,
            encoder: encoder::ENCODER_BINARY.to_string(),
            startup_grace: DEFAULT_STARTUP_GRACE,
            state: SessionState::Idle,
            session: None,
        }
    }

    /// Use a different encoder binary
    pub fn with_encoder(mut self, binary: impl Into<String>) -> Self {
        self.encoder = binary.into();
        self
    }

    /// Set how long a fresh encoder must stay alive to count as running
    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// Current state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether a session is starting, running or stopping
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// The current (or most recent) session
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Start streaming
    ///
    /// Fails with `AlreadyRunning` while a session is active and with
    /// `InvalidConfiguration` for a bad config; neither changes the state.
    /// A launch failure on Linux with audio is retried once with ALSA before
    /// the session is marked failed.
    pub async fn start(&mut self, config: CaptureConfig) -> Result<Handle> {
        if self.state.is_active() {
            warn!("Start requested while a stream is {}", self.state);
            return Err(CastError::AlreadyRunning);
        }

        let args = encoder::build(&config)?;

        let result = match self.launch(config.clone(), args).await {
            Err(e) if e.is_launch_failure() && config.alsa_fallback_eligible() => {
                warn!("{}. Retrying with ALSA audio", e);
                let fallback = config.alsa_fallback();
                match encoder::build(&fallback) {
                    Ok(args) => self.launch(fallback, args).await,
                    Err(e) => Err(e),
                }
            }
            other => other,
        };

        match result {
            Ok(session) => {
                let handle = session.handle;
                info!(
                    "Streaming started to {} ({})",
                    mask_url(&session.config.target_url),
                    handle
                );
                self.session = Some(session);
                self.state = SessionState::Running;
                Ok(handle)
            }
            Err(e) => {
                error!("Failed to start stream: {}", e);
                self.session = None;
                self.state = SessionState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Spawn the encoder and wait out the startup grace period
    async fn launch(&mut self, config: CaptureConfig, args: Vec<String>) -> Result<Session> {
        self.state = SessionState::Starting;
        info!("Starting {} with args: {}", self.encoder, display_args(&args));

        let mut process = self
            .launcher
            .launch(&self.encoder, &args)
            .map_err(|e| CastError::launch(format!("failed to spawn {}: {}", self.encoder, e)))?;

        let mut pending = VecDeque::new();
        let mut last_line: Option<String> = None;
        let grace = tokio::time::sleep(self.startup_grace);
        tokio::pin!(grace);

        loop {
            tokio::select! {
                _ = &mut grace => break,
                event = process.recv() => match event {
                    Some(ProcessEvent::Output { stream, line }) => {
                        last_line = Some(line.clone());
                        pending.push_back(ProcessEvent::Output { stream, line });
                    }
                    Some(ProcessEvent::Exited { code }) => {
                        return Err(CastError::launch(format!(
                            "{} exited during startup with code {}{}",
                            self.encoder,
                            code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string()),
                            last_line.map(|l| format!(" ({})", l)).unwrap_or_default()
                        )));
                    }
                    Some(ProcessEvent::Error(msg)) => return Err(CastError::launch(msg)),
                    None => {
                        return Err(CastError::launch(format!(
                            "{} supervisor ended during startup",
                            self.encoder
                        )));
                    }
                },
            }
        }

        debug!("Encoder alive after {:?}", self.startup_grace);
        Ok(Session {
            handle: Handle::new(),
            config,
            args,
            process,
            pending,
        })
    }

    /// Stop streaming
    ///
    /// Sends SIGINT and waits, without a deadline, for the encoder to exit.
    /// Does nothing unless a session is starting or running.
    pub async fn stop(&mut self) -> Result<()> {
        if !matches!(self.state, SessionState::Starting | SessionState::Running) {
            debug!("Stop requested while {}, nothing to do", self.state);
            return Ok(());
        }
        let Some(session) = self.session.as_ref() else {
            self.state = SessionState::Idle;
            return Ok(());
        };

        info!("Stopping stream ({})", session.handle);
        if !session.process.interrupt() {
            debug!("Encoder supervisor already finished");
        }
        self.state = SessionState::Stopping;

        while self.state == SessionState::Stopping {
            if self.next_event().await.is_none() {
                warn!("Encoder supervisor ended without an exit status");
                self.state = SessionState::Exited(None);
            }
        }

        info!("Stream stopped: {}", self.state);
        Ok(())
    }

    /// Wait for the next encoder event and apply it
    ///
    /// Returns `None` when there is no session or its process has finished
    /// reporting.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        let session = self.session.as_mut()?;
        let event = match session.pending.pop_front() {
            Some(event) => event,
            None => session.process.recv().await?,
        };
        self.apply(&event);
        Some(event)
    }

    /// Apply every event that is already queued, without waiting
    pub fn poll_events(&mut self) -> Vec<ProcessEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.session.as_mut().and_then(Session::next_queued) {
            self.apply(&event);
            events.push(event);
        }
        events
    }

    /// Wait until the current session reaches a terminal state
    pub async fn wait(&mut self) -> SessionState {
        while self.state.is_active() {
            if self.next_event().await.is_none() {
                self.state = SessionState::Exited(None);
            }
        }
        self.state.clone()
    }

    fn apply(&mut self, event: &ProcessEvent) {
        match event {
            ProcessEvent::Output { stream, line } => log_output(*stream, line),
            ProcessEvent::Exited { code } => {
                let requested = self.state == SessionState::Stopping;
                match code {
                    Some(0) => info!("Encoder exited normally"),
                    _ if requested => info!("Encoder stopped with code {:?}", code),
                    Some(code) => warn!("Encoder exited with code {}", code),
                    None => warn!("Encoder was terminated by a signal"),
                }
                self.state = SessionState::Exited(*code);
            }
            ProcessEvent::Error(msg) => {
                error!("Encoder error: {}", msg);
                self.state = SessionState::Failed(msg.clone());
            }
        }
    }
}

fn log_output(stream: OutputStream, line: &str) {
    debug!("[ffmpeg {}] {}", stream, line);
}

fn display_args(args: &[String]) -> String {
    args.iter()
        .map(|a| if a.contains("://") { mask_url(a) } else { a.clone() })
        .collect::<Vec<_>>()
        .join(" ")
}
