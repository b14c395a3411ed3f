//! Encoder process supervision
//!
//! Each spawned encoder gets one supervisor task that owns the child,
//! forwards its output line by line, relays interrupt requests and finally
//! reports how the process ended. Everything the supervisor observes goes
//! through a single channel, so events of one process are strictly ordered
//! and the last event is always `Exited` or `Error`.

use std::io;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Which pipe a line of output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Something that happened to an encoder process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A line written by the process
    Output { stream: OutputStream, line: String },
    /// The process exited; `None` when it was killed by a signal
    Exited { code: Option<i32> },
    /// The process could not be supervised any further
    Error(String),
}

impl ProcessEvent {
    /// Whether no further events follow this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited { .. } | Self::Error(_))
    }
}

/// Caller side of a running encoder process
pub struct ProcessHandle {
    pid: Option<u32>,
    events: mpsc::UnboundedReceiver<ProcessEvent>,
    interrupts: mpsc::UnboundedSender<()>,
}

/// Supervisor side of a running encoder process
pub struct ProcessDriver {
    events: mpsc::UnboundedSender<ProcessEvent>,
    interrupts: mpsc::UnboundedReceiver<()>,
}

impl ProcessHandle {
    /// Create a connected handle/driver pair
    pub fn channel(pid: Option<u32>) -> (Self, ProcessDriver) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (interrupts_tx, interrupts_rx) = mpsc::unbounded_channel();
        (
            Self {
                pid,
                events: events_rx,
                interrupts: interrupts_tx,
            },
            ProcessDriver {
                events: events_tx,
                interrupts: interrupts_rx,
            },
        )
    }

    /// OS process id, if known
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Ask the process to shut down gracefully
    ///
    /// Returns false when the supervisor is already gone.
    pub fn interrupt(&self) -> bool {
        self.interrupts.send(()).is_ok()
    }

    /// Wait for the next event; `None` once the supervisor has finished
    pub async fn recv(&mut self) -> Option<ProcessEvent> {
        self.events.recv().await
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&mut self) -> Option<ProcessEvent> {
        self.events.try_recv().ok()
    }
}

impl ProcessDriver {
    /// Publish an event; returns false when the handle was dropped
    pub fn emit(&self, event: ProcessEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Wait for an interrupt request; `None` when the handle was dropped
    pub async fn interrupted(&mut self) -> Option<()> {
        self.interrupts.recv().await
    }
}

/// Starts encoder processes
///
/// The session manager only talks to this trait, so tests can substitute
/// processes that fail, exit or run on demand.
pub trait Launcher: Send + Sync {
    /// Spawn `program` with `args`; an error means the process never started
    fn launch(&self, program: &str, args: &[String]) -> io::Result<ProcessHandle>;
}

/// Launches real processes with tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&self, program: &str, args: &[String]) -> io::Result<ProcessHandle> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (handle, driver) = ProcessHandle::channel(child.id());
        debug!("Spawned {} (pid {:?})", program, handle.pid());
        tokio::spawn(supervise(child, driver));
        Ok(handle)
    }
}

/// Splits a byte stream into lines ending in `\n` or `\r`
///
/// ffmpeg redraws its progress line with a bare carriage return, so
/// splitting on newlines alone would hold back all progress until exit.
pub struct OutputLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> OutputLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator; `None` at end of stream
    ///
    /// Cancel safe: a partial line stays buffered for the next call.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_line()));
            }

            match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(end) => {
                    self.buf.extend_from_slice(&available[..end]);
                    self.reader.consume(end + 1);
                    return Ok(Some(self.take_line()));
                }
                None => {
                    let len = available.len();
                    self.buf.extend_from_slice(available);
                    self.reader.consume(len);
                }
            }
        }
    }

    fn take_line(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        line
    }
}

type LineReader<R> = Option<OutputLines<R>>;

async fn next_line<R: AsyncRead + Unpin>(lines: &mut LineReader<R>) -> io::Result<Option<String>> {
    match lines.as_mut() {
        Some(lines) => lines.next_line().await,
        None => Ok(None),
    }
}

async fn supervise(mut child: Child, mut driver: ProcessDriver) {
    let pid = child.id();
    let mut stdout = child.stdout.take().map(OutputLines::new);
    let mut stderr = child.stderr.take().map(OutputLines::new);
    let mut stdout_open = stdout.is_some();
    let mut stderr_open = stderr.is_some();
    let mut interrupts_open = true;

    let status = loop {
        tokio::select! {
            line = next_line(&mut stdout), if stdout_open => {
                match line {
                    Ok(Some(line)) => forward(&driver, OutputStream::Stdout, line),
                    _ => stdout_open = false,
                }
            }
            line = next_line(&mut stderr), if stderr_open => {
                match line {
                    Ok(Some(line)) => forward(&driver, OutputStream::Stderr, line),
                    _ => stderr_open = false,
                }
            }
            request = driver.interrupted(), if interrupts_open => {
                match request {
                    Some(()) => send_interrupt(pid),
                    None => interrupts_open = false,
                }
            }
            status = child.wait() => break status,
        }
    };

    // Drain whatever the process wrote before exiting
    while stdout_open {
        match next_line(&mut stdout).await {
            Ok(Some(line)) => forward(&driver, OutputStream::Stdout, line),
            _ => stdout_open = false,
        }
    }
    while stderr_open {
        match next_line(&mut stderr).await {
            Ok(Some(line)) => forward(&driver, OutputStream::Stderr, line),
            _ => stderr_open = false,
        }
    }

    let event = match status {
        Ok(status) => ProcessEvent::Exited {
            code: status.code(),
        },
        Err(e) => ProcessEvent::Error(format!("Failed to wait for encoder: {}", e)),
    };
    trace!("Encoder supervisor finished: {:?}", event);
    driver.emit(event);
}

fn forward(driver: &ProcessDriver, stream: OutputStream, line: String) {
    if !line.is_empty() {
        driver.emit(ProcessEvent::Output { stream, line });
    }
}

fn send_interrupt(pid: Option<u32>) {
    let Some(pid) = pid else {
        warn!("Encoder has no pid, cannot interrupt");
        return;
    };

    debug!("Sending SIGINT to encoder (pid {})", pid);
    // SAFETY: kill(2) has no memory-safety preconditions; the pid belongs to
    // a child we have not reaped yet, so it cannot have been recycled.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
    if rc != 0 {
        warn!(
            "Failed to interrupt encoder (pid {}): {}",
            pid,
            io::Error::last_os_error()
        );
    }
}
