//! Lifecycle handle for the sampler worker process.
//!
//! The sampler runs as a separate OS process in its own process group.
//! `SamplerController` owns the child and walks it through
//! `NotStarted -> Running -> Stopped`. Stopping sends SIGTERM, waits a
//! bounded grace period, then falls back to SIGKILL.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

/// Time a worker gets to exit after SIGTERM before it is killed.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(3);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Command line used to launch the worker.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// File receiving the worker's stderr; discarded when `None`.
    pub stderr: Option<PathBuf>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stderr: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn stderr_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr = Some(path.into());
        self
    }

    fn build(&self) -> std::io::Result<Command> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        match &self.stderr {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                cmd.stderr(Stdio::from(file));
            }
            None => {
                cmd.stderr(Stdio::null());
            }
        }
        configure_process_group(&mut cmd);
        Ok(cmd)
    }
}

/// Error type for worker control failures.
#[derive(Debug)]
pub enum WorkerError {
    /// The worker process could not be spawned.
    Spawn(std::io::Error),
    /// Signalling or reaping the worker failed.
    Signal(std::io::Error),
    /// `start` was called on a controller that already ran a worker.
    AlreadyStopped,
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::Spawn(e) => write!(f, "failed to start sampler worker: {}", e),
            WorkerError::Signal(e) => write!(f, "failed to stop sampler worker: {}", e),
            WorkerError::AlreadyStopped => write!(f, "sampler worker was already stopped"),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::Spawn(e) | WorkerError::Signal(e) => Some(e),
            WorkerError::AlreadyStopped => None,
        }
    }
}

/// Controller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    NotStarted,
    Running,
    Stopped,
}

/// How a `stop` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was running.
    NotRunning,
    /// The worker exited on its own or after SIGTERM.
    Exited(ExitStatus),
    /// The worker ignored SIGTERM for the whole grace period.
    Killed,
}

enum State {
    NotStarted,
    Running(Child),
    Stopped,
}

/// Single-use handle owning the sampler worker process.
pub struct SamplerController {
    command: WorkerCommand,
    grace: Duration,
    state: State,
}

impl SamplerController {
    pub fn new(command: WorkerCommand) -> Self {
        Self {
            command,
            grace: DEFAULT_GRACE,
            state: State::NotStarted,
        }
    }

    /// Overrides the SIGTERM grace period.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn state(&self) -> Lifecycle {
        match self.state {
            State::NotStarted => Lifecycle::NotStarted,
            State::Running(_) => Lifecycle::Running,
            State::Stopped => Lifecycle::Stopped,
        }
    }

    /// Worker pid while running.
    pub fn pid(&self) -> Option<u32> {
        match &self.state {
            State::Running(child) => Some(child.id()),
            _ => None,
        }
    }

    /// Spawns the worker. No-op when already running.
    pub fn start(&mut self) -> Result<(), WorkerError> {
        match self.state {
            State::Running(_) => return Ok(()),
            State::Stopped => return Err(WorkerError::AlreadyStopped),
            State::NotStarted => {}
        }

        let child = self
            .command
            .build()
            .and_then(|mut cmd| cmd.spawn())
            .map_err(WorkerError::Spawn)?;
        info!(
            pid = child.id(),
            "Started sampler worker {}",
            self.command.program.display()
        );
        self.state = State::Running(child);
        Ok(())
    }

    /// Checks whether a running worker has exited on its own.
    ///
    /// An exited worker is reaped and the controller moves to `Stopped`.
    pub fn poll(&mut self) -> Result<Option<ExitStatus>, WorkerError> {
        let State::Running(child) = &mut self.state else {
            return Ok(None);
        };
        match child.try_wait().map_err(WorkerError::Signal)? {
            Some(status) => {
                warn!("Sampler worker exited: {}", status);
                self.state = State::Stopped;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    /// Stops the worker and waits for it. No-op unless running.
    pub fn stop(&mut self) -> Result<StopOutcome, WorkerError> {
        let mut child = match std::mem::replace(&mut self.state, State::Stopped) {
            State::Running(child) => child,
            other => {
                self.state = other;
                return Ok(StopOutcome::NotRunning);
            }
        };

        if let Some(status) = child.try_wait().map_err(WorkerError::Signal)? {
            debug!("Sampler worker already exited: {}", status);
            return Ok(StopOutcome::Exited(status));
        }

        terminate(&child)?;

        let deadline = Instant::now() + self.grace;
        loop {
            if let Some(status) = child.try_wait().map_err(WorkerError::Signal)? {
                info!("Sampler worker stopped: {}", status);
                return Ok(StopOutcome::Exited(status));
            }
            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        warn!(
            "Sampler worker ignored SIGTERM for {:?}, killing",
            self.grace
        );
        kill(&mut child)?;
        child.wait().map_err(WorkerError::Signal)?;
        Ok(StopOutcome::Killed)
    }
}

impl Drop for SamplerController {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{}", e);
        }
    }
}

#[cfg(unix)]
fn configure_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn configure_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn terminate(child: &Child) -> Result<(), WorkerError> {
    let pid = child.id() as libc::pid_t;
    // SAFETY: plain kill(2) on the worker's own process group.
    let rc = unsafe { libc::kill(-pid, libc::SIGTERM) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH: exited between try_wait and kill.
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(WorkerError::Signal(err));
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn terminate(_child: &Child) -> Result<(), WorkerError> {
    Ok(())
}

#[cfg(unix)]
fn kill(child: &mut Child) -> Result<(), WorkerError> {
    let pid = child.id() as libc::pid_t;
    // SAFETY: plain kill(2) on the worker's own process group.
    unsafe {
        libc::kill(-pid, libc::SIGKILL);
    }
    Ok(())
}

#[cfg(not(unix))]
fn kill(child: &mut Child) -> Result<(), WorkerError> {
    child.kill().map_err(WorkerError::Signal)
}
