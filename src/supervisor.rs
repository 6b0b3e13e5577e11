// src/supervisor.rs
//! Process lifecycle: PID file, signal wiring, the consume loop and orderly
//! shutdown.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::RunConfiguration;
use crate::cursor::FileCursor;
use crate::error::{ConfigurationError, TailError};
use crate::pipeline::context::ProcessingStats;
use crate::pipeline::dispatch::DispatchPipeline;
use crate::pipeline::follow::{LineFollower, Sleeper, ThreadSleeper};
use crate::registry::ParserHandle;
use crate::signals::Signals;

/// Exit status for normal or batch completion
pub const EXIT_OK: i32 = 0;
/// Exit status when the log file cannot be tailed at all
pub const EXIT_FATAL: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    PidFileWritten,
    FileLoaded,
    Running,
    ShuttingDown,
    Terminated,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::Idle => "idle",
            SupervisorState::PidFileWritten => "pid_file_written",
            SupervisorState::FileLoaded => "file_loaded",
            SupervisorState::Running => "running",
            SupervisorState::ShuttingDown => "shutting_down",
            SupervisorState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// A PID file that exists for as long as this value does
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    removed: bool,
}

impl PidFile {
    /// Truncate (or create) the file and write our decimal process id
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref().to_path_buf();
        fs::write(&path, std::process::id().to_string()).map_err(|source| {
            ConfigurationError::PidFile {
                path: path.clone(),
                source,
            }
        })?;
        tracing::debug!(path = %path.display(), pid = std::process::id(), "pid file written");
        Ok(Self {
            path,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn remove(mut self) {
        self.remove_file();
    }

    fn remove_file(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "pid file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "cannot remove pid file"),
        }
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        self.remove_file();
    }
}

/// What a finished run looked like
#[derive(Debug)]
pub struct RunSummary {
    pub exit_code: i32,
    pub stats: ProcessingStats,
    /// Fatal tailing error that ended the run, if any
    pub error: Option<TailError>,
    /// Every state entered, in order
    pub transitions: Vec<SupervisorState>,
}

/// Drives one run of the daemon from PID file to exit code
pub struct Supervisor<S: Sleeper = ThreadSleeper> {
    config: RunConfiguration,
    signals: Signals,
    bind_os_signals: bool,
    sleeper: Option<S>,
    state: SupervisorState,
    transitions: Vec<SupervisorState>,
    pid_file: Option<PidFile>,
}

impl Supervisor<ThreadSleeper> {
    pub fn new(config: RunConfiguration) -> Self {
        Self::with_sleeper(config, ThreadSleeper)
    }
}

impl<S: Sleeper> Supervisor<S> {
    pub fn with_sleeper(config: RunConfiguration, sleeper: S) -> Self {
        Supervisor {
            config,
            signals: Signals::detached(),
            bind_os_signals: false,
            sleeper: Some(sleeper),
            state: SupervisorState::Idle,
            transitions: vec![SupervisorState::Idle],
            pid_file: None,
        }
    }

    /// Bind SIGUSR1/SIGINT/SIGTERM during `start`. Only once per process.
    pub fn with_os_signals(mut self) -> Self {
        self.bind_os_signals = true;
        self
    }

    /// Use these control handles instead of fresh detached ones
    pub fn with_signals(mut self, signals: Signals) -> Self {
        self.signals = signals;
        self
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    fn transition(&mut self, next: SupervisorState) {
        tracing::debug!(from = %self.state, to = %next, "supervisor state");
        self.state = next;
        self.transitions.push(next);
    }

    /// Register, open the log file and consume records until the follower
    /// ends.
    ///
    /// Problems before the PID file exists, or while binding signals, come
    /// back as `Err`. Once registered, every outcome goes through
    /// `shutdown` and is reported in the summary's exit code.
    pub fn start(
        mut self,
        parser: ParserHandle,
        mut pipeline: DispatchPipeline,
    ) -> Result<RunSummary, ConfigurationError> {
        let started = Instant::now();
        let sleeper = self
            .sleeper
            .take()
            .ok_or_else(|| ConfigurationError::Invalid("supervisor already started".into()))?;

        self.pid_file = Some(PidFile::create(&self.config.pid_file)?);
        self.transition(SupervisorState::PidFileWritten);

        if self.bind_os_signals {
            match Signals::install() {
                Ok(signals) => self.signals = signals,
                Err(e) => {
                    if let Some(pid) = self.pid_file.take() {
                        pid.remove();
                    }
                    return Err(e);
                }
            }
        }

        let mut cursor = match self.load_file() {
            Ok(cursor) => cursor,
            Err(e) => {
                tracing::error!(error = %e, "unable to open log file");
                return Ok(self.shutdown(None, EXIT_FATAL, ProcessingStats::default(), Some(e)));
            }
        };
        self.transition(SupervisorState::FileLoaded);

        if !self.config.batch {
            if let Err(e) = cursor.seek_to_end() {
                tracing::error!(error = %e, "unable to seek to end of log file");
                return Ok(self.shutdown(Some(cursor), EXIT_FATAL, ProcessingStats::default(), Some(e)));
            }
        }

        tracing::info!(
            path = %self.config.log_file.display(),
            offset = cursor.offset(),
            batch = self.config.batch,
            auto_reload = self.config.auto_reload,
            processors = pipeline.len(),
            "following log file"
        );
        self.transition(SupervisorState::Running);

        let mut follower =
            LineFollower::with_sleeper(cursor, parser, self.config.follow_config(), sleeper)
                .with_signals(self.signals.clone());

        let mut stats = ProcessingStats::default();
        let mut error = None;
        for item in follower.by_ref() {
            match item {
                Ok(record) => {
                    stats.records_dispatched += 1;
                    if record.is_empty() {
                        stats.empty_records += 1;
                    }
                    pipeline.dispatch(&record);
                }
                Err(e) => {
                    tracing::error!(error = %e, "tailing stopped");
                    error = Some(e);
                    break;
                }
            }
        }

        stats.processor_failures = pipeline.failure_count();
        stats.reloads = follower.reloads();
        stats.processing_time = started.elapsed();

        let exit_code = if error.is_some() { EXIT_FATAL } else { EXIT_OK };
        Ok(self.shutdown(Some(follower.into_cursor()), exit_code, stats, error))
    }

    fn load_file(&self) -> Result<FileCursor, TailError> {
        FileCursor::open(&self.config.log_file)
    }

    /// Close the cursor, remove the PID file and report the exit code
    fn shutdown(
        mut self,
        cursor: Option<FileCursor>,
        exit_code: i32,
        stats: ProcessingStats,
        error: Option<TailError>,
    ) -> RunSummary {
        self.transition(SupervisorState::ShuttingDown);

        if let Some(mut cursor) = cursor {
            cursor.close();
        }
        if let Some(pid) = self.pid_file.take() {
            pid.remove();
        }

        tracing::info!(
            exit_code,
            records = stats.records_dispatched,
            empty_records = stats.empty_records,
            processor_failures = stats.processor_failures,
            reloads = stats.reloads,
            elapsed = ?stats.processing_time,
            "shutdown complete"
        );
        self.transition(SupervisorState::Terminated);

        RunSummary {
            exit_code,
            stats,
            error,
            transitions: std::mem::take(&mut self.transitions),
        }
    }
}
