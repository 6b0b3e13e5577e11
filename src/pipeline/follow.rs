// src/pipeline/follow.rs
use std::time::Duration;

use crate::cursor::FileCursor;
use crate::error::TailError;
use crate::pipeline::config::FollowConfig;
use crate::pipeline::context::{Progress, Record};
use crate::registry::ParserHandle;
use crate::signals::Signals;

/// Blocking pause between empty reads
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Real wall-clock sleep
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Called every `progress_interval` lines
pub type ProgressCallback = Box<dyn FnMut(&Progress)>;

fn log_progress(progress: &Progress) {
    tracing::info!(
        offset = progress.offset,
        file_size = progress.file_size,
        lines = progress.lines_read,
        percent = progress.percent(),
        "progress"
    );
}

/// Lazy sequence of parsed records from a file cursor.
///
/// Infinite while tailing; in batch mode it ends at the first empty read.
/// Between iterations it honours reload and shutdown requests. Once it has
/// returned `None` it stays exhausted.
pub struct LineFollower<S: Sleeper = ThreadSleeper> {
    cursor: FileCursor,
    parser: ParserHandle,
    config: FollowConfig,
    signals: Signals,
    sleeper: S,
    on_progress: ProgressCallback,
    empty_reads: u32,
    rotated: bool,
    ticks: u64,
    lines_read: u64,
    reloads: u64,
    finished: bool,
}

impl LineFollower<ThreadSleeper> {
    pub fn new(cursor: FileCursor, parser: ParserHandle, config: FollowConfig) -> Self {
        Self::with_sleeper(cursor, parser, config, ThreadSleeper)
    }
}

impl<S: Sleeper> LineFollower<S> {
    pub fn with_sleeper(
        cursor: FileCursor,
        parser: ParserHandle,
        config: FollowConfig,
        sleeper: S,
    ) -> Self {
        LineFollower {
            cursor,
            parser,
            config,
            signals: Signals::detached(),
            sleeper,
            on_progress: Box::new(log_progress),
            empty_reads: 0,
            rotated: false,
            ticks: 0,
            lines_read: 0,
            reloads: 0,
            finished: false,
        }
    }

    pub fn with_signals(mut self, signals: Signals) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_progress_callback(mut self, callback: impl FnMut(&Progress) + 'static) -> Self {
        self.on_progress = Box::new(callback);
        self
    }

    pub fn cursor(&self) -> &FileCursor {
        &self.cursor
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Reloads performed so far, by signal or by rotation check
    pub fn reloads(&self) -> u64 {
        self.reloads
    }

    /// Give the cursor back, e.g. to close it
    pub fn into_cursor(self) -> FileCursor {
        self.cursor
    }

    /// Replace the cursor with a fresh one at the start of the path
    fn reload(&mut self, reason: &'static str) -> Result<(), TailError> {
        let old_id = self.cursor.identity();
        self.cursor.reopen()?;
        self.reloads += 1;
        tracing::info!(
            path = %self.cursor.path().display(),
            reason,
            old_file_id = %old_id,
            new_file_id = %self.cursor.identity(),
            "log file reloaded"
        );
        Ok(())
    }

    /// Flag a rotation; the old handle is drained before the reopen happens
    fn check_rotation(&mut self) -> Result<(), TailError> {
        if self.cursor.has_rotated()? {
            tracing::debug!(path = %self.cursor.path().display(), "rotation detected");
            self.rotated = true;
            Ok(())
        } else {
            tracing::debug!(
                path = %self.cursor.path().display(),
                offset = self.cursor.offset(),
                "idle, file not rotated"
            );
            Ok(())
        }
    }

    fn report_progress(&mut self) -> Result<(), TailError> {
        let progress = Progress {
            offset: self.cursor.offset(),
            file_size: self.cursor.file_size()?,
            lines_read: self.lines_read,
        };
        (self.on_progress)(&progress);
        Ok(())
    }

    fn step(&mut self) -> Result<Option<Record>, TailError> {
        loop {
            if self.signals.shutdown.is_requested() {
                tracing::info!("shutdown requested, stopping follower");
                return Ok(None);
            }

            if self.signals.reload.take_pending() {
                self.reload("signal")?;
                self.empty_reads = 0;
                self.rotated = false;
            }

            if let Some(line) = self.cursor.read_line()? {
                self.empty_reads = 0;
                self.lines_read += 1;
                self.ticks += 1;
                if self.config.progress_interval > 0 && self.ticks >= self.config.progress_interval
                {
                    self.ticks = 0;
                    self.report_progress()?;
                }

                let record = self.parser.parse_line(&line);
                tracing::trace!(line = %line, record = %record.to_json(), "parsed");
                return Ok(Some(record));
            }

            if self.rotated {
                self.rotated = false;
                self.reload("rotation")?;
                continue;
            }

            if self.config.batch {
                tracing::debug!(lines = self.lines_read, "end of batch input");
                return Ok(None);
            }

            self.sleeper.sleep(self.config.poll_interval);

            if self.config.auto_reload {
                self.empty_reads = self.empty_reads.saturating_add(1);
                if self.empty_reads >= self.config.reload_threshold {
                    self.empty_reads = 0;
                    self.check_rotation()?;
                }
            }
        }
    }
}

impl<S: Sleeper> Iterator for LineFollower<S> {
    type Item = Result<Record, TailError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.step() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
