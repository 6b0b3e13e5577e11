// src/plugins/outputs/mod.rs
pub mod statsd;

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

pub use statsd::StatsdSink;

use crate::config::{OutputKind, RunConfiguration};
use crate::error::ConfigurationError;

/// One metric in statsd wire format
#[derive(Debug, Clone, PartialEq)]
pub enum Metric<'a> {
    Count { stat: &'a str, count: i64 },
    Timer { stat: &'a str, millis: u64 },
}

impl Metric<'_> {
    /// Render as `stat:value|type`, with an optional `prefix.` in front
    pub fn render(&self, prefix: Option<&str>) -> String {
        let (stat, value, kind) = match self {
            Metric::Count { stat, count } => (*stat, count.to_string(), "c"),
            Metric::Timer { stat, millis } => (*stat, millis.to_string(), "ms"),
        };
        match prefix {
            Some(p) if !p.is_empty() => format!("{}.{}:{}|{}", p, stat, value, kind),
            _ => format!("{}:{}|{}", stat, value, kind),
        }
    }
}

/// Destination for metrics emitted by processors.
///
/// Constructed once at startup and shared by every processor that needs it.
pub trait MetricSink: Send + Sync {
    fn emit(&self, metric: &Metric) -> io::Result<()>;

    fn count(&self, stat: &str, count: i64) -> io::Result<()> {
        self.emit(&Metric::Count { stat, count })
    }

    fn increment(&self, stat: &str) -> io::Result<()> {
        self.count(stat, 1)
    }

    fn timer(&self, stat: &str, millis: u64) -> io::Result<()> {
        self.emit(&Metric::Timer { stat, millis })
    }
}

/// The sink chosen by `--output`, built once for the whole run
pub fn build_sink(config: &RunConfiguration) -> Result<Arc<dyn MetricSink>, ConfigurationError> {
    let prefix = config.statsd_prefix.clone();
    let sink: Arc<dyn MetricSink> = match config.output {
        OutputKind::Statsd => Arc::new(StatsdSink::connect(&config.statsd_addr, prefix)?),
        OutputKind::Stdout => Arc::new(StdoutSink::new(prefix)),
    };
    Ok(sink)
}

/// Prints each metric line to stdout
#[derive(Debug, Default)]
pub struct StdoutSink {
    prefix: Option<String>,
}

impl StdoutSink {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }
}

impl MetricSink for StdoutSink {
    fn emit(&self, metric: &Metric) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{}", metric.render(self.prefix.as_deref()))?;
        out.flush()
    }
}

/// Keeps rendered metrics in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl MetricSink for MemorySink {
    fn emit(&self, metric: &Metric) -> io::Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "memory sink poisoned"))?;
        lines.push(metric.render(None));
        Ok(())
    }
}
