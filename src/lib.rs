// src/lib.rs
pub mod config;
pub mod cursor;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod plugins;
pub mod registry;
pub mod signals;
pub mod supervisor;

pub use error::*;
pub use pipeline::*;

pub use config::{FileConfig, LogFormat, OutputKind, RunConfiguration};
pub use cursor::{FileCursor, FileId};
pub use plugins::outputs::{MemorySink, MetricSink, StatsdSink, StdoutSink};
pub use plugins::parsers::LineParser;
pub use plugins::processors::RecordProcessor;
pub use registry::{discover, Discovered, ParserHandle, PluginContext, PluginLocation, ProcessorHandle};
pub use signals::{ReloadHandle, ShutdownHandle, Signals};
pub use supervisor::{PidFile, RunSummary, Supervisor, SupervisorState};
