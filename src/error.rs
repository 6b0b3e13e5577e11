use std::path::PathBuf;

/// Problems that prevent the daemon from ever reaching the running state.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("parser not found: '{requested}' (available: {available})")]
    ParserNotFound { requested: String, available: String },

    #[error("no parsers registered")]
    NoParsers,

    #[error("plugin '{name}' in {location}: {message}")]
    InvalidExport {
        location: String,
        name: String,
        message: String,
    },

    #[error("plugin '{name}' in {location} failed to load: {source}")]
    PluginLoad {
        location: String,
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("cannot write pid file {}: {source}", path.display())]
    PidFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot install signal handler: {0}")]
    Signal(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failures while opening or reading the tailed file.
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read error on {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file cursor for {} is closed", path.display())]
    Closed { path: PathBuf },
}

/// A single processor invocation went wrong. Always recovered by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("output sink error: {0}")]
    Sink(#[from] std::io::Error),

    #[error("processor panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
