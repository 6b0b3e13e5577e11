// src/config.rs
//! Run configuration: YAML file values overlaid with command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigurationError;
use crate::pipeline::config::{
    FollowConfig, DEFAULT_POLL_INTERVAL, DEFAULT_PROGRESS_INTERVAL, DEFAULT_RELOAD_THRESHOLD,
};
use crate::plugins::outputs::statsd::DEFAULT_STATSD_ADDR;

pub const DEFAULT_PID_FILE: &str = "/tmp/logfollow.pid";

/// Where processors send their metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    #[default]
    #[value(name = "statsd")]
    Statsd,
    #[value(name = "stdout")]
    Stdout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

/// Partial configuration, as read from a file or collected from flags
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub log_file: Option<PathBuf>,
    pub parser: Option<String>,
    pub pid_file: Option<PathBuf>,
    pub debug: Option<bool>,
    pub batch: Option<bool>,
    pub auto_reload: Option<bool>,
    /// Human readable, e.g. `100ms` or `1s`
    pub poll_interval: Option<String>,
    pub reload_threshold: Option<u32>,
    pub progress_interval: Option<u64>,
    pub output: Option<OutputKind>,
    pub statsd_addr: Option<String>,
    pub statsd_prefix: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::Invalid(format!("cannot read config file '{}': {}", path.display(), e))
        })?;
        Self::from_yaml(&text).map_err(|e| match e {
            ConfigurationError::Invalid(msg) => {
                ConfigurationError::Invalid(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigurationError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| ConfigurationError::Invalid(e.to_string()))
    }

    /// Values set here win; unset ones fall back to `lower`
    pub fn overlay(self, lower: FileConfig) -> FileConfig {
        FileConfig {
            log_file: self.log_file.or(lower.log_file),
            parser: self.parser.or(lower.parser),
            pid_file: self.pid_file.or(lower.pid_file),
            debug: self.debug.or(lower.debug),
            batch: self.batch.or(lower.batch),
            auto_reload: self.auto_reload.or(lower.auto_reload),
            poll_interval: self.poll_interval.or(lower.poll_interval),
            reload_threshold: self.reload_threshold.or(lower.reload_threshold),
            progress_interval: self.progress_interval.or(lower.progress_interval),
            output: self.output.or(lower.output),
            statsd_addr: self.statsd_addr.or(lower.statsd_addr),
            statsd_prefix: self.statsd_prefix.or(lower.statsd_prefix),
            log_format: self.log_format.or(lower.log_format),
        }
    }

    pub fn resolve(self) -> Result<RunConfiguration, ConfigurationError> {
        let log_file = self
            .log_file
            .ok_or_else(|| ConfigurationError::Invalid("a log file is required (--log-file)".into()))?;

        let poll_interval = match self.poll_interval {
            Some(text) => humantime::parse_duration(&text).map_err(|e| {
                ConfigurationError::Invalid(format!("poll interval '{}': {}", text, e))
            })?,
            None => DEFAULT_POLL_INTERVAL,
        };
        if poll_interval.is_zero() {
            return Err(ConfigurationError::Invalid(
                "poll interval must be greater than zero".into(),
            ));
        }

        let reload_threshold = self.reload_threshold.unwrap_or(DEFAULT_RELOAD_THRESHOLD);
        if reload_threshold == 0 {
            return Err(ConfigurationError::Invalid(
                "reload threshold must be at least 1".into(),
            ));
        }

        Ok(RunConfiguration {
            log_file,
            parser: self.parser.filter(|p| p != "auto"),
            pid_file: self
                .pid_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PID_FILE)),
            debug: self.debug.unwrap_or(false),
            batch: self.batch.unwrap_or(false),
            auto_reload: self.auto_reload.unwrap_or(false),
            poll_interval,
            reload_threshold,
            progress_interval: self.progress_interval.unwrap_or(DEFAULT_PROGRESS_INTERVAL),
            output: self.output.unwrap_or_default(),
            statsd_addr: self
                .statsd_addr
                .unwrap_or_else(|| DEFAULT_STATSD_ADDR.to_string()),
            statsd_prefix: self.statsd_prefix.filter(|p| !p.is_empty()),
            log_format: self.log_format.unwrap_or_default(),
        })
    }
}

/// Immutable settings for one run of the daemon
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    pub log_file: PathBuf,
    /// `None` selects the first parser by name
    pub parser: Option<String>,
    pub pid_file: PathBuf,
    pub debug: bool,
    pub batch: bool,
    pub auto_reload: bool,
    pub poll_interval: Duration,
    pub reload_threshold: u32,
    pub progress_interval: u64,
    pub output: OutputKind,
    pub statsd_addr: String,
    pub statsd_prefix: Option<String>,
    pub log_format: LogFormat,
}

impl RunConfiguration {
    /// Defaults for everything except the log file
    pub fn new(log_file: impl Into<PathBuf>) -> Self {
        RunConfiguration {
            log_file: log_file.into(),
            parser: None,
            pid_file: PathBuf::from(DEFAULT_PID_FILE),
            debug: false,
            batch: false,
            auto_reload: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            reload_threshold: DEFAULT_RELOAD_THRESHOLD,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            output: OutputKind::default(),
            statsd_addr: DEFAULT_STATSD_ADDR.to_string(),
            statsd_prefix: None,
            log_format: LogFormat::default(),
        }
    }

    pub fn follow_config(&self) -> FollowConfig {
        FollowConfig {
            batch: self.batch,
            auto_reload: self.auto_reload,
            poll_interval: self.poll_interval,
            reload_threshold: self.reload_threshold,
            progress_interval: self.progress_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = RunConfiguration::new("/var/log/nginx/access.log");
        assert_eq!(config.parser, None);
        assert_eq!(config.pid_file, PathBuf::from(DEFAULT_PID_FILE));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.reload_threshold, 100);
        assert_eq!(config.progress_interval, 100);
        assert_eq!(config.output, OutputKind::Statsd);
        assert_eq!(config.statsd_addr, "127.0.0.1:8125");
        assert!(!config.batch && !config.auto_reload && !config.debug);
    }

    #[test]
    fn test_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "log_file: /var/log/xferlog\nparser: parse_proftpd_xfrlog\nauto_reload: true\npoll_interval: 250ms\noutput: stdout\nstatsd_prefix: ftp"
        )
        .unwrap();

        let config = FileConfig::from_file(file.path()).unwrap().resolve().unwrap();
        assert_eq!(config.log_file, PathBuf::from("/var/log/xferlog"));
        assert_eq!(config.parser.as_deref(), Some("parse_proftpd_xfrlog"));
        assert!(config.auto_reload);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.output, OutputKind::Stdout);
        assert_eq!(config.statsd_prefix.as_deref(), Some("ftp"));
    }

    #[test]
    fn test_flags_override_file() {
        let file = FileConfig::from_yaml("log_file: /a.log\nbatch: false\nparser: parse_nginx").unwrap();
        let flags = FileConfig {
            log_file: Some("/b.log".into()),
            batch: Some(true),
            ..FileConfig::default()
        };

        let config = flags.overlay(file).resolve().unwrap();
        assert_eq!(config.log_file, PathBuf::from("/b.log"));
        assert!(config.batch);
        assert_eq!(config.parser.as_deref(), Some("parse_nginx"));
    }

    #[test]
    fn test_auto_parser_means_none() {
        let config = FileConfig {
            log_file: Some("/a.log".into()),
            parser: Some("auto".into()),
            ..FileConfig::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(config.parser, None);
    }

    #[test]
    fn test_invalid_values() {
        assert!(FileConfig::default().resolve().is_err());
        assert!(FileConfig::from_yaml("unknown_key: 1").is_err());

        let bad_interval = FileConfig {
            log_file: Some("/a.log".into()),
            poll_interval: Some("soon".into()),
            ..FileConfig::default()
        };
        assert!(matches!(
            bad_interval.resolve(),
            Err(ConfigurationError::Invalid(_))
        ));
    }

    #[test]
    fn test_follow_config_carries_tailing_settings() {
        let mut config = RunConfiguration::new("/a.log");
        config.batch = true;
        config.auto_reload = true;
        config.debug = true;
        config.poll_interval = Duration::from_millis(5);
        config.reload_threshold = 7;
        config.progress_interval = 0;

        let follow = config.follow_config();
        assert!(follow.batch && follow.auto_reload);
        assert_eq!(follow.poll_interval, Duration::from_millis(5));
        assert_eq!(follow.reload_threshold, 7);
        assert_eq!(follow.progress_interval, 0);
    }
}
