// src/plugins/processors/url.rs
//! Request counters keyed on the `path` and `client` fields of access-log
//! records.

use std::sync::Arc;

use super::RecordProcessor;
use crate::error::ProcessorError;
use crate::pipeline::context::Record;
use crate::plugins::outputs::MetricSink;

/// Counts requests whose path starts with a fixed prefix
struct PathPrefixCounter {
    prefix: &'static str,
    stat: &'static str,
    sink: Arc<dyn MetricSink>,
}

impl PathPrefixCounter {
    fn observe(&self, record: &Record) -> Result<(), ProcessorError> {
        match record.get_str("path") {
            Some(path) if path.starts_with(self.prefix) => {
                self.sink.increment(self.stat)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// `call.ajax` for every `/ajax/` request
pub struct AjaxCallProcessor(PathPrefixCounter);

impl AjaxCallProcessor {
    pub fn new(sink: Arc<dyn MetricSink>) -> Self {
        AjaxCallProcessor(PathPrefixCounter {
            prefix: "/ajax/",
            stat: "call.ajax",
            sink,
        })
    }
}

impl RecordProcessor for AjaxCallProcessor {
    fn process(&mut self, record: &Record) -> Result<(), ProcessorError> {
        self.0.observe(record)
    }

    fn name(&self) -> &str {
        "process_ajax"
    }
}

/// `call.api` for every `/api/` request
pub struct ApiCallProcessor(PathPrefixCounter);

impl ApiCallProcessor {
    pub fn new(sink: Arc<dyn MetricSink>) -> Self {
        ApiCallProcessor(PathPrefixCounter {
            prefix: "/api/",
            stat: "call.api",
            sink,
        })
    }
}

impl RecordProcessor for ApiCallProcessor {
    fn process(&mut self, record: &Record) -> Result<(), ProcessorError> {
        self.0.observe(record)
    }

    fn name(&self) -> &str {
        "process_api"
    }
}

/// `browser_request.<agent>.<os>` for every record with a `client` field
pub struct UserAgentProcessor {
    sink: Arc<dyn MetricSink>,
}

impl UserAgentProcessor {
    pub fn new(sink: Arc<dyn MetricSink>) -> Self {
        Self { sink }
    }
}

impl RecordProcessor for UserAgentProcessor {
    fn process(&mut self, record: &Record) -> Result<(), ProcessorError> {
        let Some(client) = record.get_str("client") else {
            return Ok(());
        };
        let (agent, os) = classify_user_agent(client);
        self.sink
            .increment(&format!("browser_request.{}.{}", agent, os))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "process_os_and_user_agent_request"
    }
}

const IE_VERSIONS: &[&str] = &["4", "5", "6", "7", "8", "9", "10"];
const BOT_MARKERS: &[&str] = &["bot", "spider", "symfony", "grabber"];

/// Rough browser and OS family from a user agent string.
///
/// Later checks win: a Chrome UA that also mentions Safari is `chrome`, and
/// anything that looks like a crawler is `("bot", "bot")`.
pub fn classify_user_agent(user_agent: &str) -> (String, &'static str) {
    let ua = user_agent.to_lowercase();
    let mut agent = "unknown".to_string();
    let mut os = "unknown";

    if ua.contains("msie") {
        for version in IE_VERSIONS {
            if ua.contains(&format!("msie {}", version)) {
                agent = format!("ie{}", version);
            }
        }
    }

    if ua.contains("safari") {
        agent = if ua.contains("chrome") { "chrome" } else { "safari" }.to_string();
    }

    if ua.contains("firefox") {
        agent = "firefox".to_string();
    }

    if ua.contains("windows") {
        os = "windows";
    } else if ua.contains("mac") {
        os = "mac";
    } else if ua.contains("linux") {
        os = "linux";
    }

    if BOT_MARKERS.iter().any(|bot| ua.contains(bot)) {
        agent = "bot".to_string();
        os = "bot";
    }

    (agent, os)
}
