// src/plugins/processors/mod.rs
pub mod url;

use crate::error::ProcessorError;
use crate::pipeline::context::Record;

pub use url::{AjaxCallProcessor, ApiCallProcessor, UserAgentProcessor};

/// A step that consumes a record and produces side effects (usually metrics)
pub trait RecordProcessor {
    fn process(&mut self, record: &Record) -> Result<(), ProcessorError>;
    fn name(&self) -> &str;
}
