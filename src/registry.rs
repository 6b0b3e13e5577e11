// src/registry.rs
//! Explicit plugin registry.
//!
//! Each `PluginLocation` is a manifest of named exports. Names starting with
//! `parse` are parser candidates, names starting with `process` are
//! processors; anything else is a helper and is skipped.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ConfigurationError;
use crate::plugins::outputs::MetricSink;
use crate::plugins::parsers::LineParser;
use crate::plugins::processors::RecordProcessor;

pub const PARSER_PREFIX: &str = "parse";
pub const PROCESSOR_PREFIX: &str = "process";

/// The single active parser
pub type ParserHandle = Box<dyn LineParser>;
/// One entry in the processor chain
pub type ProcessorHandle = Box<dyn RecordProcessor>;

pub type ParserFactory = Box<dyn Fn(&PluginContext) -> anyhow::Result<ParserHandle>>;
pub type ProcessorFactory = Box<dyn Fn(&PluginContext) -> anyhow::Result<ProcessorHandle>>;

/// Shared resources handed to plugin factories
#[derive(Clone)]
pub struct PluginContext {
    pub sink: Arc<dyn MetricSink>,
}

pub enum PluginExport {
    Parser(ParserFactory),
    Processor(ProcessorFactory),
    /// Exported for other plugins, never called by the engine
    Helper,
}

impl PluginExport {
    fn kind(&self) -> &'static str {
        match self {
            PluginExport::Parser(_) => "parser",
            PluginExport::Processor(_) => "processor",
            PluginExport::Helper => "helper",
        }
    }
}

/// A named unit of exports, e.g. `parsers/nginx`
pub struct PluginLocation {
    name: String,
    exports: Vec<(String, PluginExport)>,
}

impl PluginLocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exports: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parser<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&PluginContext) -> anyhow::Result<ParserHandle> + 'static,
    {
        self.exports
            .push((name.to_string(), PluginExport::Parser(Box::new(factory))));
        self
    }

    pub fn processor<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&PluginContext) -> anyhow::Result<ProcessorHandle> + 'static,
    {
        self.exports
            .push((name.to_string(), PluginExport::Processor(Box::new(factory))));
        self
    }

    pub fn helper(mut self, name: &str) -> Self {
        self.exports.push((name.to_string(), PluginExport::Helper));
        self
    }
}

/// Everything found by `discover`
pub struct Discovered {
    /// Parser candidates, sorted by name
    pub parsers: BTreeMap<String, ParserHandle>,
    /// Processors in discovery order
    pub processors: Vec<ProcessorHandle>,
}

impl fmt::Debug for Discovered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Discovered")
            .field("parsers", &self.parser_names())
            .field("processors", &self.processor_names())
            .finish()
    }
}

impl Discovered {
    pub fn parser_names(&self) -> Vec<&str> {
        self.parsers.keys().map(String::as_str).collect()
    }

    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Pick the active parser and hand back the processor chain.
    ///
    /// `requested` of `None` or `"auto"` selects the lexicographically first
    /// candidate, so the choice is the same on every run.
    pub fn select_parser(
        mut self,
        requested: Option<&str>,
    ) -> Result<(String, ParserHandle, Vec<ProcessorHandle>), ConfigurationError> {
        let name = match requested {
            Some(name) if name != "auto" => {
                if !self.parsers.contains_key(name) {
                    return Err(ConfigurationError::ParserNotFound {
                        requested: name.to_string(),
                        available: self.parser_names().join(", "),
                    });
                }
                name.to_string()
            }
            _ => self
                .parsers
                .keys()
                .next()
                .cloned()
                .ok_or(ConfigurationError::NoParsers)?,
        };

        let parser = self
            .parsers
            .remove(&name)
            .ok_or(ConfigurationError::NoParsers)?;

        tracing::info!(parser = %name, auto = requested.map_or(true, |r| r == "auto"), "parser selected");
        Ok((name, parser, self.processors))
    }
}

/// Instantiate every export of every location.
///
/// Any factory failure, or an export whose kind contradicts its name, is
/// fatal.
pub fn discover(
    locations: Vec<PluginLocation>,
    ctx: &PluginContext,
) -> Result<Discovered, ConfigurationError> {
    let mut parsers = BTreeMap::new();
    let mut processors = Vec::new();

    for location in locations {
        let location_name = location.name;
        for (name, export) in location.exports {
            let invalid = |message: String| ConfigurationError::InvalidExport {
                location: location_name.clone(),
                name: name.clone(),
                message,
            };
            let load_failed = |source: anyhow::Error| ConfigurationError::PluginLoad {
                location: location_name.clone(),
                name: name.clone(),
                source,
            };

            let kind = export.kind();

            if name.starts_with(PARSER_PREFIX) {
                let PluginExport::Parser(factory) = export else {
                    return Err(invalid(format!(
                        "'{}' prefix names a parser, found a {}",
                        PARSER_PREFIX, kind
                    )));
                };
                let parser = factory(ctx).map_err(load_failed)?;
                if parsers.contains_key(&name) {
                    tracing::warn!(location = %location_name, parser = %name, "parser registered twice, later one wins");
                }
                tracing::debug!(location = %location_name, parser = %name, "parser discovered");
                parsers.insert(name, parser);
            } else if name.starts_with(PROCESSOR_PREFIX) {
                let PluginExport::Processor(factory) = export else {
                    return Err(invalid(format!(
                        "'{}' prefix names a processor, found a {}",
                        PROCESSOR_PREFIX, kind
                    )));
                };
                let processor = factory(ctx).map_err(load_failed)?;
                tracing::debug!(location = %location_name, processor = %name, "processor discovered");
                processors.push(processor);
            } else if !matches!(export, PluginExport::Helper) {
                return Err(invalid(format!(
                    "a {} must be named '{}*' or '{}*'",
                    kind,
                    PARSER_PREFIX,
                    PROCESSOR_PREFIX
                )));
            }
        }
    }

    Ok(Discovered {
        parsers,
        processors,
    })
}
