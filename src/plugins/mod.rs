// src/plugins/mod.rs
//! Bundled parsers, processors and output sinks.

pub mod outputs;
pub mod parsers;
pub mod processors;

use std::sync::Arc;

use crate::registry::PluginLocation;

use parsers::{NginxParser, ProftpdXferlogParser};
use processors::{AjaxCallProcessor, ApiCallProcessor, UserAgentProcessor};

/// Manifest of every bundled plugin, in discovery order
pub fn builtin_locations() -> Vec<PluginLocation> {
    vec![
        PluginLocation::new("parsers/nginx")
            .parser("parse_nginx", |_| Ok(Box::new(NginxParser::new()?))),
        PluginLocation::new("parsers/proftpd")
            .parser("parse_proftpd_xfrlog", |_| {
                Ok(Box::new(ProftpdXferlogParser::new()?))
            }),
        PluginLocation::new("processors/url")
            .processor("process_ajax", |ctx| {
                Ok(Box::new(AjaxCallProcessor::new(Arc::clone(&ctx.sink))))
            })
            .processor("process_api", |ctx| {
                Ok(Box::new(ApiCallProcessor::new(Arc::clone(&ctx.sink))))
            })
            .processor("process_os_and_user_agent_request", |ctx| {
                Ok(Box::new(UserAgentProcessor::new(Arc::clone(&ctx.sink))))
            })
            .helper("classify_user_agent"),
    ]
}
