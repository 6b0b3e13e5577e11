// src/plugins/parsers/mod.rs
pub mod nginx;
pub mod proftpd;

use crate::pipeline::context::Record;

pub use nginx::NginxParser;
pub use proftpd::ProftpdXferlogParser;

/// Turns one raw line into a record.
///
/// Lines that don't match the expected format produce an empty record rather
/// than an error.
pub trait LineParser {
    fn parse_line(&self, line: &str) -> Record;
}

impl<F> LineParser for F
where
    F: Fn(&str) -> Record,
{
    fn parse_line(&self, line: &str) -> Record {
        self(line)
    }
}
