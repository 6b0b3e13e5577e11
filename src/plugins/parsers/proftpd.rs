// src/plugins/parsers/proftpd.rs
use anyhow::{anyhow, Result};
use regex::Regex;

use super::LineParser;
use crate::pipeline::context::Record;

// current-time transfer-time host size filename type action direction mode
// username service auth-method auth-user-id completion
const XFERLOG_PATTERN: &str = r"^(\w{3} \w{3}\s+\d{1,2} \d{2}:\d{2}:\d{2} \d{4})\s+\d+ \S+ \d+ (/.+?) [ab] [CUT_] ([oid]) [agr] (\S+) (\S+) ([01]) (\S+) ([ci])";

/// Parser for the ProFTPD `xferlog` transfer log
pub struct ProftpdXferlogParser {
    regex: Regex,
}

impl ProftpdXferlogParser {
    pub fn new() -> Result<Self> {
        let regex = Regex::new(XFERLOG_PATTERN)
            .map_err(|e| anyhow!("Failed to compile xferlog pattern: {}", e))?;
        Ok(Self { regex })
    }
}

impl LineParser for ProftpdXferlogParser {
    fn parse_line(&self, line: &str) -> Record {
        let mut record = Record::new();
        let caps = match self.regex.captures(line) {
            Some(c) => c,
            None => return record,
        };

        let field = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();

        record.insert("date", field(1));
        record.insert("filename", field(2));
        record.insert("direction", field(3));
        record.insert("username", field(4));
        record.insert("servicename", field(5));
        let authmethod = if field(6) == "0" { "none" } else { "RFC931" };
        record.insert("authmethod", authmethod);
        record.insert("authenticateduid", field(7));
        record.insert("completed", field(8) == "c");

        record
    }
}
