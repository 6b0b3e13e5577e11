// src/plugins/parsers/nginx.rs
use anyhow::{anyhow, Result};
use regex::Regex;

use super::LineParser;
use crate::pipeline::context::Record;

/// Access log format with upstream timings appended:
///
/// ```text
/// $remote_addr - $remote_user [$time_local]  "$request" $status $body_bytes_sent
///     "$http_referer" "$http_user_agent" $request_time $upstream_response_time $pipe
/// ```
const NGINX_ACCESS_PATTERN: &str = r#"(?P<ip_address>\S*)\s-\s(?P<requesting_user>\S*)\s\[(?P<timestamp>.*?)\]\s{1,2}"(?P<method>\S*)\s*(?P<request>\S*)\s*(?:HTTP/)*(?P<http_version>.*?)"\s(?P<response_code>\d{3})\s(?P<size>\S*)\s"(?P<referrer>[^"]*)"\s"(?P<client>[^"]*)"\s(?P<service_time>\S*)\s(?P<application_time>\S*)\s(?P<pipe>\S*)"#;

/// Parser for nginx access logs.
///
/// The request target is split on the first `?` into `path` and `query`.
/// Fields logged as `-` are left out.
pub struct NginxParser {
    regex: Regex,
}

impl NginxParser {
    pub fn new() -> Result<Self> {
        let regex = Regex::new(NGINX_ACCESS_PATTERN)
            .map_err(|e| anyhow!("Failed to compile nginx pattern: {}", e))?;
        Ok(Self { regex })
    }
}

impl LineParser for NginxParser {
    fn parse_line(&self, line: &str) -> Record {
        let mut record = Record::new();
        let captures = match self.regex.captures(line) {
            Some(c) => c,
            None => return record,
        };

        for name in self.regex.capture_names().flatten() {
            let value = match captures.name(name) {
                Some(m) if m.as_str() != "-" => m.as_str(),
                _ => continue,
            };

            if name == "request" {
                match value.split_once('?') {
                    Some((path, query)) => {
                        record.insert("path", path);
                        record.insert("query", query);
                    }
                    None => record.insert("path", value),
                }
                continue;
            }

            record.insert(name, value);
        }

        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = r#"10.0.0.1 - - [15/Jan/2024:10:00:00 +0000]  "GET /api/widgets?page=2 HTTP/1.1" 200 512 "-" "Mozilla/5.0 (Windows NT 10.0) Chrome/120 Safari/537" 0.010 0.008 ."#;

    #[test]
    fn test_parses_access_line() {
        let parser = NginxParser::new().unwrap();
        let record = parser.parse_line(LINE);

        assert_eq!(record.get_str("ip_address"), Some("10.0.0.1"));
        assert_eq!(record.get_str("timestamp"), Some("15/Jan/2024:10:00:00 +0000"));
        assert_eq!(record.get_str("method"), Some("GET"));
        assert_eq!(record.get_str("path"), Some("/api/widgets"));
        assert_eq!(record.get_str("query"), Some("page=2"));
        assert_eq!(record.get_str("http_version"), Some("1.1"));
        assert_eq!(record.get_str("response_code"), Some("200"));
        assert_eq!(record.get_str("size"), Some("512"));
        assert_eq!(record.get_str("service_time"), Some("0.010"));
        assert_eq!(record.get_str("application_time"), Some("0.008"));
        assert_eq!(record.get_str("pipe"), Some("."));
        assert!(record.get_str("client").unwrap().contains("Chrome"));
    }

    #[test]
    fn test_dash_fields_are_omitted() {
        let parser = NginxParser::new().unwrap();
        let record = parser.parse_line(LINE);

        assert!(!record.contains_key("requesting_user"));
        assert!(!record.contains_key("referrer"));
        assert!(!record.contains_key("request"));
    }

    #[test]
    fn test_path_without_query() {
        let parser = NginxParser::new().unwrap();
        let line = r#"10.0.0.2 - bob [15/Jan/2024:10:00:01 +0000] "POST /ajax/save HTTP/1.0" 201 0 "http://example.com/" "curl/8.0" 0.001 0.001 p"#;
        let record = parser.parse_line(line);

        assert_eq!(record.get_str("path"), Some("/ajax/save"));
        assert_eq!(record.get_str("requesting_user"), Some("bob"));
        assert_eq!(record.get_str("referrer"), Some("http://example.com/"));
        assert!(!record.contains_key("query"));
    }

    #[test]
    fn test_non_matching_line_is_empty() {
        let parser = NginxParser::new().unwrap();
        assert!(parser.parse_line("this is not an access log line").is_empty());
        assert!(parser.parse_line("").is_empty());
    }
}
