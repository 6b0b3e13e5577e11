// src/plugins/outputs/statsd.rs
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use super::{Metric, MetricSink};
use crate::error::ConfigurationError;

pub const DEFAULT_STATSD_ADDR: &str = "127.0.0.1:8125";

/// Fire-and-forget UDP statsd client.
///
/// Delivery is not guaranteed; a send error is reported to the calling
/// processor, never retried.
#[derive(Debug)]
pub struct StatsdSink {
    socket: UdpSocket,
    target: SocketAddr,
    prefix: Option<String>,
}

impl StatsdSink {
    pub fn connect(addr: &str, prefix: Option<String>) -> Result<Self, ConfigurationError> {
        let target = addr
            .to_socket_addrs()
            .map_err(|e| ConfigurationError::Invalid(format!("statsd address '{}': {}", addr, e)))?
            .next()
            .ok_or_else(|| {
                ConfigurationError::Invalid(format!("statsd address '{}' did not resolve", addr))
            })?;

        let bind = if target.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(bind)
            .map_err(|e| ConfigurationError::Invalid(format!("statsd socket: {}", e)))?;

        tracing::debug!(%target, "statsd sink ready");
        Ok(Self {
            socket,
            target,
            prefix,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl MetricSink for StatsdSink {
    fn emit(&self, metric: &Metric) -> io::Result<()> {
        let payload = metric.render(self.prefix.as_deref());
        self.socket.send_to(payload.as_bytes(), self.target)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_sends_datagrams() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        server
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let addr = server.local_addr().unwrap().to_string();

        let sink = StatsdSink::connect(&addr, Some("app".to_string())).unwrap();
        sink.increment("call.api").unwrap();
        sink.timer("render", 12).unwrap();

        let mut buf = [0u8; 512];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"app.call.api:1|c");
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"app.render:12|ms");
    }

    #[test]
    fn test_bad_address_is_configuration_error() {
        let result = StatsdSink::connect("not an address", None);
        assert!(matches!(result, Err(ConfigurationError::Invalid(_))));
    }
}
