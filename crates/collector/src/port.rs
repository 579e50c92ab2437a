//! Free port discovery
//!
//! Probes an inclusive port range in ascending order by binding a throwaway
//! listener. The probe is dropped before returning so the syslog listener
//! can bind the same address right after.

use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

use crate::error::{CollectorError, Result};

/// First-fit port allocator for one host
#[derive(Debug, Clone)]
pub struct PortAllocator {
    host: String,
}

impl PortAllocator {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Lowest bindable address in `lower..=upper`
    ///
    /// Port 0 is skipped since binding it picks an ephemeral port outside
    /// the range. An empty range or an unresolvable host yields
    /// `NoFreePort`.
    pub fn allocate(&self, lower: u16, upper: u16) -> Result<SocketAddr> {
        let no_free_port = CollectorError::NoFreePort { lower, upper };
        if lower > upper {
            return Err(no_free_port);
        }

        for port in lower.max(1)..=upper {
            let Some(candidate) = self.resolve(port) else {
                tracing::warn!(host = %self.host, port, "failed to resolve collector address");
                return Err(no_free_port);
            };

            match TcpListener::bind(candidate) {
                Ok(probe) => {
                    let addr = probe.local_addr().unwrap_or(candidate);
                    drop(probe);
                    tracing::debug!(address = %addr, "found free port");
                    return Ok(addr);
                }
                Err(e) => {
                    tracing::trace!(port, error = %e, "port unavailable");
                }
            }
        }

        Err(no_free_port)
    }

    /// Resolve `host:port`, preferring IPv4
    fn resolve(&self, port: u16) -> Option<SocketAddr> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), port).to_socket_addrs().ok()?.collect();
        addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new("localhost")
    }
}
