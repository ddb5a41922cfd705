use async_trait::async_trait;
use ledger_core::PeerDiscovery;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Finds neighbours by probing nearby hosts and a port range for a listening
/// socket. Host candidates are the local address with its last octet shifted
/// by each offset in `ip_offsets`.
#[derive(Clone, Debug)]
pub struct PortRangeDiscovery {
    host: Ipv4Addr,
    own_port: u16,
    ip_offsets: RangeInclusive<u8>,
    ports: RangeInclusive<u16>,
    probe_timeout: Duration,
}

impl PortRangeDiscovery {
    pub fn new(
        host: Ipv4Addr,
        own_port: u16,
        ip_offsets: RangeInclusive<u8>,
        ports: RangeInclusive<u16>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            host,
            own_port,
            ip_offsets,
            ports,
            probe_timeout,
        }
    }

    fn candidates(&self) -> Vec<SocketAddrV4> {
        let [a, b, c, d] = self.host.octets();
        let own = SocketAddrV4::new(self.host, self.own_port);
        let mut out = Vec::new();
        for offset in self.ip_offsets.clone() {
            let Some(last) = d.checked_add(offset) else {
                continue;
            };
            for port in self.ports.clone() {
                let addr = SocketAddrV4::new(Ipv4Addr::new(a, b, c, last), port);
                if addr != own {
                    out.push(addr);
                }
            }
        }
        out
    }

    async fn is_listening(&self, addr: SocketAddrV4) -> bool {
        matches!(
            tokio::time::timeout(self.probe_timeout, TcpStream::connect(addr)).await,
            Ok(Ok(_))
        )
    }
}

#[async_trait]
impl PeerDiscovery for PortRangeDiscovery {
    async fn discover(&self) -> Vec<String> {
        let mut found = Vec::new();
        for addr in self.candidates() {
            if self.is_listening(addr).await {
                found.push(addr.to_string());
            } else {
                debug!(%addr, "no listener");
            }
        }
        found
    }
}
