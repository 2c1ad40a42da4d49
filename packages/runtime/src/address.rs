//! Local address discovery for self-registration.
//!
//! A host can have several interfaces, and the only address guaranteed to be
//! reachable from the directory's vantage point is the one the OS would use
//! to reach the directory.  [`LocalAddressResolver::resolve`] asks the OS for
//! that route by associating an unconnected UDP socket with the directory
//! host (no datagram is sent) and reading back the socket's local address.
//!
//! Resolution never fails: on any network error it falls back to
//! `127.0.0.1` and logs a warning.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, warn};

/// Picks the outward-facing address of this host.
#[derive(Debug, Clone, Copy)]
pub struct LocalAddressResolver {
    port: u16,
}

impl LocalAddressResolver {
    /// `port` is used only to form the association; nothing is sent to it.
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// The local address the OS would use to reach `directory_host`, or
    /// `127.0.0.1` when that cannot be determined.
    pub async fn resolve(&self, directory_host: &str) -> IpAddr {
        settle(self.route_towards(directory_host).await, directory_host)
    }

    async fn route_towards(&self, host: &str) -> std::io::Result<IpAddr> {
        let target = lookup_host((host, self.port))
            .await?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, format!("no address for {host}"))
            })?;

        let bind: SocketAddr = match target {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(bind).await?;
        socket.connect(target).await?;
        Ok(socket.local_addr()?.ip())
    }
}

/// Turn the outcome of a route lookup into an address, falling back to
/// loopback when there is no usable route.
fn settle(route: std::io::Result<IpAddr>, host: &str) -> IpAddr {
    match route {
        Ok(addr) if !addr.is_unspecified() => {
            debug!("address: {addr} routes towards {host}");
            addr
        }
        Ok(addr) => {
            warn!("address: unspecified address {addr} towards {host}, returning 127.0.0.1");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
        Err(e) => {
            warn!("address: no route towards {host}, returning 127.0.0.1: {e}");
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
