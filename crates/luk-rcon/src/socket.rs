//! Platform-portable UDP socket wrapper with `select`-style readiness and
//! receive-side peer filtering.

use luk_core::wire::MAX_FRAME_SIZE;
use luk_core::{LukError, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

/// A UDP socket bound to talk to exactly one remote peer.
pub struct RconSocket {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl RconSocket {
    /// Bind an ephemeral local socket and record the remote peer address
    /// datagrams must originate from.
    pub async fn connect(peer: SocketAddr) -> Result<Self> {
        let local_addr: SocketAddr = if peer.is_ipv6() {
            "[::]:0".parse().unwrap()
        } else {
            "0.0.0.0:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(local_addr).await?;
        Ok(Self { socket, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Send a datagram to the configured peer.
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        self.socket.send_to(data, self.peer).await?;
        Ok(())
    }

    /// Wait up to `timeout` for a single datagram from the configured
    /// peer. Datagrams from any other address are logged and dropped, and
    /// the wait continues until `timeout` elapses.
    pub async fn recv(&self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut buf = vec![0u8; MAX_FRAME_SIZE];

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            let recv_result = tokio::time::timeout(remaining, self.socket.recv_from(&mut buf)).await;
            let (len, from) = match recv_result {
                Ok(inner) => inner?,
                Err(_elapsed) => return Ok(None),
            };

            if from != self.peer {
                debug!(%from, expected = %self.peer, "dropping datagram from unexpected address");
                continue;
            }

            return Ok(Some(buf[..len].to_vec()));
        }
    }
}

/// Resolve a `host:port` pair the way `server_address`/`server_port`
/// config keys are combined.
pub fn resolve_peer(address: &str, port: u16) -> Result<SocketAddr> {
    use std::net::ToSocketAddrs;
    format!("{address}:{port}")
        .to_socket_addrs()
        .map_err(|e| LukError::Configuration(format!("cannot resolve {address}:{port}: {e}")))?
        .next()
        .ok_or_else(|| LukError::Configuration(format!("no address found for {address}:{port}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recv_filters_by_peer_address() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();

        let stranger = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let client = RconSocket::connect(server_addr).await.unwrap();

        stranger.send_to(b"not the server", client.socket.local_addr().unwrap()).await.unwrap();
        server.send_to(b"from the server", client.socket.local_addr().unwrap()).await.unwrap();

        let received = client
            .recv(Duration::from_millis(500))
            .await
            .unwrap()
            .expect("should receive the legitimate datagram");
        assert_eq!(received, b"from the server");
    }

    #[tokio::test]
    async fn recv_times_out_with_no_traffic() {
        let server_addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let client = RconSocket::connect(server_addr).await.unwrap();
        let result = client.recv(Duration::from_millis(50)).await.unwrap();
        assert!(result.is_none());
    }
}
