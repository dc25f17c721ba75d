//! Forwarding of queries to a single upstream over UDP.
//!
//! Each call owns a fresh socket for the lifetime of one exchange; nothing
//! is pooled or shared between queries.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::config::MAX_PACKET_SIZE;
use crate::errors::ForwardError;

/// Port upstream resolvers are queried on.
pub const UPSTREAM_PORT: u16 = 53;

/// How long to wait for an upstream reply.
pub const FORWARD_TIMEOUT: Duration = Duration::from_secs(2);

/// Sends raw queries to one upstream and returns its raw reply.
#[derive(Debug, Clone, Copy)]
pub struct Forwarder {
    port: u16,
    timeout: Duration,
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new(UPSTREAM_PORT, FORWARD_TIMEOUT)
    }
}

impl Forwarder {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forward `query` to `upstream` and wait for one reply.
    ///
    /// The first datagram received on the connected socket is returned as
    /// is; its transaction ID and question are not checked against the query.
    pub async fn forward(&self, query: &[u8], upstream: IpAddr) -> Result<Vec<u8>, ForwardError> {
        let unreachable = |e: io::Error| ForwardError::Unreachable(upstream, e);

        let local: SocketAddr = match upstream {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await.map_err(unreachable)?;
        socket
            .connect((upstream, self.port))
            .await
            .map_err(unreachable)?;
        socket.send(query).await.map_err(unreachable)?;

        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let len = timeout(self.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| ForwardError::Timeout(upstream))?
            .map_err(unreachable)?;
        buf.truncate(len);

        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn returns_reply_bytes_verbatim() {
        let upstream = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
        let port = upstream.local_addr().unwrap().port();

        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (len, src) = upstream.recv_from(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], b"query");
            upstream.send_to(b"not even dns", src).await.unwrap();
        });

        let forwarder = Forwarder::new(port, Duration::from_secs(1));
        let reply = forwarder.forward(b"query", LOCALHOST).await.unwrap();

        assert_eq!(reply, b"not even dns");
    }

    #[tokio::test]
    async fn silent_upstream_times_out_after_two_seconds() {
        let upstream = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
        let port = upstream.local_addr().unwrap().port();

        let forwarder = Forwarder::new(port, FORWARD_TIMEOUT);
        let started = Instant::now();
        let err = forwarder.forward(b"query", LOCALHOST).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, ForwardError::Timeout(addr) if addr == LOCALHOST));
        assert!(elapsed >= Duration::from_millis(1900), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "{elapsed:?}");
        drop(upstream);
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let probe = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let forwarder = Forwarder::new(port, Duration::from_secs(1));
        let err = forwarder.forward(b"query", LOCALHOST).await.unwrap_err();

        assert!(matches!(err, ForwardError::Unreachable(addr, _) if addr == LOCALHOST));
        assert_eq!(err.upstream(), LOCALHOST);
    }

    #[test]
    fn defaults_target_port_53() {
        let forwarder = Forwarder::default();
        assert_eq!(forwarder.port(), 53);
        assert_eq!(forwarder.timeout(), Duration::from_secs(2));
    }
}
