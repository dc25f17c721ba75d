//! UDP request handling.
//!
//! The listener hands every datagram to its own task so a slow upstream
//! never holds up other clients. Responses go back through the same socket.

use arc_swap::ArcSwap;
use log::{debug, error, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::UdpSocket, task};

use crate::config::MAX_PACKET_SIZE;
use crate::errors::DnsError;
use crate::resolver::Resolver;

/// The resolver currently in service. Reloads swap it as a whole.
pub type SharedResolver = Arc<ArcSwap<Resolver>>;

/// Wrap a resolver for use by the listener and the reloader.
pub fn shared(resolver: Resolver) -> SharedResolver {
    Arc::new(ArcSwap::from_pointee(resolver))
}

/// UDP DNS listener.
pub struct UdpServer {
    socket: Arc<UdpSocket>,
    resolver: SharedResolver,
}

impl UdpServer {
    pub async fn bind(addr: SocketAddr, resolver: SharedResolver) -> Result<Self, DnsError> {
        let socket = UdpSocket::bind(addr).await?;
        info!("UDP DNS server listening on {}", socket.local_addr()?);
        Ok(Self {
            socket: Arc::new(socket),
            resolver,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DnsError> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve until the process exits.
    pub async fn run(self) -> Result<(), DnsError> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` completes.
    ///
    /// Tasks already dispatched keep their handle on the socket and finish
    /// on their own; their lifetime is bounded by the forwarding timeout.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), DnsError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let local = self.socket.local_addr()?;
        let mut buf = vec![0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("UDP DNS server on {} stopping", local);
                    return Ok(());
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((amt, src)) => {
                        let query = buf[..amt].to_vec();
                        let socket = self.socket.clone();
                        let resolver = self.resolver.load_full();
                        task::spawn(async move {
                            if let Err(e) = handle_udp_query(query, src, socket, resolver).await {
                                warn!("UDP query error from {}: {}", src, e);
                            }
                        });
                    }
                    Err(e) => error!("UDP receive error: {}", e),
                }
            }
        }
    }
}

/// Resolve one datagram and send the answer back to `src`.
///
/// Malformed queries are dropped without a reply.
pub async fn handle_udp_query(
    query: Vec<u8>,
    src: SocketAddr,
    socket: Arc<UdpSocket>,
    resolver: Arc<Resolver>,
) -> Result<(), DnsError> {
    let response = match resolver.resolve(&query).await {
        Ok(response) => response,
        Err(DnsError::MalformedQuery(reason)) => {
            warn!("Dropping malformed query from {}: {}", src, reason);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    socket.send_to(&response, src).await?;
    debug!("Answered {} with {} bytes", src, response.len());
    Ok(())
}
