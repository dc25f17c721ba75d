//! Error types for the DNS server.
//!
//! `DnsError` covers everything the server can surface to its caller.
//! `ForwardError` is the outcome of a single upstream attempt and never
//! leaves the resolver's failover loop.

use std::io;
use std::net::IpAddr;
use thiserror::Error;

/// Represents errors that can occur in the DNS server.
#[derive(Error, Debug)]
pub enum DnsError {
    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors raised by the codec while building a response.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The incoming datagram could not be parsed as a DNS query.
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure of a single forwarding attempt against one upstream.
#[derive(Error, Debug)]
pub enum ForwardError {
    /// No reply arrived within the forwarding timeout.
    #[error("upstream {0} timed out")]
    Timeout(IpAddr),

    /// Transport-level failure (unreachable host, refused, socket error).
    #[error("upstream {0} unreachable: {1}")]
    Unreachable(IpAddr, #[source] io::Error),
}

impl ForwardError {
    /// The upstream this failure belongs to.
    pub fn upstream(&self) -> IpAddr {
        match self {
            ForwardError::Timeout(addr) | ForwardError::Unreachable(addr, _) => *addr,
        }
    }
}
