//! OwlDNS library
//!
//! A lightweight DNS server: queries are answered from local records when
//! possible and forwarded to an ordered list of upstream resolvers
//! otherwise.

pub mod config;
pub mod errors;
pub mod forwarder;
pub mod handlers;
pub mod hosts;
pub mod records;
pub mod reload;
pub mod resolver;
pub mod upstream;

// Re-export commonly used items
pub use config::ServerConfig;
pub use errors::{DnsError, ForwardError};
pub use handlers::{SharedResolver, UdpServer};
pub use records::RecordStore;
pub use resolver::Resolver;
pub use upstream::UpstreamServer;
