//! Upstream server descriptors.
//!
//! Upstreams are configured as `server <address> [--group <g>] [--proxy <p>]`
//! and tried in order by the resolver.

use log::warn;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::errors::DnsError;

/// Upstream used when the configuration does not provide a list.
pub const DEFAULT_UPSTREAM: IpAddr = IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1));

/// A configured upstream resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamServer {
    /// Address queried on port 53.
    pub address: IpAddr,

    /// Classification tag. Kept for routing, not consulted when resolving.
    pub group: Option<String>,

    /// Proxy to reach the upstream through. Not used by the forwarder yet.
    pub proxy: Option<String>,
}

impl UpstreamServer {
    pub fn new(address: IpAddr) -> Self {
        Self {
            address,
            group: None,
            proxy: None,
        }
    }
}

impl FromStr for UpstreamServer {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |why: &str| DnsError::Config(format!("invalid upstream '{s}': {why}"));

        let mut tokens = s.split_whitespace();
        if tokens.next() != Some("server") {
            return Err(malformed("expected 'server <address>'"));
        }

        let address = tokens
            .next()
            .ok_or_else(|| malformed("missing address"))?
            .parse::<IpAddr>()
            .map_err(|e| malformed(&e.to_string()))?;

        let mut server = UpstreamServer::new(address);
        while let Some(flag) = tokens.next() {
            let slot = match flag {
                "--group" => &mut server.group,
                "--proxy" => &mut server.proxy,
                other => return Err(malformed(&format!("unknown option {other}"))),
            };
            let value = tokens
                .next()
                .ok_or_else(|| malformed(&format!("{flag} needs a value")))?;
            *slot = Some(value.to_string());
        }

        Ok(server)
    }
}

impl fmt::Display for UpstreamServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server {}", self.address)?;
        if let Some(group) = &self.group {
            write!(f, " --group {group}")?;
        }
        if let Some(proxy) = &self.proxy {
            write!(f, " --proxy {proxy}")?;
        }
        Ok(())
    }
}

/// Parse upstream specs, dropping malformed ones with a warning.
pub fn parse_upstreams<I, S>(specs: I) -> Vec<UpstreamServer>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    specs
        .into_iter()
        .filter_map(|spec| match spec.as_ref().parse() {
            Ok(server) => Some(server),
            Err(e) => {
                warn!("Ignoring upstream: {}", e);
                None
            }
        })
        .collect()
}

/// The list used when nothing is configured.
pub fn default_upstreams() -> Vec<UpstreamServer> {
    vec![UpstreamServer::new(DEFAULT_UPSTREAM)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_group_and_proxy() {
        let server: UpstreamServer = "server 1.1.1.1 --group china --proxy 127.0.0.1:1080"
            .parse()
            .unwrap();

        assert_eq!(server.address, "1.1.1.1".parse::<IpAddr>().unwrap());
        assert_eq!(server.group.as_deref(), Some("china"));
        assert_eq!(server.proxy.as_deref(), Some("127.0.0.1:1080"));
    }

    #[test]
    fn options_are_optional_and_unordered() {
        let basic: UpstreamServer = "server 114.114.114.114".parse().unwrap();
        assert_eq!(basic, UpstreamServer::new("114.114.114.114".parse().unwrap()));

        let proxy_only: UpstreamServer = "server 9.9.9.9 --proxy 10.0.0.1:8080".parse().unwrap();
        assert_eq!(proxy_only.group, None);
        assert_eq!(proxy_only.proxy.as_deref(), Some("10.0.0.1:8080"));

        let swapped: UpstreamServer = "server 8.8.8.8 --proxy p --group g".parse().unwrap();
        assert_eq!(swapped.group.as_deref(), Some("g"));
        assert_eq!(swapped.proxy.as_deref(), Some("p"));
    }

    #[test]
    fn accepts_ipv6_address() {
        let server: UpstreamServer = "server 2606:4700:4700::1111".parse().unwrap();
        assert!(server.address.is_ipv6());
    }

    #[test]
    fn rejects_malformed_specs() {
        for spec in [
            "8.8.8.8",
            "invalid format",
            "server",
            "server dns.google",
            "server 8.8.8.8 --group",
            "server 8.8.8.8 --weight 3",
            "",
        ] {
            assert!(spec.parse::<UpstreamServer>().is_err(), "{spec}");
        }
    }

    #[test]
    fn parse_upstreams_drops_bare_addresses() {
        let servers = parse_upstreams(["server 1.1.1.1 --group china", "8.8.8.8"]);

        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].group.as_deref(), Some("china"));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let spec = "server 1.1.1.1 --group china --proxy 127.0.0.1:1080";
        let server: UpstreamServer = spec.parse().unwrap();
        assert_eq!(server.to_string(), spec);
    }
}
