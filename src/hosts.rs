//! Hosts-file loading.
//!
//! Lines look like `IP name1 [name2 ...]`. Blank lines and `#` comments are
//! skipped, an inline `#` ends the name list, and lines whose first field is
//! not an IP address are ignored.

use log::debug;
use std::fs;
use std::net::IpAddr;
use std::path::Path;

use crate::errors::DnsError;

/// Parse hosts-file content into `(name, address)` pairs in file order.
pub fn parse_hosts(content: &str) -> Vec<(String, IpAddr)> {
    let mut entries = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let Some(Ok(ip)) = fields.next().map(str::parse::<IpAddr>) else {
            debug!("Skipping hosts line: {}", line);
            continue;
        };

        for name in fields.take_while(|field| !field.starts_with('#')) {
            entries.push((name.to_string(), ip));
        }
    }

    entries
}

/// Read and parse a hosts file.
pub fn load_hosts(path: &Path) -> Result<Vec<(String, IpAddr)>, DnsError> {
    let content = fs::read_to_string(path).map_err(|e| {
        DnsError::Config(format!("cannot read hosts file {}: {}", path.display(), e))
    })?;
    let entries = parse_hosts(&content);
    debug!("Parsed {} hosts entries from {}", entries.len(), path.display());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HOSTS: &str = r#"
    # Comments are ignored
    127.0.0.1  localhost mypc
    ::1        localhost
    192.168.1.5 server.local
    192.168.1.1 router gateway # inline comment
    not-an-ip   broken.local
    10.0.0.1
"#;

    #[test]
    fn parses_names_in_file_order() {
        let entries = parse_hosts(HOSTS);
        let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();

        assert_eq!(
            names,
            ["localhost", "mypc", "localhost", "server.local", "router", "gateway"]
        );
        assert_eq!(entries[1].1, "127.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(entries[2].1, "::1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(HOSTS.as_bytes()).unwrap();

        let entries = load_hosts(file.path()).unwrap();
        assert!(entries
            .iter()
            .any(|(name, ip)| name == "server.local" && ip.to_string() == "192.168.1.5"));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = load_hosts(Path::new("non_existent_file")).unwrap_err();
        assert!(matches!(err, DnsError::Config(_)));
    }
}
