//! Configuration for the DNS server.
//!
//! Settings come from an optional TOML file and command-line overrides,
//! in that order of increasing priority, and are frozen into a
//! `ServerConfig` once at startup (or on reload).

use log::{error, info, warn};
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::errors::DnsError;
use crate::hosts::load_hosts;
use crate::records::RecordStore;
use crate::upstream::{default_upstreams, parse_upstreams, UpstreamServer};

/// Maximum size of DNS packets in bytes.
pub const MAX_PACKET_SIZE: usize = 4096;

/// TTL of answers built from local records, in seconds.
pub const DEFAULT_LOCAL_TTL: u32 = 0;

pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Unprivileged so the server can be tried without root.
pub const DEFAULT_PORT: u16 = 5353;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// A string or a list of strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Contents of the TOML configuration file.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub log_level: Option<String>,

    #[serde(default)]
    pub run: RunSection,

    /// Pattern to address(es), kept in file order.
    #[serde(default)]
    pub records: toml::Table,
}

/// The `[run]` table.
#[derive(Debug, Default, Deserialize)]
pub struct RunSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub upstream: Option<OneOrMany>,
    pub hosts_file: Option<PathBuf>,
    pub ttl: Option<u32>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub reload: bool,
}

impl ConfigFile {
    pub fn from_path(path: &Path) -> Result<Self, DnsError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            DnsError::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, DnsError> {
        toml::from_str(contents).map_err(|e| DnsError::Config(e.to_string()))
    }

    /// Log filter to start with. `--debug` wins over everything else.
    pub fn log_level(&self, overrides: &CliOverrides) -> String {
        if overrides.debug {
            return "debug".into();
        }
        let level = overrides
            .log_level
            .as_deref()
            .or(self.log_level.as_deref())
            .or(self.run.debug.then_some("debug"))
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_ascii_lowercase();

        match level.as_str() {
            "warning" => "warn".into(),
            "critical" | "fatal" => "error".into(),
            _ => level,
        }
    }
}

/// Values given on the command line. `None`/empty means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub upstreams: Vec<String>,
    pub records: Vec<String>,
    pub hosts_file: Option<PathBuf>,
    pub ttl: Option<u32>,
    pub log_level: Option<String>,
    pub debug: bool,
    pub reload: bool,
}

/// Immutable server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind_addr: SocketAddr,

    /// Upstreams in failover order.
    pub upstreams: Vec<UpstreamServer>,

    /// Local records.
    pub records: RecordStore,

    /// TTL for locally answered records.
    pub local_ttl: u32,

    /// Whether to watch the source files and rebuild on change.
    pub reload: bool,

    pub config_path: Option<PathBuf>,

    pub hosts_file: Option<PathBuf>,
}

impl ServerConfig {
    /// Read the config file (if any) and apply overrides.
    pub fn load(config_path: Option<&Path>, overrides: &CliOverrides) -> Result<Self, DnsError> {
        let file = match config_path {
            Some(path) => ConfigFile::from_path(path)?,
            None => ConfigFile::default(),
        };
        Self::build(file, config_path, overrides)
    }

    /// Merge an already parsed config file with overrides.
    ///
    /// Records are inserted config table first, then hosts file, then
    /// `--record` arguments, which fixes wildcard precedence.
    pub fn build(
        file: ConfigFile,
        config_path: Option<&Path>,
        overrides: &CliOverrides,
    ) -> Result<Self, DnsError> {
        let host = overrides
            .host
            .clone()
            .or(file.run.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = overrides.port.or(file.run.port).unwrap_or(DEFAULT_PORT);
        let ip: IpAddr = host
            .parse()
            .map_err(|_| DnsError::Config(format!("invalid host address: {host}")))?;

        let upstreams = if !overrides.upstreams.is_empty() {
            parse_upstreams(&overrides.upstreams)
        } else {
            match file.run.upstream {
                Some(specs) => parse_upstreams(specs.into_vec()),
                None => default_upstreams(),
            }
        };

        let mut records = RecordStore::new();
        for (pattern, value) in file.records {
            match value.try_into::<OneOrMany>() {
                Ok(addrs) => insert_addrs(&mut records, &pattern, addrs.into_vec()),
                Err(_) => warn!("Ignoring record {}: expected an address or a list", pattern),
            }
        }

        let hosts_file = overrides.hosts_file.clone().or(file.run.hosts_file);
        if let Some(path) = &hosts_file {
            match load_hosts(path) {
                Ok(entries) => {
                    info!("Loaded {} hosts entries from {}", entries.len(), path.display());
                    for (name, ip) in entries {
                        records.insert(&name, [ip]);
                    }
                }
                Err(e) => error!("{}", e),
            }
        }

        for arg in &overrides.records {
            match parse_record_arg(arg) {
                Some((pattern, addr)) => insert_addrs(&mut records, pattern, [addr.to_string()]),
                None => warn!("Invalid record format '{}'. Expected 'domain=ip'.", arg),
            }
        }

        Ok(Self {
            bind_addr: SocketAddr::new(ip, port),
            upstreams,
            records,
            local_ttl: overrides.ttl.or(file.run.ttl).unwrap_or(DEFAULT_LOCAL_TTL),
            reload: overrides.reload || file.run.reload,
            config_path: config_path.map(Path::to_path_buf),
            hosts_file,
        })
    }
}

/// Split a `domain=ip` command-line record.
pub fn parse_record_arg(arg: &str) -> Option<(&str, &str)> {
    let (domain, addr) = arg.split_once('=')?;
    let (domain, addr) = (domain.trim(), addr.trim());
    if domain.is_empty() || addr.is_empty() {
        return None;
    }
    Some((domain, addr))
}

fn insert_addrs<I, S>(records: &mut RecordStore, pattern: &str, addrs: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parsed: Vec<IpAddr> = addrs
        .into_iter()
        .filter_map(|addr| match addr.as_ref().parse() {
            Ok(ip) => Some(ip),
            Err(_) => {
                warn!("Ignoring address '{}' for {}", addr.as_ref(), pattern);
                None
            }
        })
        .collect();

    if !parsed.is_empty() {
        records.insert(pattern, parsed);
    }
}
