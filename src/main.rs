//! OwlDNS server
//!
//! Answers DNS queries from local records and forwards the rest to
//! upstream servers.

use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use tokio::{signal, task};

use owldns::{
    config::{CliOverrides, ConfigFile, ServerConfig},
    errors::DnsError,
    handlers::{shared, UdpServer},
    reload::{watch, RELOAD_POLL_INTERVAL},
    resolver::Resolver,
};

#[derive(Parser, Debug)]
#[command(name = "owldns")]
#[command(about = "OwlDNS - A lightweight async DNS server", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind (default: 127.0.0.1)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (default: 5353)
    #[arg(short, long)]
    port: Option<u16>,

    /// Upstream server, e.g. "server 1.1.1.1 --group intl" (repeatable)
    #[arg(short, long = "upstream", value_name = "SPEC")]
    upstreams: Vec<String>,

    /// Static record as domain=ip (repeatable)
    #[arg(short, long = "record", value_name = "DOMAIN=IP")]
    records: Vec<String>,

    /// Hosts-style file with additional records
    #[arg(long)]
    hosts_file: Option<PathBuf>,

    /// TTL of locally answered records, in seconds
    #[arg(long)]
    ttl: Option<u32>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    debug: bool,

    /// Reload when the config or hosts file changes
    #[arg(long)]
    reload: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            host: self.host.clone(),
            port: self.port,
            upstreams: self.upstreams.clone(),
            records: self.records.clone(),
            hosts_file: self.hosts_file.clone(),
            ttl: self.ttl,
            log_level: self.log_level.clone(),
            debug: self.debug,
            reload: self.reload,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), DnsError> {
    let args = Args::parse();
    let overrides = args.overrides();

    let file = match &args.config {
        Some(path) => ConfigFile::from_path(path)?,
        None => ConfigFile::default(),
    };

    // Initialize the logger
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(file.log_level(&overrides)),
    )
    .format_timestamp_micros()
    .init();

    let config = ServerConfig::build(file, args.config.as_deref(), &overrides)?;
    let resolver = shared(Resolver::from_config(&config));

    info!(
        "OwlDNS starting on {} ({} local records)",
        config.bind_addr,
        config.records.len()
    );
    for upstream in &config.upstreams {
        info!("Upstream: {}", upstream);
    }

    let server = UdpServer::bind(config.bind_addr, resolver.clone()).await?;

    let reloader = config
        .reload
        .then(|| task::spawn(watch(config.clone(), overrides, resolver, RELOAD_POLL_INTERVAL)));

    // Set up shutdown signal handler
    let shutdown_signal = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    };

    server.run_until(shutdown_signal).await?;

    if let Some(reloader) = reloader {
        reloader.abort();
    }
    info!("OwlDNS stopped.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_flags_collect_in_order() {
        let args = Args::try_parse_from([
            "owldns",
            "--port",
            "5300",
            "--record",
            "test.com=1.1.1.1",
            "-r",
            "*.wild.test=10.10.10.10",
            "--upstream",
            "server 9.9.9.9 --group intl",
            "--reload",
        ])
        .unwrap();
        let overrides = args.overrides();

        assert_eq!(overrides.port, Some(5300));
        assert_eq!(overrides.records, ["test.com=1.1.1.1", "*.wild.test=10.10.10.10"]);
        assert_eq!(overrides.upstreams, ["server 9.9.9.9 --group intl"]);
        assert!(overrides.reload);
        assert!(overrides.host.is_none());
    }

    #[test]
    fn no_flags_means_no_overrides() {
        let args = Args::try_parse_from(["owldns"]).unwrap();
        let overrides = args.overrides();

        assert!(overrides.records.is_empty());
        assert!(overrides.upstreams.is_empty());
        assert!(!overrides.debug);
    }
}
