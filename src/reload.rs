//! Reload on configuration change.
//!
//! Polls the config file and hosts file for modification and swaps in a
//! freshly built resolver when either changes. Queries already in flight
//! finish against the resolver they started with.

use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::config::{CliOverrides, ServerConfig};
use crate::handlers::SharedResolver;
use crate::resolver::Resolver;

/// How often the watched files are checked.
pub const RELOAD_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Watch the files `config` was built from and rebuild on change.
///
/// Runs until the task is aborted. A failed rebuild keeps the resolver
/// that is currently in service.
pub async fn watch(
    config: ServerConfig,
    overrides: CliOverrides,
    resolver: SharedResolver,
    interval: Duration,
) {
    let mut watched = watched_paths(&config);
    let mut stamps = modified_times(&watched).await;
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;

    info!("Watching {:?} for changes", watched);

    loop {
        ticker.tick().await;

        let current = modified_times(&watched).await;
        if current == stamps {
            continue;
        }
        stamps = current;

        match ServerConfig::load(config.config_path.as_deref(), &overrides) {
            Ok(fresh) => {
                if fresh.bind_addr != config.bind_addr {
                    warn!(
                        "Bind address changed to {}; restart to apply",
                        fresh.bind_addr
                    );
                }
                info!(
                    "Configuration reloaded: {} records, {} upstreams",
                    fresh.records.len(),
                    fresh.upstreams.len()
                );
                resolver.store(Arc::new(Resolver::from_config(&fresh)));

                watched = watched_paths(&fresh);
                stamps = modified_times(&watched).await;
            }
            Err(e) => error!("Reload failed, keeping previous configuration: {}", e),
        }
    }
}

fn watched_paths(config: &ServerConfig) -> Vec<PathBuf> {
    config
        .config_path
        .iter()
        .chain(config.hosts_file.iter())
        .cloned()
        .collect()
}

async fn modified_times(paths: &[PathBuf]) -> Vec<Option<SystemTime>> {
    let mut stamps = Vec::with_capacity(paths.len());
    for path in paths {
        let stamp = tokio::fs::metadata(path)
            .await
            .and_then(|meta| meta.modified())
            .ok();
        stamps.push(stamp);
    }
    stamps
}
