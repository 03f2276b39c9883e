use anyhow::{Context, Result};
use gameping::cache::MemoryCache;
use gameping::config::Config;
use gameping::protocol::display_name;
use gameping::registry::{ServerFilter, StaticRegistry};
use gameping::service::{StatusReport, StatusService};
use gameping::QueryEngine;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = Config::path_from(std::env::args().nth(1));
    let config = Config::load(&path)?;
    info!("Loaded {} servers from {}", config.servers.len(), path.display());

    let engine = QueryEngine::from_config(&config).context("building query engine")?;
    if engine.has_backend() {
        info!("Enhanced backend active");
    } else {
        info!("Using built-in queries only");
    }

    let registry = Arc::new(StaticRegistry::new(config.servers.clone()));
    let mut service = StatusService::new(Arc::new(engine), registry);
    let cache = Arc::new(MemoryCache::new());
    if config.cache.enabled {
        service = service.with_cache(cache.clone(), Duration::from_secs(config.cache.ttl_secs));
    }

    let filter = ServerFilter::default();
    if config.poller.interval_secs == 0 {
        poll_once(&service, &filter, config.poller.workers).await?;
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(config.poller.interval_secs));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let purged = cache.purge_expired().await;
                if purged > 0 {
                    info!("Purged {} expired cache entries", purged);
                }
                poll_once(&service, &filter, config.poller.workers).await?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

async fn poll_once(service: &StatusService, filter: &ServerFilter, workers: usize) -> Result<()> {
    let reports = service.poll(filter, workers).await;
    for report in &reports {
        println!("{}", serde_json::to_string(report).context("encoding report")?);
        info!("{}", summary_line(report));
    }

    let stats = service.stats();
    info!(
        "{} online, {} offline, {} from cache ({:.1}% success)",
        stats.successful_requests, stats.failed_requests, stats.cache_hits, stats.success_rate
    );
    Ok(())
}

fn summary_line(report: &StatusReport) -> String {
    let result = &report.result;
    if result.online {
        format!(
            "[ONLINE] {} ({}) {}/{} {}",
            result.hostname,
            display_name(&result.server_type),
            result.current_players,
            result.max_players,
            result.map_name
        )
    } else {
        format!(
            "[OFFLINE] {} ({}): {}",
            if result.hostname.is_empty() { &report.server_id } else { &result.hostname },
            display_name(&result.server_type),
            result.error_message.as_deref().unwrap_or("unknown error")
        )
    }
}
