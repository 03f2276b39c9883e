//! Caller-side glue around the engine: registry lookups, cache read-through,
//! connect links, request statistics and concurrent polling.

use crate::cache::ResultCache;
use crate::descriptor::ServerDescriptor;
use crate::engine::QueryEngine;
use crate::error::{EngineError, EngineResult};
use crate::link::connect_link;
use crate::registry::{ServerFilter, ServerRegistry};
use crate::status::QueryResult;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub server_id: String,
    #[serde(flatten)]
    pub result: QueryResult,
    pub from_cache: bool,
    pub connect_link: String,
}

struct Stats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    cache_hits: AtomicU64,
    start_time: SystemTime,
}

impl Stats {
    fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            start_time: SystemTime::now(),
        }
    }

    fn record_request(&self, online: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if online {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cache_hits: u64,
    pub success_rate: f64,
}

struct WorkItem {
    index: usize,
    server: ServerDescriptor,
}

#[derive(Clone)]
pub struct StatusService {
    engine: Arc<QueryEngine>,
    registry: Arc<dyn ServerRegistry>,
    cache: Option<Arc<dyn ResultCache>>,
    cache_ttl: Duration,
    stats: Arc<Stats>,
}

impl StatusService {
    pub fn new(engine: Arc<QueryEngine>, registry: Arc<dyn ServerRegistry>) -> Self {
        Self {
            engine,
            registry,
            cache: None,
            cache_ttl: Duration::ZERO,
            stats: Arc::new(Stats::new()),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>, ttl: Duration) -> Self {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        self
    }

    /// Status of one registered server, served from cache while fresh.
    pub async fn status(&self, server_id: &str) -> EngineResult<StatusReport> {
        let server_id = server_id.trim();
        if server_id.is_empty() {
            return Err(EngineError::InvalidInput("missing server id".to_string()));
        }
        let server = self
            .registry
            .get_server(server_id)
            .ok_or_else(|| EngineError::NotFound(server_id.to_string()))?;
        self.status_for(&server).await
    }

    /// Status of an ad-hoc descriptor, bypassing the cache. Used to test a
    /// configuration before it is saved.
    pub async fn test_server(&self, server: &ServerDescriptor) -> EngineResult<StatusReport> {
        let result = self.engine.query(server).await?;
        self.stats.record_request(result.online);
        Ok(report(server, result, false))
    }

    async fn status_for(&self, server: &ServerDescriptor) -> EngineResult<StatusReport> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&server.id).await {
                self.stats.record_cache_hit();
                return Ok(report(server, cached, true));
            }
        }

        let result = self.engine.query(server).await?;
        self.stats.record_request(result.online);

        if let Some(cache) = &self.cache {
            cache.set(&server.id, result.clone(), self.cache_ttl).await;
        }
        Ok(report(server, result, false))
    }

    /// Queries every matching server with at most `workers` queries in flight.
    /// Reports come back in registry order. Dropping the returned future aborts
    /// the workers and with them any open sockets.
    pub async fn poll(&self, filter: &ServerFilter, workers: usize) -> Vec<StatusReport> {
        let servers = self.registry.list_servers(filter);
        let total = servers.len();
        if total == 0 {
            return Vec::new();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for (index, server) in servers.into_iter().enumerate() {
            // receiver is alive until the workers exit
            let _ = tx.send(WorkItem { index, server });
        }
        drop(tx);

        let rx = Arc::new(Mutex::new(rx));
        let mut pool = JoinSet::new();
        for id in 0..workers.clamp(1, total) {
            let service = self.clone();
            let rx = Arc::clone(&rx);
            pool.spawn(async move { service.worker_task(id, rx).await });
        }

        let mut slots: Vec<Option<StatusReport>> = vec![None; total];
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(done) => {
                    for (index, report) in done {
                        slots[index] = Some(report);
                    }
                }
                Err(e) => warn!("poll worker died: {}", e),
            }
        }
        slots.into_iter().flatten().collect()
    }

    async fn worker_task(
        &self,
        id: usize,
        rx: Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>,
    ) -> Vec<(usize, StatusReport)> {
        let mut done = Vec::new();

        loop {
            let item = {
                let mut rx_guard = rx.lock().await;
                rx_guard.recv().await
            };

            let Some(work) = item else {
                break;
            };

            let start = Instant::now();
            match self.status_for(&work.server).await {
                Ok(report) => {
                    info!(
                        "Worker {} checked {}: {} ({}ms)",
                        id,
                        work.server.id,
                        if report.result.online { "online" } else { "offline" },
                        start.elapsed().as_millis()
                    );
                    done.push((work.index, report));
                }
                Err(e) => warn!("Worker {} skipped {}: {}", id, work.server.id, e),
            }
        }

        done
    }

    pub fn stats(&self) -> StatsSnapshot {
        let total = self.stats.total_requests.load(Ordering::Relaxed);
        let successful = self.stats.successful_requests.load(Ordering::Relaxed);
        let success_rate = if total > 0 {
            (successful as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        StatsSnapshot {
            uptime_seconds: self.stats.start_time.elapsed().unwrap_or_default().as_secs(),
            total_requests: total,
            successful_requests: successful,
            failed_requests: self.stats.failed_requests.load(Ordering::Relaxed),
            cache_hits: self.stats.cache_hits.load(Ordering::Relaxed),
            success_rate,
        }
    }
}

fn report(server: &ServerDescriptor, result: QueryResult, from_cache: bool) -> StatusReport {
    StatusReport {
        server_id: server.id.clone(),
        result,
        from_cache,
        connect_link: connect_link(server),
    }
}
