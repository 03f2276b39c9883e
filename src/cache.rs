use crate::status::QueryResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// TTL-bounded memo of query results, keyed by server id.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// The cached result, only while it is still fresh.
    async fn get(&self, server_id: &str) -> Option<QueryResult>;

    async fn set(&self, server_id: &str, result: QueryResult, ttl: Duration);

    async fn clear(&self);
}

#[derive(Clone)]
struct CachedResponse {
    data: QueryResult,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CachedResponse>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops expired entries, returning how many went.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, cached| cached.expires_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, server_id: &str) -> Option<QueryResult> {
        let entries = self.entries.read().await;
        entries
            .get(server_id)
            .filter(|cached| cached.expires_at > Instant::now())
            .map(|cached| cached.data.clone())
    }

    async fn set(&self, server_id: &str, result: QueryResult, ttl: Duration) {
        let cached = CachedResponse {
            data: result,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(server_id.to_string(), cached);
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ServerDescriptor;
    use crate::error::QueryError;

    fn result() -> QueryResult {
        let server = ServerDescriptor::new("1", "csgo", "h", 27015);
        QueryResult::offline(&server, &QueryError::PortClosed(27015))
    }

    #[tokio::test]
    async fn fresh_entries_are_returned() {
        let cache = MemoryCache::new();
        let stored = result();
        cache.set("1", stored.clone(), Duration::from_secs(60)).await;
        assert_eq!(cache.get("1").await, Some(stored));
        assert_eq!(cache.get("2").await, None);
    }

    #[tokio::test]
    async fn expired_entries_are_invisible_and_purged() {
        let cache = MemoryCache::new();
        cache.set("1", result(), Duration::from_millis(0)).await;
        cache.set("2", result(), Duration::from_secs(60)).await;
        assert_eq!(cache.get("1").await, None);
        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }
}
