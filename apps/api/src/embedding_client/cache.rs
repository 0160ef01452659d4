//! Embedding response cache, keyed by a hash of the (truncated) input text.
//!
//! Cache failures are never surfaced: a broken cache is a miss.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::warn;

#[async_trait]
pub trait EmbeddingCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<f32>>;
    async fn put(&self, key: &str, vector: &[f32]);
}

/// `emb:<model>:<sha256 hex of text>`
pub fn cache_key(model: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("emb:{model}:{:x}", hasher.finalize())
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

/// Bounded map with first-in-first-out eviction.
pub struct InMemoryEmbeddingCache {
    capacity: usize,
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
}

impl InMemoryEmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(MemoryInner::default()),
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }
}

#[async_trait]
impl EmbeddingCache for InMemoryEmbeddingCache {
    async fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.inner.lock().await.entries.get(key).cloned()
    }

    async fn put(&self, key: &str, vector: &[f32]) {
        let mut inner = self.inner.lock().await;
        if inner.entries.contains_key(key) {
            inner.entries.insert(key.to_string(), vector.to_vec());
            return;
        }
        while inner.entries.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
        inner.order.push_back(key.to_string());
        inner.entries.insert(key.to_string(), vector.to_vec());
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Redis
// ────────────────────────────────────────────────────────────────────────────

/// Vectors stored as JSON arrays with a TTL.
///
/// One multiplexed connection is shared by all callers and re-opened after a
/// failure. Every operation, connecting included, is bounded by `op_timeout`;
/// a slow or silent server reads as a miss.
pub struct RedisEmbeddingCache {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    ttl_secs: u64,
    op_timeout: Duration,
}

impl RedisEmbeddingCache {
    pub fn new(redis_url: &str, ttl_secs: u64, op_timeout: Duration) -> Result<Self, redis::RedisError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            conn: Mutex::new(None),
            ttl_secs: ttl_secs.max(1),
            op_timeout,
        })
    }

    async fn connection(&self) -> anyhow::Result<MultiplexedConnection> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn try_get(&self, key: &str) -> anyhow::Result<Option<Vec<f32>>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(key).await?;
        Ok(match raw {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        })
    }

    async fn try_put(&self, key: &str, vector: &[f32]) -> anyhow::Result<()> {
        let payload = serde_json::to_string(vector)?;
        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(key, payload, self.ttl_secs).await?;
        Ok(())
    }

    /// Runs `op` under the operation timeout. Any failure drops the shared
    /// connection so the next call reconnects.
    async fn bounded<T>(&self, op: impl Future<Output = anyhow::Result<T>>) -> anyhow::Result<T> {
        let result = match tokio::time::timeout(self.op_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "timed out after {}ms",
                self.op_timeout.as_millis()
            )),
        };
        if result.is_err() {
            self.conn.lock().await.take();
        }
        result
    }
}

#[async_trait]
impl EmbeddingCache for RedisEmbeddingCache {
    async fn get(&self, key: &str) -> Option<Vec<f32>> {
        match self.bounded(self.try_get(key)).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Embedding cache read failed, treating as miss: {e}");
                None
            }
        }
    }

    async fn put(&self, key: &str, vector: &[f32]) {
        if let Err(e) = self.bounded(self.try_put(key, vector)).await {
            warn!("Embedding cache write failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_shape() {
        let key = cache_key("text-embedding-3-small", "hello");
        assert_eq!(
            key,
            "emb:text-embedding-3-small:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_ne!(key, cache_key("other-model", "hello"));
    }

    #[tokio::test]
    async fn test_memory_cache_roundtrip() {
        let cache = InMemoryEmbeddingCache::new(4);
        assert_eq!(cache.get("a").await, None);
        cache.put("a", &[1.0, 2.0]).await;
        assert_eq!(cache.get("a").await, Some(vec![1.0, 2.0]));
    }

    #[tokio::test]
    async fn test_memory_cache_evicts_oldest() {
        let cache = InMemoryEmbeddingCache::new(2);
        cache.put("a", &[1.0]).await;
        cache.put("b", &[2.0]).await;
        cache.put("c", &[3.0]).await;
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("a").await, None);
        assert_eq!(cache.get("c").await, Some(vec![3.0]));
    }

    #[tokio::test]
    async fn test_memory_cache_overwrite_keeps_size() {
        let cache = InMemoryEmbeddingCache::new(2);
        cache.put("a", &[1.0]).await;
        cache.put("a", &[9.0]).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("a").await, Some(vec![9.0]));
    }

    #[tokio::test]
    async fn test_unreachable_redis_degrades_to_miss() {
        let cache =
            RedisEmbeddingCache::new("redis://127.0.0.1:1/", 60, Duration::from_millis(200)).unwrap();
        assert_eq!(cache.get("emb:m:x").await, None);
        cache.put("emb:m:x", &[1.0]).await;
    }

    #[tokio::test]
    async fn test_silent_redis_is_bounded_by_op_timeout() {
        // accepts connections, never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let cache =
            RedisEmbeddingCache::new(&format!("redis://{addr}/"), 60, Duration::from_millis(100)).unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(2), async {
            let hit = cache.get("emb:m:x").await;
            cache.put("emb:m:x", &[1.0]).await;
            hit
        })
        .await;
        assert_eq!(outcome.expect("cache calls must not hang"), None);
    }
}
