use super::{DedupRecord, DedupStore};
use crate::error::DedupError;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

/// Redis-backed dedup store.
///
/// Keys are plain strings holding the JSON `DedupRecord`, with no TTL.
#[derive(Clone)]
pub struct RedisDedupStore {
    redis: ConnectionManager,
}

impl RedisDedupStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    fn encode(record: &DedupRecord) -> Result<String, DedupError> {
        serde_json::to_string(record)
            .map_err(|e| DedupError::Persist(format!("Failed to serialize record: {}", e)))
    }

    /// `SET key value NX`: replies OK when it wrote the key, nil when the key existed.
    async fn set_nx(&self, key: &str, value: String) -> redis::RedisResult<bool> {
        let mut conn = self.redis.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }
}

#[async_trait]
impl DedupStore for RedisDedupStore {
    async fn exists(&self, key: &str) -> Result<bool, DedupError> {
        let mut conn = self.redis.clone();
        conn.exists::<_, bool>(key)
            .await
            .map_err(|e| DedupError::Lookup(format!("Redis error: {}", e)))
    }

    async fn insert(&self, record: &DedupRecord) -> Result<(), DedupError> {
        // NX keeps the first record's timestamp when the key already exists.
        let value = Self::encode(record)?;
        self.set_nx(&record.key, value)
            .await
            .map(|_| ())
            .map_err(|e| DedupError::Persist(format!("Redis error: {}", e)))
    }

    async fn insert_if_absent(&self, record: &DedupRecord) -> Result<bool, DedupError> {
        // On error the key may or may not have been written, so existence is unknown.
        let value = Self::encode(record)?;
        let created = self
            .set_nx(&record.key, value)
            .await
            .map_err(|e| DedupError::Lookup(format!("Redis error: {}", e)))?;

        debug!(key = %record.key, created, "Dedup claim");
        Ok(created)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
