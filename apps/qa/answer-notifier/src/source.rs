//! Redis Stream source of raw notification records.
//!
//! Producers `XADD <stream> * message "<raw record>"`. Each read through the
//! consumer group is one batch for the dispatcher.

use crate::config::StreamConfig;
use redis::aio::ConnectionManager;
use redis::streams::{StreamId, StreamReadReply};
use redis::{RedisError, RedisResult};
use tracing::{debug, info, warn};

/// Name of the entry field that carries the raw record.
pub const MESSAGE_FIELD: &str = "message";

/// One stream entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub id: String,
    /// `None` when the entry has no `message` field.
    pub message: Option<String>,
}

impl From<StreamId> for StreamRecord {
    fn from(entry: StreamId) -> Self {
        let message = entry.get::<String>(MESSAGE_FIELD);
        Self {
            id: entry.id,
            message,
        }
    }
}

/// Consumer-group reader for the notification stream.
#[derive(Clone)]
pub struct StreamSource {
    redis: ConnectionManager,
    config: StreamConfig,
}

impl StreamSource {
    pub fn new(redis: ConnectionManager, config: StreamConfig) -> Self {
        Self { redis, config }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Create the consumer group (and the stream) if missing.
    pub async fn init_consumer_group(&self) -> RedisResult<()> {
        let mut conn = self.redis.clone();

        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                info!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
                Ok(())
            }
            Err(e) if is_busy_group(&e) => {
                debug!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Consumer group already exists"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Entries delivered to this consumer earlier but never acknowledged.
    pub async fn read_pending(&self) -> RedisResult<Vec<StreamRecord>> {
        self.read_group("0", None).await
    }

    /// New entries, blocking up to `block_ms`.
    pub async fn read_new(&self) -> RedisResult<Vec<StreamRecord>> {
        self.read_group(">", Some(self.config.block_ms)).await
    }

    async fn read_group(&self, from: &str, block_ms: Option<u64>) -> RedisResult<Vec<StreamRecord>> {
        let mut conn = self.redis.clone();

        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id);

        if let Some(block_ms) = block_ms {
            cmd.arg("BLOCK").arg(block_ms);
        }

        cmd.arg("COUNT")
            .arg(self.config.batch_size)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(from);

        // nil when a blocking read times out
        let reply: Option<StreamReadReply> = cmd.query_async(&mut conn).await?;

        Ok(reply
            .map(|reply| {
                reply
                    .keys
                    .into_iter()
                    .flat_map(|key| key.ids)
                    .map(StreamRecord::from)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Acknowledge a processed batch in one call.
    pub async fn ack(&self, ids: &[String]) -> RedisResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.redis.clone();
        let acked: i64 = redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(ids)
            .query_async(&mut conn)
            .await?;

        if acked as usize != ids.len() {
            warn!(expected = ids.len(), acked, "Some entries were already acknowledged");
        }
        debug!(count = acked, "Acknowledged entries");
        Ok(())
    }
}

fn is_busy_group(err: &RedisError) -> bool {
    err.to_string().contains("BUSYGROUP")
}

/// Split a batch into raw records to dispatch and entry IDs to acknowledge.
///
/// Entries without a `message` field are logged and acknowledged without
/// being dispatched.
pub fn split_batch(entries: Vec<StreamRecord>) -> (Vec<String>, Vec<String>) {
    let mut records = Vec::with_capacity(entries.len());
    let mut ids = Vec::with_capacity(entries.len());

    for entry in entries {
        match entry.message {
            Some(message) => records.push(message),
            None => warn!(stream_id = %entry.id, field = MESSAGE_FIELD, "Stream entry has no message field, skipping"),
        }
        ids.push(entry.id);
    }

    (records, ids)
}
