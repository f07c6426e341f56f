//! Redis storage backend for conversation snapshots

use async_trait::async_trait;
use tracing::debug;

use recall_core::{ConversationSnapshot, MemoryError, Result, SnapshotStorage, StorageTier};

use crate::DEFAULT_REDIS_PREFIX;

pub struct RedisStorage {
    client: redis::Client,
    prefix: String,
    default_ttl: Option<u64>,
}

fn map_redis_err(e: redis::RedisError) -> MemoryError {
    MemoryError::Persistence(e.to_string())
}

impl RedisStorage {
    /// Create a client without touching the network.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_err)?;
        Ok(Self {
            client,
            prefix: DEFAULT_REDIS_PREFIX.to_string(),
            default_ttl: None,
        })
    }

    /// Create a client and verify the server answers `PING`.
    pub async fn connect(url: &str) -> Result<Self> {
        let storage = Self::new(url)?;
        storage.ping().await?;
        Ok(storage)
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.default_ttl = Some(ttl_seconds);
        self
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.get_connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(map_redis_err)?;
        Ok(())
    }

    fn conversation_key(&self, conversation_id: &str) -> String {
        format!("{}conversation:{}", self.prefix, conversation_id)
    }

    fn conversations_set_key(&self) -> String {
        format!("{}conversations", self.prefix)
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_err)
    }
}

#[async_trait]
impl SnapshotStorage for RedisStorage {
    async fn save(
        &self,
        conversation_id: &str,
        snapshot: &ConversationSnapshot,
    ) -> Result<StorageTier> {
        let mut conn = self.get_connection().await?;
        let data = serde_json::to_string(snapshot)?;
        let key = self.conversation_key(conversation_id);

        if let Some(ttl) = self.default_ttl {
            redis::cmd("SETEX")
                .arg(&key)
                .arg(ttl)
                .arg(&data)
                .query_async::<()>(&mut conn)
                .await
                .map_err(map_redis_err)?;
        } else {
            redis::cmd("SET")
                .arg(&key)
                .arg(&data)
                .query_async::<()>(&mut conn)
                .await
                .map_err(map_redis_err)?;
        }

        redis::cmd("SADD")
            .arg(self.conversations_set_key())
            .arg(conversation_id)
            .query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_err)?;

        debug!(conversation_id, key = %key, "Snapshot written to redis");
        Ok(StorageTier::Durable)
    }

    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationSnapshot>> {
        let mut conn = self.get_connection().await?;

        let data: Option<String> = redis::cmd("GET")
            .arg(self.conversation_key(conversation_id))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;

        match data {
            Some(ref json_str) => Ok(Some(serde_json::from_str(json_str)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;

        redis::cmd("DEL")
            .arg(self.conversation_key(conversation_id))
            .query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_err)?;
        redis::cmd("SREM")
            .arg(self.conversations_set_key())
            .arg(conversation_id)
            .query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_err)?;

        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        let mut conn = self.get_connection().await?;

        let mut sessions: Vec<String> = redis::cmd("SMEMBERS")
            .arg(self.conversations_set_key())
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        sessions.sort();

        Ok(sessions)
    }

    fn tier(&self) -> StorageTier {
        StorageTier::Durable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_use_prefix() {
        let storage = RedisStorage::new("redis://127.0.0.1:6379")
            .unwrap()
            .with_prefix("companion:");
        assert_eq!(
            storage.conversation_key("abc"),
            "companion:conversation:abc"
        );
        assert_eq!(storage.conversations_set_key(), "companion:conversations");
    }

    #[tokio::test]
    async fn test_connect_to_unreachable_server_fails() {
        let result = RedisStorage::connect("redis://127.0.0.1:1").await;
        assert!(matches!(result, Err(MemoryError::Persistence(_))));
    }
}
