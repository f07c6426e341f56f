//! Storage trait for conversation snapshot persistence

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::snapshot::ConversationSnapshot;

/// Which backend tier accepted a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    Durable,
    Local,
}

impl StorageTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageTier::Durable => "durable",
            StorageTier::Local => "local",
        }
    }
}

impl std::fmt::Display for StorageTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core storage trait for persisting compressed conversation state.
///
/// Built-in backends: `LocalStorage`, `RedisStorage`, and `FallbackStorage`
/// which chains the two. Only the compressed state is ever written; the
/// active message buffer stays in memory.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Replace the stored snapshot for a conversation. Returns the tier that accepted it.
    async fn save(&self, conversation_id: &str, snapshot: &ConversationSnapshot)
    -> Result<StorageTier>;
    /// Load a snapshot. Returns `None` if the conversation has never been saved.
    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationSnapshot>>;
    /// Remove a conversation's persisted data. Removing a missing id is not an error.
    async fn delete(&self, conversation_id: &str) -> Result<()>;
    /// List all stored conversation IDs.
    async fn list_sessions(&self) -> Result<Vec<String>>;
    /// The tier writes go to first.
    fn tier(&self) -> StorageTier;
}
