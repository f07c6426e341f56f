//! Durable-first storage that degrades to a local backend

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use recall_core::{ConversationSnapshot, Result, SnapshotStorage, StorageTier};

/// Chains a durable backend with a local one.
///
/// A failed durable write is retried against the local backend within the
/// same `save` call, and the returned [`StorageTier`] tells the caller which
/// one took it. Loads consult both and prefer the most recently updated copy,
/// so a snapshot written locally during an outage is not shadowed by an older
/// durable one.
pub struct FallbackStorage {
    durable: Arc<dyn SnapshotStorage>,
    local: Arc<dyn SnapshotStorage>,
}

impl FallbackStorage {
    pub fn new(durable: Arc<dyn SnapshotStorage>, local: Arc<dyn SnapshotStorage>) -> Self {
        Self { durable, local }
    }
}

fn newest(
    a: Option<ConversationSnapshot>,
    b: Option<ConversationSnapshot>,
) -> Option<ConversationSnapshot> {
    match (a, b) {
        (Some(a), Some(b)) => Some(if b.last_updated > a.last_updated { b } else { a }),
        (a, b) => a.or(b),
    }
}

#[async_trait]
impl SnapshotStorage for FallbackStorage {
    async fn save(
        &self,
        conversation_id: &str,
        snapshot: &ConversationSnapshot,
    ) -> Result<StorageTier> {
        match self.durable.save(conversation_id, snapshot).await {
            Ok(tier) => Ok(tier),
            Err(e) => {
                warn!(
                    conversation_id,
                    error = %e,
                    "Durable snapshot write failed, writing to local storage"
                );
                self.local.save(conversation_id, snapshot).await
            }
        }
    }

    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationSnapshot>> {
        let durable = self.durable.load(conversation_id).await;
        let local = self.local.load(conversation_id).await;

        match (durable, local) {
            (Ok(d), Ok(l)) => Ok(newest(d, l)),
            (Ok(d), Err(e)) => {
                warn!(conversation_id, error = %e, "Local snapshot read failed");
                Ok(d)
            }
            (Err(e), Ok(l)) => {
                warn!(conversation_id, error = %e, "Durable snapshot read failed, using local copy");
                Ok(l)
            }
            (Err(e), Err(_)) => Err(e),
        }
    }

    async fn delete(&self, conversation_id: &str) -> Result<()> {
        if let Err(e) = self.durable.delete(conversation_id).await {
            warn!(conversation_id, error = %e, "Durable snapshot delete failed");
        }
        if let Err(e) = self.local.delete(conversation_id).await {
            warn!(conversation_id, error = %e, "Local snapshot delete failed");
        }
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        let mut sessions = match self.durable.list_sessions().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Durable session listing failed");
                Vec::new()
            }
        };
        sessions.extend(self.local.list_sessions().await?);
        sessions.sort();
        sessions.dedup();
        Ok(sessions)
    }

    fn tier(&self) -> StorageTier {
        self.durable.tier()
    }
}
