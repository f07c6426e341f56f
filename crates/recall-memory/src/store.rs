//! Registry of live conversation sessions

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use recall_core::{LLMProvider, Result, SnapshotStorage, StorageTier};
use recall_storage::create_storage;

use crate::config::MemoryConfig;
use crate::profile::{LLMProfileExtractor, ProfileExtractor};
use crate::session::ConversationSession;
use crate::summarizer::{LLMSummarizer, Summarizer};

#[derive(Default)]
struct Registry {
    sessions: HashMap<String, Arc<ConversationSession>>,
    // Insertion order, oldest first. Lookups do not reorder.
    order: VecDeque<String>,
}

/// Bounded registry of sessions sharing one storage backend and one set of
/// model collaborators.
pub struct ConversationStore {
    registry: Mutex<Registry>,
    storage: Arc<dyn SnapshotStorage>,
    summarizer: Arc<dyn Summarizer>,
    extractor: Arc<dyn ProfileExtractor>,
    config: Arc<MemoryConfig>,
}

impl ConversationStore {
    /// Validate the config and select the storage backend once.
    pub async fn from_config(llm: Arc<dyn LLMProvider>, config: MemoryConfig) -> Result<Self> {
        config.validate()?;
        let storage = create_storage(&config.storage).await;
        Ok(Self::new(llm, storage, config))
    }

    pub fn new(
        llm: Arc<dyn LLMProvider>,
        storage: Arc<dyn SnapshotStorage>,
        config: MemoryConfig,
    ) -> Self {
        let summarizer = Arc::new(LLMSummarizer::new(llm.clone()));
        let extractor = Arc::new(
            LLMProfileExtractor::new(llm).with_min_detail_chars(config.personal_detail_min_chars),
        );
        Self::with_components(storage, summarizer, extractor, config)
    }

    /// Build a store around custom summarization and extraction collaborators.
    pub fn with_components(
        storage: Arc<dyn SnapshotStorage>,
        summarizer: Arc<dyn Summarizer>,
        extractor: Arc<dyn ProfileExtractor>,
        config: MemoryConfig,
    ) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            storage,
            summarizer,
            extractor,
            config: Arc::new(config),
        }
    }

    /// Look up a session, creating it on first use.
    ///
    /// `None` (or a blank id) starts a new conversation under a fresh UUID.
    /// An unknown id is restored from storage when a snapshot exists; a
    /// failed load, or a snapshot recorded for another conversation, is
    /// logged and yields an empty session.
    pub async fn get(&self, id: Option<&str>) -> Arc<ConversationSession> {
        let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) else {
            let id = Uuid::new_v4().to_string();
            debug!(session = %id, "Starting new conversation");
            return self.register(self.new_session(&id));
        };

        let cached = self.registry.lock().sessions.get(id).cloned();
        if let Some(existing) = cached {
            return existing;
        }

        let session = self.new_session(id);
        match self.storage.load(id).await {
            Ok(Some(snapshot)) => {
                let chunks = snapshot.compression_history.len();
                match session.restore(snapshot) {
                    Ok(()) => debug!(session = %id, chunks, "Restored conversation from storage"),
                    Err(e) => warn!(session = %id, error = %e, "Ignoring stored snapshot, starting empty"),
                }
            }
            Ok(None) => debug!(session = %id, "No stored conversation, starting empty"),
            Err(e) => warn!(session = %id, error = %e, "Failed to load conversation, starting empty"),
        }
        self.register(session)
    }

    fn new_session(&self, id: &str) -> ConversationSession {
        ConversationSession::new(
            id,
            self.storage.clone(),
            self.summarizer.clone(),
            self.extractor.clone(),
            self.config.clone(),
        )
    }

    fn register(&self, session: ConversationSession) -> Arc<ConversationSession> {
        let session = {
            let mut registry = self.registry.lock();
            // A concurrent lookup may have registered the same id while we were loading.
            if let Some(existing) = registry.sessions.get(session.id()) {
                return existing.clone();
            }
            let session = Arc::new(session);
            registry
                .sessions
                .insert(session.id().to_string(), session.clone());
            registry.order.push_back(session.id().to_string());
            session
        };
        self.cleanup();
        session
    }

    /// Evict a session and best-effort delete its stored snapshot. Returns
    /// whether the id was registered.
    pub async fn remove(&self, id: &str) -> bool {
        let was_registered = {
            let mut registry = self.registry.lock();
            registry.order.retain(|existing| existing != id);
            registry.sessions.remove(id).is_some()
        };

        if let Err(e) = self.storage.delete(id).await {
            warn!(session = %id, error = %e, "Failed to delete stored conversation");
        }
        was_registered
    }

    /// Evict the oldest-inserted sessions until the registry is within
    /// capacity. Evicted sessions are not saved; their stored snapshot from
    /// the last compression survives. Returns the number evicted.
    pub fn cleanup(&self) -> usize {
        let capacity = self.config.registry_capacity;
        let mut registry = self.registry.lock();
        let mut evicted = 0;

        while registry.sessions.len() > capacity {
            let Some(oldest) = registry.order.pop_front() else {
                break;
            };
            if registry.sessions.remove(&oldest).is_some() {
                evicted += 1;
            }
        }

        if evicted > 0 {
            info!(evicted, capacity, "Evicted conversations from registry");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.registry.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.registry.lock().sessions.contains_key(id)
    }

    /// Registered ids, oldest first.
    pub fn ids(&self) -> Vec<String> {
        self.registry.lock().order.iter().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.config.registry_capacity
    }

    /// Ids with a stored snapshot, whether or not they are registered.
    pub async fn persisted_ids(&self) -> Result<Vec<String>> {
        self.storage.list_sessions().await
    }

    pub fn storage_tier(&self) -> StorageTier {
        self.storage.tier()
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::{ConversationSnapshot, MemoryError, Role, UserProfile};
    use recall_llm::MockLLMProvider;
    use recall_storage::LocalStorage;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir, capacity: usize) -> ConversationStore {
        ConversationStore::new(
            Arc::new(MockLLMProvider::new("m")),
            Arc::new(LocalStorage::new(temp_dir.path())),
            MemoryConfig::default().with_registry_capacity(capacity),
        )
    }

    #[tokio::test]
    async fn test_get_none_creates_fresh_sessions() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir, 10);

        let a = store.get(None).await;
        let b = store.get(None).await;
        assert_ne!(a.id(), b.id());
        assert!(Uuid::parse_str(a.id()).is_ok());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_blank_id_is_treated_as_new() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir, 10);

        let session = store.get(Some("   ")).await;
        assert!(Uuid::parse_str(session.id()).is_ok());
    }

    #[tokio::test]
    async fn test_get_same_id_returns_same_instance() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir, 10);

        let a = store.get(Some("alpha")).await;
        let b = store.get(Some("alpha")).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_get_restores_from_storage() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        let profile = UserProfile {
            name: Some("Noor".into()),
            ..Default::default()
        };
        storage
            .save("beta", &ConversationSnapshot::new("beta").with_profile(profile))
            .await
            .unwrap();

        let store = store(&temp_dir, 10);
        let session = store.get(Some("beta")).await;
        assert_eq!(session.user_profile().name.as_deref(), Some("Noor"));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_yields_empty_session() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("gamma.json"), "{ not json").unwrap();

        let store = store(&temp_dir, 10);
        let session = store.get(Some("gamma")).await;
        assert!(session.user_profile().is_empty());
        assert!(session.compression_history().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_evicts_oldest_inserted() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir, 3);

        for id in ["a", "b", "c"] {
            store.get(Some(id)).await;
        }
        // a lookup does not refresh insertion order
        store.get(Some("a")).await;
        store.get(Some("d")).await;

        assert_eq!(store.len(), 3);
        assert!(!store.contains("a"));
        assert_eq!(store.ids(), vec!["b", "c", "d"]);
        assert_eq!(store.cleanup(), 0);
    }

    #[tokio::test]
    async fn test_remove_deletes_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir, 10);

        let session = store.get(Some("delta")).await;
        session.add_message(Role::User, "hello").await.unwrap();
        store
            .storage
            .save("delta", &session.snapshot())
            .await
            .unwrap();
        assert_eq!(store.persisted_ids().await.unwrap(), vec!["delta"]);

        assert!(store.remove("delta").await);
        assert!(!store.contains("delta"));
        assert!(store.persisted_ids().await.unwrap().is_empty());
        assert!(!store.remove("delta").await);
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid_config() {
        let llm = Arc::new(MockLLMProvider::new("m"));
        let result =
            ConversationStore::from_config(llm, MemoryConfig::default().with_buffer_threshold(0))
                .await;
        assert!(matches!(result, Err(MemoryError::Config(_))));
    }

    #[tokio::test]
    async fn test_from_config_local_only() {
        let temp_dir = TempDir::new().unwrap();
        let config = MemoryConfig::default().with_storage(recall_storage::StorageConfig::local(
            temp_dir.path().to_string_lossy(),
        ));

        let store = ConversationStore::from_config(Arc::new(MockLLMProvider::new("m")), config)
            .await
            .unwrap();
        assert_eq!(store.storage_tier(), StorageTier::Local);
        assert_eq!(store.capacity(), 100);
        assert!(store.is_empty());
    }
    #[tokio::test]
    async fn test_snapshot_of_other_conversation_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        let profile = UserProfile {
            name: Some("Noor".into()),
            ..Default::default()
        };
        storage
            .save("beta", &ConversationSnapshot::new("epsilon").with_profile(profile))
            .await
            .unwrap();

        let store = store(&temp_dir, 10);
        let session = store.get(Some("beta")).await;
        assert_eq!(session.id(), "beta");
        assert!(session.user_profile().is_empty());
        assert_eq!(session.total_processed_count(), 0);
    }

    #[tokio::test]
    async fn test_similar_ids_keep_separate_state() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConversationStore::new(
            Arc::new(MockLLMProvider::new("m")),
            Arc::new(LocalStorage::new(temp_dir.path())),
            MemoryConfig::default().with_buffer_threshold(2),
        );

        let alice = store.get(Some("alice@example.com")).await;
        alice
            .add_message(Role::User, "My name is Alice and I like chess")
            .await
            .unwrap();
        alice.add_message(Role::Assistant, "Hello Alice").await.unwrap();
        assert_eq!(alice.compression_history().len(), 1);

        let other = store.get(Some("alice_example_com")).await;
        assert!(other.user_profile().is_empty());
        assert!(other.compression_history().is_empty());
        assert_eq!(store.persisted_ids().await.unwrap(), vec!["alice@example.com"]);
    }
}
