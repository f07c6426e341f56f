//! Recall conversational memory engine

pub mod error {
    pub use recall_core::{MemoryError, Result};
}

pub mod llm {
    pub use recall_core::{
        ChatMessage, FinishReason, LLMConfig, LLMError, LLMProvider, LLMResponse, Role, TokenUsage,
    };
    pub use recall_llm::{MockCall, MockLLMProvider};

    pub mod providers {
        pub use recall_llm::{ProviderBuilder, ProviderType, UnifiedLLMProvider};
    }
}

pub mod memory {
    use std::sync::Arc;

    use recall_core::{LLMProvider, Result};

    pub use recall_core::{
        ChunkKind, CompressionChunk, ConversationSnapshot, ProfileDelta, UserProfile,
    };
    pub use recall_memory::{
        CompressionReport, ConversationSession, ConversationStore, DEFAULT_EXTRACTION_PROMPT,
        DEFAULT_SUMMARY_PROMPT, DEFAULT_SYSTEM_PROMPT, ExtractionOutcome, ExtractionSource,
        LLMProfileExtractor, LLMSummarizer, MemoryConfig, ProfileExtractor, SessionStats,
        Summarizer, SummaryOutcome, estimate_tokens, fallback_summary, heuristic_extract,
        parse_profile_response, render_system_prompt,
    };

    /// Build a store from config with `RECALL_*` environment overrides applied.
    pub async fn create_store(
        llm: Arc<dyn LLMProvider>,
        config: MemoryConfig,
    ) -> Result<ConversationStore> {
        ConversationStore::from_config(llm, config.with_env_overrides()).await
    }
}

pub mod persistence {
    pub use recall_core::{SnapshotStorage, StorageTier};
    #[cfg(feature = "redis-storage")]
    pub use recall_storage::RedisStorage;
    pub use recall_storage::{
        DEFAULT_REDIS_PREFIX, ENV_DATA_DIR, ENV_REDIS_PREFIX, ENV_REDIS_URL, FallbackStorage,
        LocalStorage, LocalStorageConfig, RedisStorageConfig, StorageConfig, create_storage,
    };
}

pub use error::{MemoryError, Result};
pub use llm::providers::{ProviderType, UnifiedLLMProvider};
pub use llm::{ChatMessage, LLMProvider, LLMResponse, MockLLMProvider, Role};
pub use memory::{
    CompressionChunk, CompressionReport, ConversationSession, ConversationSnapshot,
    ConversationStore, MemoryConfig, SessionStats, UserProfile, create_store,
};
#[cfg(feature = "redis-storage")]
pub use persistence::RedisStorage;
pub use persistence::{
    FallbackStorage, LocalStorage, SnapshotStorage, StorageConfig, StorageTier, create_storage,
};
