//! Core types and traits for the Recall conversational memory engine

pub mod error;
pub mod message;
pub mod snapshot;
pub mod traits;
pub mod types;

pub use error::{MemoryError, Result};
pub use message::{ChatMessage, Role};
pub use snapshot::{ChunkKind, CompressionChunk, ConversationSnapshot, ProfileDelta, UserProfile};
pub use traits::llm::{LLMError, LLMProvider};
pub use traits::storage::{SnapshotStorage, StorageTier};
pub use types::{FinishReason, LLMConfig, LLMResponse, TokenUsage};
