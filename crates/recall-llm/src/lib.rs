//! LLM providers for the Recall memory engine

pub mod mock;
pub mod providers;

pub use mock::{MockCall, MockLLMProvider};
pub use providers::{ProviderBuilder, ProviderType, UnifiedLLMProvider};
pub use recall_core::{
    ChatMessage, FinishReason, LLMConfig, LLMError, LLMProvider, LLMResponse, Role, TokenUsage,
};
