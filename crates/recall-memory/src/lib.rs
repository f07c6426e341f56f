//! Conversation sessions, compression and profile extraction for Recall
//!
//! A [`ConversationStore`] hands out [`ConversationSession`]s. Each session
//! keeps a short buffer of recent messages; once the buffer reaches the
//! configured threshold its head is summarized into a [`CompressionChunk`],
//! facts about the user are merged into a [`UserProfile`], and the compressed
//! state is persisted. [`ConversationSession::get_optimized_messages`] turns
//! all of it back into a compact prompt.

mod config;
mod profile;
mod prompt;
mod session;
mod store;
mod summarizer;
mod util;

pub use config::{DEFAULT_SYSTEM_PROMPT, MemoryConfig};
pub use profile::{
    DEFAULT_EXTRACTION_PROMPT, ExtractionOutcome, ExtractionSource, LLMProfileExtractor,
    ProfileExtractor, heuristic_extract, parse_profile_response,
};
pub use prompt::{estimate_tokens, render_system_prompt};
pub use session::{CompressionReport, ConversationSession, SessionStats};
pub use store::ConversationStore;
pub use summarizer::{
    DEFAULT_SUMMARY_PROMPT, LLMSummarizer, Summarizer, SummaryOutcome, fallback_summary,
};

pub use recall_core::{
    ChatMessage, ChunkKind, CompressionChunk, ConversationSnapshot, MemoryError, ProfileDelta,
    Result, Role, StorageTier, UserProfile,
};
