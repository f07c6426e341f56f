//! Collaborator traits consumed by the memory engine

pub mod llm;
pub mod storage;

pub use llm::LLMProvider;
pub use storage::SnapshotStorage;
