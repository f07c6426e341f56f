//! Engine configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use recall_core::{MemoryError, Result};
use recall_storage::StorageConfig;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a warm, attentive companion. Stay consistent with everything you already know about the user and the conversation so far, and refer back to it naturally when it is relevant.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Active buffer size that triggers compression; also the size of each compressed window.
    #[serde(default = "default_buffer_threshold")]
    pub buffer_threshold: usize,

    /// Maximum number of sessions kept in the in-memory registry.
    #[serde(default = "default_registry_capacity")]
    pub registry_capacity: usize,

    /// Messages quoted by a fallback summary.
    #[serde(default = "default_fallback_excerpt_messages")]
    pub fallback_excerpt_messages: usize,

    /// Per-message character cap in a fallback summary.
    #[serde(default = "default_fallback_excerpt_chars")]
    pub fallback_excerpt_chars: usize,

    /// User messages longer than this become heuristic personal details.
    #[serde(default = "default_personal_detail_min_chars")]
    pub personal_detail_min_chars: usize,

    /// Personal details shown in the optimized prompt.
    #[serde(default = "default_prompt_personal_details")]
    pub prompt_personal_details: usize,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_buffer_threshold() -> usize {
    20
}

fn default_registry_capacity() -> usize {
    100
}

fn default_fallback_excerpt_messages() -> usize {
    3
}

fn default_fallback_excerpt_chars() -> usize {
    100
}

fn default_personal_detail_min_chars() -> usize {
    50
}

fn default_prompt_personal_details() -> usize {
    3
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            buffer_threshold: default_buffer_threshold(),
            registry_capacity: default_registry_capacity(),
            fallback_excerpt_messages: default_fallback_excerpt_messages(),
            fallback_excerpt_chars: default_fallback_excerpt_chars(),
            personal_detail_min_chars: default_personal_detail_min_chars(),
            prompt_personal_details: default_prompt_personal_details(),
            system_prompt: default_system_prompt(),
            storage: StorageConfig::default(),
        }
    }
}

impl MemoryConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| MemoryError::Config(format!("Invalid memory config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            MemoryError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply `RECALL_*` storage environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        self.storage = self.storage.with_overrides(|key| std::env::var(key).ok());
        self
    }

    pub fn with_buffer_threshold(mut self, threshold: usize) -> Self {
        self.buffer_threshold = threshold;
        self
    }

    pub fn with_registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity;
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_threshold == 0 {
            return Err(MemoryError::Config(
                "buffer_threshold must be at least 1".into(),
            ));
        }
        if self.registry_capacity == 0 {
            return Err(MemoryError::Config(
                "registry_capacity must be at least 1".into(),
            ));
        }
        if self.fallback_excerpt_messages == 0 {
            return Err(MemoryError::Config(
                "fallback_excerpt_messages must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
