//! A single conversation: active buffer, compression pipeline and snapshot state

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use recall_core::{
    ChatMessage, ChunkKind, CompressionChunk, ConversationSnapshot, MemoryError, Result, Role,
    SnapshotStorage, StorageTier, UserProfile,
};

use crate::config::MemoryConfig;
use crate::profile::{ExtractionOutcome, ExtractionSource, ProfileExtractor, heuristic_extract};
use crate::prompt::{estimate_tokens, render_system_prompt};
use crate::summarizer::{Summarizer, SummaryOutcome, fallback_summary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Messages currently in the active buffer.
    pub message_count: usize,
    pub compression_chunks: usize,
    /// Compressed plus buffered messages.
    pub total_processed_messages: usize,
    /// Populated profile fields, 0..=7.
    pub user_profile_field_count: usize,
    pub estimated_token_count: usize,
}

/// Result of one compression pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressionReport {
    pub chunk_number: usize,
    pub messages_compressed: usize,
    pub kind: ChunkKind,
    pub extraction: ExtractionSource,
    pub stored_in: StorageTier,
    pub estimated_tokens_saved: usize,
}

#[derive(Default)]
struct SessionState {
    buffer: Vec<ChatMessage>,
    history: Vec<CompressionChunk>,
    profile: UserProfile,
    total_processed: usize,
    last_compression: Option<CompressionReport>,
}

pub struct ConversationSession {
    id: String,
    state: RwLock<SessionState>,
    // Serialises compression runs; the state lock is never held across an await.
    compression: Mutex<()>,
    storage: Arc<dyn SnapshotStorage>,
    summarizer: Arc<dyn Summarizer>,
    extractor: Arc<dyn ProfileExtractor>,
    config: Arc<MemoryConfig>,
}

impl ConversationSession {
    pub fn new(
        id: impl Into<String>,
        storage: Arc<dyn SnapshotStorage>,
        summarizer: Arc<dyn Summarizer>,
        extractor: Arc<dyn ProfileExtractor>,
        config: Arc<MemoryConfig>,
    ) -> Self {
        Self {
            id: id.into(),
            state: RwLock::new(SessionState::default()),
            compression: Mutex::new(()),
            storage,
            summarizer,
            extractor,
            config,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Append a message, compressing the head of the buffer once it reaches
    /// the threshold. Returns only after compression has finished.
    ///
    /// The only error surfaced after ingestion is a persistence failure on
    /// every storage tier; in-memory state has advanced by then.
    pub async fn add_message(&self, role: Role, content: impl Into<String>) -> Result<()> {
        if role == Role::System {
            return Err(MemoryError::InvalidInput(
                "system messages are generated, not ingested".into(),
            ));
        }

        let needs_compression = {
            let mut state = self.state.write();
            state.buffer.push(ChatMessage::new(role, content));
            state.buffer.len() >= self.config.buffer_threshold
        };

        if needs_compression {
            self.compress_pending().await?;
        }
        Ok(())
    }

    /// Run the pipeline until the buffer is below the threshold.
    async fn compress_pending(&self) -> Result<()> {
        let _guard = self.compression.lock().await;
        let mut first_error = None;

        loop {
            let pending = self.state.read().buffer.len() >= self.config.buffer_threshold;
            if !pending {
                break;
            }
            if let Err(e) = self.compress_window().await {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn compress_window(&self) -> Result<CompressionReport> {
        let threshold = self.config.buffer_threshold;
        // Only this task removes from the head while the guard is held.
        let window: Vec<ChatMessage> = self.state.read().buffer[..threshold].to_vec();

        let summary = match self.summarizer.summarize(&window).await {
            Ok(text) if !text.trim().is_empty() => SummaryOutcome::Model(text),
            Ok(_) => {
                warn!(session = %self.id, "Summarizer returned empty text, using fallback summary");
                SummaryOutcome::Fallback(self.fallback_summary(&window))
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "Summarization failed, using fallback summary");
                SummaryOutcome::Fallback(self.fallback_summary(&window))
            }
        };

        let extraction = match self.extractor.extract(&window).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(session = %self.id, error = %e, "Profile extraction failed, using heuristics");
                ExtractionOutcome::Heuristic(heuristic_extract(
                    &window,
                    self.config.personal_detail_min_chars,
                ))
            }
        };
        debug!(
            session = %self.id,
            summary_fallback = summary.is_fallback(),
            extraction = ?extraction.source(),
            "Compression stages finished"
        );

        let kind = if summary.is_fallback() {
            ChunkKind::Fallback
        } else {
            ChunkKind::Normal
        };
        let extraction_source = extraction.source();
        let summary_text = summary.into_text();
        let tokens_saved =
            estimate_tokens(&window).saturating_sub(summary_text.chars().count().div_ceil(4));

        let (chunk_number, snapshot) = {
            let mut state = self.state.write();
            let profile_changed = state.profile.merge(extraction.delta());
            let chunk_number = state.history.len() + 1;
            state.history.push(
                CompressionChunk::new(chunk_number, summary_text, window.len()).with_kind(kind),
            );
            state.buffer.drain(..window.len());
            state.total_processed += window.len();
            debug!(session = %self.id, profile_changed, "Profile merged");
            (chunk_number, Self::snapshot_of(&self.id, &state))
        };

        let stored_in = match self.storage.save(&self.id, &snapshot).await {
            Ok(tier) => tier,
            Err(e) => {
                error!(session = %self.id, chunk_number, error = %e, "Failed to persist snapshot");
                return Err(e);
            }
        };

        let report = CompressionReport {
            chunk_number,
            messages_compressed: window.len(),
            kind,
            extraction: extraction_source,
            stored_in,
            estimated_tokens_saved: tokens_saved,
        };
        info!(
            session = %self.id,
            chunk_number,
            messages = report.messages_compressed,
            kind = ?report.kind,
            extraction = ?report.extraction,
            stored_in = %report.stored_in,
            tokens_saved = report.estimated_tokens_saved,
            "Compressed conversation window"
        );

        self.state.write().last_compression = Some(report.clone());
        Ok(report)
    }

    fn fallback_summary(&self, window: &[ChatMessage]) -> String {
        fallback_summary(
            window,
            self.config.fallback_excerpt_messages,
            self.config.fallback_excerpt_chars,
        )
    }

    /// The prompt to send to the model: one synthetic system message followed
    /// by the active buffer.
    pub fn get_optimized_messages(&self) -> Vec<ChatMessage> {
        self.optimized_messages(&self.state.read())
    }

    fn optimized_messages(&self, state: &SessionState) -> Vec<ChatMessage> {
        let system = render_system_prompt(
            &self.config.system_prompt,
            &state.profile,
            &state.history,
            self.config.prompt_personal_details,
        );

        let mut messages = Vec::with_capacity(state.buffer.len() + 1);
        messages.push(ChatMessage::system(system));
        messages.extend(state.buffer.iter().cloned());
        messages
    }

    pub fn get_stats(&self) -> SessionStats {
        let state = self.state.read();
        SessionStats {
            message_count: state.buffer.len(),
            compression_chunks: state.history.len(),
            total_processed_messages: state.total_processed + state.buffer.len(),
            user_profile_field_count: state.profile.populated_field_count(),
            estimated_token_count: estimate_tokens(&self.optimized_messages(&state)),
        }
    }

    pub fn user_profile(&self) -> UserProfile {
        self.state.read().profile.clone()
    }

    pub fn compression_history(&self) -> Vec<CompressionChunk> {
        self.state.read().history.clone()
    }

    pub fn active_messages(&self) -> Vec<ChatMessage> {
        self.state.read().buffer.clone()
    }

    pub fn total_processed_count(&self) -> usize {
        self.state.read().total_processed
    }

    pub fn last_compression(&self) -> Option<CompressionReport> {
        self.state.read().last_compression.clone()
    }

    /// The durable part of the session.
    pub fn snapshot(&self) -> ConversationSnapshot {
        Self::snapshot_of(&self.id, &self.state.read())
    }

    /// Replace the durable part of the session with a loaded snapshot. The
    /// active buffer is left as is. A snapshot of another conversation is
    /// rejected.
    pub fn restore(&self, snapshot: ConversationSnapshot) -> Result<()> {
        if snapshot.conversation_id != self.id {
            return Err(MemoryError::InvalidInput(format!(
                "snapshot belongs to conversation {}, not {}",
                snapshot.conversation_id, self.id
            )));
        }

        let mut state = self.state.write();
        state.total_processed = snapshot
            .compression_history
            .iter()
            .map(|c| c.message_count)
            .sum();
        if state.total_processed != snapshot.total_processed_count {
            warn!(
                session = %self.id,
                stored = snapshot.total_processed_count,
                computed = state.total_processed,
                "Snapshot message count disagrees with its history, using history"
            );
        }
        state.profile = snapshot.user_profile;
        state.history = snapshot.compression_history;
        Ok(())
    }

    fn snapshot_of(id: &str, state: &SessionState) -> ConversationSnapshot {
        ConversationSnapshot {
            conversation_id: id.to_string(),
            user_profile: state.profile.clone(),
            compression_history: state.history.clone(),
            total_processed_count: state.total_processed,
            last_updated: Utc::now(),
        }
    }
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ConversationSession")
            .field("id", &self.id)
            .field("buffered", &state.buffer.len())
            .field("chunks", &state.history.len())
            .field("storage", &self.storage.tier())
            .finish()
    }
}
