//! Summarizer trait and implementations for memory compression

use std::sync::Arc;

use async_trait::async_trait;

use recall_core::{ChatMessage, LLMConfig, LLMProvider, Result, Role};

use crate::util::truncate_chars;

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// How the summary of a compressed window was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Model(String),
    Fallback(String),
}

impl SummaryOutcome {
    pub fn text(&self) -> &str {
        match self {
            SummaryOutcome::Model(s) | SummaryOutcome::Fallback(s) => s,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            SummaryOutcome::Model(s) | SummaryOutcome::Fallback(s) => s,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SummaryOutcome::Fallback(_))
    }
}

pub struct LLMSummarizer {
    llm: Arc<dyn LLMProvider>,
    prompt_template: String,
    config: Option<LLMConfig>,
}

impl LLMSummarizer {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            llm,
            prompt_template: DEFAULT_SUMMARY_PROMPT.to_string(),
            config: Some(LLMConfig::new().with_temperature(0.3)),
        }
    }

    /// Replace the instruction. `{conversation}` is substituted with the transcript.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt_template = prompt.into();
        self
    }

    pub fn with_config(mut self, config: LLMConfig) -> Self {
        self.config = Some(config);
        self
    }
}

pub(crate) fn format_transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", format_role(&m.role), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_role(role: &Role) -> &'static str {
    match role {
        Role::System => "System",
        Role::User => "User",
        Role::Assistant => "Assistant",
    }
}

#[async_trait]
impl Summarizer for LLMSummarizer {
    async fn summarize(&self, messages: &[ChatMessage]) -> Result<String> {
        if messages.is_empty() {
            return Ok(String::new());
        }

        let prompt = self
            .prompt_template
            .replace("{conversation}", &format_transcript(messages));
        let llm_messages = vec![ChatMessage::user(prompt)];

        let response = self.llm.complete(&llm_messages, self.config.as_ref()).await?;
        Ok(response.content.trim().to_string())
    }
}

pub const DEFAULT_SUMMARY_PROMPT: &str = r#"Summarize the following part of a conversation between a user and their AI companion. Write exactly three sections:

FACTS: concrete facts, events and decisions that were mentioned.
USER DETAILS: anything learned about the user (name, location, work, family, feelings, preferences).
TOPICS: the main topics discussed, as a short comma-separated list.

Be concise and do not invent anything that is not in the conversation.

Conversation:
{conversation}"#;

/// Deterministic summary used when the model is unavailable: an excerpt of
/// the first `count` messages, each cut to `max_chars`.
pub fn fallback_summary(messages: &[ChatMessage], count: usize, max_chars: usize) -> String {
    let excerpt = messages
        .iter()
        .take(count)
        .map(|m| format!("{}: {}", format_role(&m.role), truncate_chars(&m.content, max_chars)))
        .collect::<Vec<_>>()
        .join(" | ");
    format!(
        "Earlier conversation ({} messages, not summarized): {}",
        messages.len(),
        excerpt
    )
}
