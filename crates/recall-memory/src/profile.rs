//! User profile extraction
//!
//! The model path asks for a fixed JSON schema and validates the reply by
//! deserializing it into [`ProfileDelta`]. Anything that does not fit the
//! schema is discarded as a whole and the lexical heuristics run instead, so
//! a malformed reply can never half-populate the profile.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use recall_core::{ChatMessage, LLMConfig, LLMProvider, ProfileDelta, Result, Role};

use crate::summarizer::format_transcript;
use crate::util::{extract_json_object, truncate_chars};

const MAX_DETAIL_CHARS: usize = 200;

#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    /// Extract profile facts from a window of messages.
    ///
    /// `Err` means the extractor could not reach its collaborator at all;
    /// unusable replies are handled internally.
    async fn extract(&self, messages: &[ChatMessage]) -> Result<ExtractionOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    Model,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Model(ProfileDelta),
    Heuristic(ProfileDelta),
}

impl ExtractionOutcome {
    pub fn delta(&self) -> &ProfileDelta {
        match self {
            ExtractionOutcome::Model(d) | ExtractionOutcome::Heuristic(d) => d,
        }
    }

    pub fn source(&self) -> ExtractionSource {
        match self {
            ExtractionOutcome::Model(_) => ExtractionSource::Model,
            ExtractionOutcome::Heuristic(_) => ExtractionSource::Heuristic,
        }
    }
}

pub struct LLMProfileExtractor {
    llm: Arc<dyn LLMProvider>,
    prompt_template: String,
    min_detail_chars: usize,
    config: Option<LLMConfig>,
}

impl LLMProfileExtractor {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            llm,
            prompt_template: DEFAULT_EXTRACTION_PROMPT.to_string(),
            min_detail_chars: 50,
            config: Some(LLMConfig::new().with_temperature(0.0)),
        }
    }

    /// Replace the instruction. `{conversation}` is substituted with the transcript.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt_template = prompt.into();
        self
    }

    /// Length above which the heuristic fallback keeps a user message as a detail.
    pub fn with_min_detail_chars(mut self, chars: usize) -> Self {
        self.min_detail_chars = chars;
        self
    }
}

#[async_trait]
impl ProfileExtractor for LLMProfileExtractor {
    async fn extract(&self, messages: &[ChatMessage]) -> Result<ExtractionOutcome> {
        let prompt = self
            .prompt_template
            .replace("{conversation}", &format_transcript(messages));
        let llm_messages = vec![
            ChatMessage::system("You extract structured facts about a user. Respond only with valid JSON."),
            ChatMessage::user(prompt),
        ];

        let response = self.llm.complete(&llm_messages, self.config.as_ref()).await?;

        match parse_profile_response(&response.content) {
            Some(delta) => {
                debug!(
                    name = delta.name.is_some(),
                    interests = delta.interests.len(),
                    "Profile extracted by model"
                );
                Ok(ExtractionOutcome::Model(delta))
            }
            None => {
                warn!("Profile response did not match schema, using heuristic extraction");
                Ok(ExtractionOutcome::Heuristic(heuristic_extract(
                    messages,
                    self.min_detail_chars,
                )))
            }
        }
    }
}

pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"Read the conversation below and extract facts the user stated about themselves.
Return a single JSON object with exactly these keys:

{
  "name": string or null,
  "location": string or null,
  "profession": string or null,
  "interests": [string],
  "personalDetails": [string],
  "relationships": [string],
  "preferences": [string]
}

Only include facts the user clearly stated. Use null or [] when nothing is known.

Conversation:
{conversation}"#;

/// Validate a model reply against the profile schema.
pub fn parse_profile_response(content: &str) -> Option<ProfileDelta> {
    let json = extract_json_object(content)?;
    let delta: ProfileDelta = serde_json::from_str(json).ok()?;
    Some(normalize(delta))
}

fn normalize(delta: ProfileDelta) -> ProfileDelta {
    fn scalar(value: Option<String>) -> Option<String> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !is_placeholder(v))
    }
    fn list(values: Vec<String>) -> Vec<String> {
        values
            .into_iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !is_placeholder(v))
            .collect()
    }

    ProfileDelta {
        name: scalar(delta.name),
        location: scalar(delta.location),
        profession: scalar(delta.profession),
        interests: list(delta.interests),
        personal_details: list(delta.personal_details),
        relationships: list(delta.relationships),
        preferences: list(delta.preferences),
    }
}

fn is_placeholder(value: &str) -> bool {
    value.is_empty()
        || ["unknown", "n/a", "none", "null", "not mentioned"]
            .iter()
            .any(|p| value.eq_ignore_ascii_case(p))
}

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:my name is|my name's|call me|i am|i'm|im)\s+([A-Z][\p{L}'-]+)")
        .expect("valid name regex")
});

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:live in|living in|based in|from)\s+([A-Z][\p{L}.'-]*(?:\s+[A-Z][\p{L}.'-]*)*)")
        .expect("valid location regex")
});

static WORK_AS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bwork(?:ing)? as (?:an? )?([\p{L} -]{2,40}?)(?:[.,!?;]|$| and | at | in | for )")
        .expect("valid profession regex")
});

static JOB_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(engineer|developer|programmer|teacher|nurse|doctor|designer|student|lawyer|accountant|manager|chef|artist|writer|scientist|consultant|mechanic|electrician|pharmacist|therapist)s?\b",
    )
    .expect("valid job keyword regex")
});

// Capitalised words that follow "I'm" without being names.
const NOT_NAMES: &[&str] = &[
    "Sorry", "Fine", "Good", "Okay", "Ok", "Not", "So", "Just", "Really", "Very", "Here", "Back",
    "Glad", "Happy", "Tired", "From", "In", "A", "An", "The", "Going", "Doing", "Trying",
    "Looking", "Working", "Living", "Still", "Also", "Currently",
];

/// Lexical extraction over user messages only. Low precision; it exists so
/// profile growth never stalls while the model is unreachable.
pub fn heuristic_extract(messages: &[ChatMessage], min_detail_chars: usize) -> ProfileDelta {
    let mut delta = ProfileDelta::default();

    for message in messages.iter().filter(|m| m.role == Role::User) {
        let text = message.content.trim();

        if delta.name.is_none() {
            delta.name = NAME_RE
                .captures_iter(text)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str())
                .find(|candidate| !NOT_NAMES.contains(candidate))
                .map(str::to_string);
        }

        if delta.location.is_none() {
            delta.location = LOCATION_RE
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim_end_matches('.').to_string());
        }

        if delta.profession.is_none() {
            delta.profession = WORK_AS_RE
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|p| !p.is_empty())
                .or_else(|| {
                    JOB_KEYWORD_RE
                        .captures(text)
                        .and_then(|c| c.get(1))
                        .map(|m| m.as_str().to_lowercase())
                });
        }

        if text.chars().count() > min_detail_chars {
            let detail = truncate_chars(text, MAX_DETAIL_CHARS);
            if !delta.personal_details.contains(&detail) {
                delta.personal_details.push(detail);
            }
        }
    }

    delta
}
