//! Persisted conversation state
//!
//! The JSON shape produced here is shared by every storage backend, so field
//! names are fixed (camelCase) and changes must stay backward compatible.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// How a compression chunk's summary was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    #[default]
    Normal,
    Fallback,
}

/// Immutable summary of one compressed window of messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionChunk {
    pub summary: String,
    pub message_count: usize,
    pub chunk_number: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub kind: ChunkKind,
}

impl CompressionChunk {
    pub fn new(chunk_number: usize, summary: impl Into<String>, message_count: usize) -> Self {
        Self {
            summary: summary.into(),
            message_count,
            chunk_number,
            timestamp: Utc::now(),
            kind: ChunkKind::Normal,
        }
    }

    pub fn with_kind(mut self, kind: ChunkKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_fallback(&self) -> bool {
        self.kind == ChunkKind::Fallback
    }
}

/// Structured facts about the user accumulated over a conversation.
///
/// Scalar fields are fill-once; collections only grow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub profession: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub personal_details: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<String>,
    #[serde(default)]
    pub preferences: Vec<String>,
}

impl UserProfile {
    /// Number of populated fields, scalars and collections alike (0..=7).
    pub fn populated_field_count(&self) -> usize {
        let scalars = [&self.name, &self.location, &self.profession]
            .into_iter()
            .filter(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
            .count();
        let collections = [
            &self.interests,
            &self.personal_details,
            &self.relationships,
            &self.preferences,
        ]
        .into_iter()
        .filter(|v| !v.is_empty())
        .count();
        scalars + collections
    }

    pub fn is_empty(&self) -> bool {
        self.populated_field_count() == 0
    }

    /// Merge extracted facts into the profile. Returns whether anything changed.
    ///
    /// Scalars are fill-once and collections are unioned with exact-string
    /// de-duplication, so applying the same delta twice is a no-op.
    pub fn merge(&mut self, delta: &ProfileDelta) -> bool {
        let mut changed = false;
        changed |= fill_once(&mut self.name, &delta.name);
        changed |= fill_once(&mut self.location, &delta.location);
        changed |= fill_once(&mut self.profession, &delta.profession);
        changed |= union_into(&mut self.interests, &delta.interests);
        changed |= union_into(&mut self.personal_details, &delta.personal_details);
        changed |= union_into(&mut self.relationships, &delta.relationships);
        changed |= union_into(&mut self.preferences, &delta.preferences);
        changed
    }
}

fn fill_once(slot: &mut Option<String>, value: &Option<String>) -> bool {
    let slot_empty = slot.as_deref().is_none_or(|s| s.trim().is_empty());
    match value.as_deref().map(str::trim) {
        Some(v) if slot_empty && !v.is_empty() => {
            *slot = Some(v.to_string());
            true
        }
        _ => false,
    }
}

fn union_into(existing: &mut Vec<String>, incoming: &[String]) -> bool {
    let mut changed = false;
    for value in incoming {
        if value.trim().is_empty() || existing.contains(value) {
            continue;
        }
        existing.push(value.clone());
        changed = true;
    }
    changed
}

/// Profile facts extracted from one window of messages.
///
/// This is the validation boundary for model output: a response either
/// deserializes into this exact shape or it is rejected as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub profession: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub interests: Vec<String>,
    #[serde(default, alias = "personal_details", deserialize_with = "null_as_empty")]
    pub personal_details: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub relationships: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub preferences: Vec<String>,
}

impl ProfileDelta {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.location.is_none()
            && self.profession.is_none()
            && self.interests.is_empty()
            && self.personal_details.is_empty()
            && self.relationships.is_empty()
            && self.preferences.is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Durable state of one conversation. The active buffer is never part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    pub conversation_id: String,
    #[serde(default)]
    pub user_profile: UserProfile,
    #[serde(default)]
    pub compression_history: Vec<CompressionChunk>,
    #[serde(default)]
    pub total_processed_count: usize,
    pub last_updated: DateTime<Utc>,
}

impl ConversationSnapshot {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_profile: UserProfile::default(),
            compression_history: Vec::new(),
            total_processed_count: 0,
            last_updated: Utc::now(),
        }
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.user_profile = profile;
        self
    }

    pub fn with_history(mut self, history: Vec<CompressionChunk>) -> Self {
        self.total_processed_count = history.iter().map(|c| c.message_count).sum();
        self.compression_history = history;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = ConversationSnapshot::new("conv-1")
            .with_history(vec![CompressionChunk::new(1, "FACTS: likes tea", 20)]);
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["conversationId"], "conv-1");
        assert_eq!(value["totalProcessedCount"], 20);
        assert!(value["lastUpdated"].is_string());
        assert!(value["userProfile"]["personalDetails"].is_array());

        let chunk = &value["compressionHistory"][0];
        assert_eq!(chunk["chunkNumber"], 1);
        assert_eq!(chunk["messageCount"], 20);
        assert_eq!(chunk["kind"], "normal");
    }

    #[test]
    fn test_chunk_kind_defaults_to_normal_when_absent() {
        let json = r#"{
            "summary": "old chunk",
            "messageCount": 20,
            "chunkNumber": 1,
            "timestamp": "2024-05-01T10:00:00Z"
        }"#;
        let chunk: CompressionChunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.kind, ChunkKind::Normal);
        assert!(!chunk.is_fallback());
    }

    #[test]
    fn test_populated_field_count() {
        let mut profile = UserProfile::default();
        assert!(profile.is_empty());

        profile.name = Some("Mira".into());
        profile.location = Some("   ".into());
        profile.interests = vec!["hiking".into(), "jazz".into()];
        assert_eq!(profile.populated_field_count(), 2);
    }

    #[test]
    fn test_profile_delta_accepts_nulls_and_aliases() {
        let json = r#"{
            "name": "Sam",
            "location": null,
            "interests": null,
            "personal_details": ["has a cat"]
        }"#;
        let delta: ProfileDelta = serde_json::from_str(json).unwrap();
        assert_eq!(delta.name.as_deref(), Some("Sam"));
        assert!(delta.location.is_none());
        assert!(delta.interests.is_empty());
        assert_eq!(delta.personal_details, vec!["has a cat".to_string()]);
    }

    #[test]
    fn test_profile_delta_rejects_wrong_types() {
        let json = r#"{"name": ["not", "a", "string"]}"#;
        assert!(serde_json::from_str::<ProfileDelta>(json).is_err());

        let json = r#"{"interests": "reading"}"#;
        assert!(serde_json::from_str::<ProfileDelta>(json).is_err());
    }

    fn interests(values: &[&str]) -> ProfileDelta {
        ProfileDelta {
            interests: values.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_scalars_are_fill_once() {
        let mut profile = UserProfile::default();
        let first = ProfileDelta {
            name: Some("Jonas".into()),
            ..Default::default()
        };
        let second = ProfileDelta {
            name: Some("Jon".into()),
            location: Some("Oslo".into()),
            ..Default::default()
        };

        assert!(profile.merge(&first));
        assert!(profile.merge(&second));
        assert_eq!(profile.name.as_deref(), Some("Jonas"));
        assert_eq!(profile.location.as_deref(), Some("Oslo"));
    }

    #[test]
    fn test_merge_ignores_blank_scalars() {
        let mut profile = UserProfile::default();
        let blank = ProfileDelta {
            name: Some("   ".into()),
            ..Default::default()
        };
        assert!(!profile.merge(&blank));
        assert!(profile.name.is_none());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut profile = UserProfile::default();
        let delta = ProfileDelta {
            name: Some("Ada".into()),
            interests: vec!["math".into(), "poetry".into()],
            relationships: vec!["daughter of Byron".into()],
            ..Default::default()
        };

        assert!(profile.merge(&delta));
        let after_first = profile.clone();
        assert!(!profile.merge(&delta));
        assert_eq!(profile, after_first);
    }

    #[test]
    fn test_collection_merge_is_commutative() {
        let a = interests(&["chess", "tea"]);
        let b = interests(&["tea", "running"]);

        let mut ab = UserProfile::default();
        ab.merge(&a);
        ab.merge(&b);

        let mut ba = UserProfile::default();
        ba.merge(&b);
        ba.merge(&a);

        ab.interests.sort();
        ba.interests.sort();
        assert_eq!(ab.interests, ba.interests);
        assert_eq!(ab.interests.len(), 3);
    }

    #[test]
    fn test_union_uses_exact_match() {
        let mut profile = UserProfile::default();
        profile.merge(&interests(&["Chess", "chess", "chess"]));
        assert_eq!(profile.interests, vec!["Chess".to_string(), "chess".to_string()]);
    }
}
