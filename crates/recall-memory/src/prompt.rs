//! Optimized prompt rendering

use recall_core::{ChatMessage, CompressionChunk, UserProfile};

/// Render the synthetic system message: base instruction, then the profile
/// block, then the chunk summaries. Empty blocks are left out.
pub fn render_system_prompt(
    base: &str,
    profile: &UserProfile,
    history: &[CompressionChunk],
    max_personal_details: usize,
) -> String {
    let mut sections = vec![base.trim().to_string()];

    let profile_lines = profile_lines(profile, max_personal_details);
    if !profile_lines.is_empty() {
        sections.push(format!("USER PROFILE:\n{}", profile_lines.join("\n")));
    }

    if !history.is_empty() {
        let chunks = history
            .iter()
            .map(|c| format!("Chunk {}: {}", c.chunk_number, c.summary))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!("CONVERSATION HISTORY:\n{}", chunks));
    }

    sections.join("\n\n")
}

fn profile_lines(profile: &UserProfile, max_personal_details: usize) -> Vec<String> {
    let mut lines = Vec::new();

    let scalars = [
        ("Name", &profile.name),
        ("Location", &profile.location),
        ("Profession", &profile.profession),
    ];
    for (label, value) in scalars {
        if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            lines.push(format!("- {}: {}", label, v));
        }
    }

    if !profile.interests.is_empty() {
        lines.push(format!("- Interests: {}", profile.interests.join(", ")));
    }

    let details: Vec<&str> = profile
        .personal_details
        .iter()
        .take(max_personal_details)
        .map(String::as_str)
        .collect();
    if !details.is_empty() {
        lines.push(format!("- Personal details: {}", details.join("; ")));
    }

    lines
}

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(messages: &[ChatMessage]) -> usize {
    let chars: usize = messages.iter().map(ChatMessage::char_len).sum();
    chars.div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_only_when_nothing_known() {
        let prompt = render_system_prompt("Be kind.", &UserProfile::default(), &[], 3);
        assert_eq!(prompt, "Be kind.");
    }

    #[test]
    fn test_profile_block_fixed_order() {
        let profile = UserProfile {
            name: Some("Ines".into()),
            location: None,
            profession: Some("architect".into()),
            interests: vec!["sailing".into(), "fado".into()],
            personal_details: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            relationships: vec!["brother Rui".into()],
            preferences: vec![],
        };

        let prompt = render_system_prompt("Base.", &profile, &[], 3);
        assert_eq!(
            prompt,
            "Base.\n\nUSER PROFILE:\n- Name: Ines\n- Profession: architect\n- Interests: sailing, fado\n- Personal details: a; b; c"
        );
    }

    #[test]
    fn test_history_block_in_chunk_order() {
        let history = vec![
            CompressionChunk::new(1, "first", 20),
            CompressionChunk::new(2, "second", 20),
        ];
        let prompt = render_system_prompt("Base.", &UserProfile::default(), &history, 3);
        assert!(prompt.ends_with("CONVERSATION HISTORY:\nChunk 1: first\nChunk 2: second"));
        assert!(!prompt.contains("USER PROFILE"));
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(&[]), 0);
        assert_eq!(estimate_tokens(&[ChatMessage::user("abcde")]), 2);
        assert_eq!(
            estimate_tokens(&[ChatMessage::user("abcd"), ChatMessage::assistant("efgh")]),
            2
        );
    }
}
