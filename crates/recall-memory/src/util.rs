/// Locate the JSON object in a model reply that may wrap it in a markdown
/// fence or surround it with prose. Returns `None` when there is no object.
pub(crate) fn extract_json_object(content: &str) -> Option<&str> {
    let mut body = content.trim();

    if let Some(start) = body.find("```") {
        let after_ticks = &body[start + 3..];
        // skip the language tag line, if any
        let after_tag = match after_ticks.find('\n') {
            Some(newline) if !after_ticks[..newline].contains('{') => &after_ticks[newline + 1..],
            _ => after_ticks,
        };
        body = match after_tag.find("```") {
            Some(end) => &after_tag[..end],
            None => after_tag,
        };
    }

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when cut.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
