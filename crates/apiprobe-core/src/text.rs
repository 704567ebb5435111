//! Text utilities shared by the pipeline and the LLM adapters.
//!
//! All helpers are UTF-8 safe: they cut on character boundaries, never inside
//! a multi-byte character.

/// Truncates a string to `max_chars` characters, appending "..." if truncated.
///
/// # Examples
///
/// ```
/// use apiprobe_core::truncate_with_ellipsis;
///
/// assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
/// assert_eq!(truncate_with_ellipsis("hello world", 5), "hello...");
/// ```
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
    }
}

/// Removes a surrounding Markdown code fence from a model reply.
///
/// Handles ```` ```json ```` style openers and replies with prose before the
/// fence. Text without a fence is returned trimmed.
pub fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };
    let after_open = &trimmed[open + 3..];
    // Skip the info string (e.g. "json") up to the end of the opener line.
    let content_start = after_open.find('\n').map_or(after_open.len(), |i| i + 1);
    let content = &after_open[content_start..];
    match content.rfind("```") {
        Some(close) => content[..close].trim(),
        None => content.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_exact_length_is_untouched() {
        assert_eq!(truncate_with_ellipsis("hello", 5), "hello");
        assert_eq!(truncate_with_ellipsis("", 3), "");
    }

    #[test]
    fn test_truncate_does_not_split_characters() {
        assert_eq!(truncate_with_ellipsis("日本語テキスト", 3), "日本語...");
        assert_eq!(truncate_with_ellipsis("🎉🎊🎁", 2), "🎉🎊...");
    }

    #[test]
    fn test_strip_code_fences_with_language_tag() {
        let reply = "```json\n{\"cases\": []}\n```";
        assert_eq!(strip_code_fences(reply), "{\"cases\": []}");
    }

    #[test]
    fn test_strip_code_fences_with_leading_prose() {
        let reply = "Here you go:\n```\n[1, 2]\n```\nThanks";
        assert_eq!(strip_code_fences(reply), "[1, 2]");
    }

    #[test]
    fn test_strip_code_fences_plain_text() {
        assert_eq!(strip_code_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_unterminated() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }
}
