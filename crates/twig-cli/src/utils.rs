//! Shared utilities

use twig_engine::MessageNode;

/// Truncate a string to `max` characters, appending "..." if truncated.
/// Operates on Unicode char boundaries, not bytes.
pub fn truncate_chars(s: &str, max: usize) -> String {
    let mut chars = s.chars();
    let truncated: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}

/// One-line preview of a message: role, flags, and the start of its text
pub fn message_preview(node: &MessageNode, max: usize) -> String {
    let message = &node.message;
    let mut flags = String::new();
    if message.is_summary {
        flags.push_str(" summary");
    }
    if message.is_summarized {
        flags.push_str(" summarized");
    }
    if message.hidden {
        flags.push_str(" hidden");
    }
    let text = message.summary_text().unwrap_or(&message.content);
    let text = if text.is_empty() { "(empty)" } else { text };
    format!(
        "[{}{}] {}",
        message.role,
        flags,
        truncate_chars(text, max).replace('\n', " ")
    )
}
