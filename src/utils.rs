use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Turns raw model output into a sendable chat line: drops a leading
/// `"<persona>:"`, strips surrounding quotes and folds newlines into spaces
/// so pressing Return sends the whole reply at once.
pub fn clean_reply(raw: &str, persona_name: &str) -> String {
    let mut reply = raw.trim();
    if let Some(rest) = reply.strip_prefix(&format!("{persona_name}:")) {
        reply = rest.trim();
    }
    let reply = reply.trim_matches(|c| c == '"' || c == '\'').trim();
    WHITESPACE_RUN.replace_all(reply, " ").into_owned()
}

/// Shortens `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_persona_prefix_and_quotes() {
        assert_eq!(clean_reply("Nitesh: \"Haan bhai, bol?\"", "Nitesh"), "Haan bhai, bol?");
        assert_eq!(clean_reply("  'Sahi hai yaar!'  ", "Nitesh"), "Sahi hai yaar!");
        assert_eq!(clean_reply("Alice: hi", "Nitesh"), "Alice: hi");
    }

    #[test]
    fn keeps_inner_quotes_and_folds_newlines() {
        assert_eq!(
            clean_reply("He said \"no\" though\n\nwhy?", "Nitesh"),
            "He said \"no\" though why?"
        );
    }

    #[test]
    fn quote_only_output_is_empty() {
        assert_eq!(clean_reply("Nitesh: \"\"", "Nitesh"), "");
        assert_eq!(clean_reply("   ", "Nitesh"), "");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 30), "short");
        assert_eq!(truncate_chars("नमस्ते दोस्त", 3), "नमस...");
    }
}
