//! Helpers for reading a copied chat transcript.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    /// Written by the persona we reply as.
    Persona,
    Other,
}

/// How a transcript line is attributed to the persona.
///
/// `Prefix` matches lines that start with `"<persona>:"`, which is how most
/// desktop clients render a copied message. `Contains` matches the persona
/// name anywhere in the line, ignoring case; it is looser and will also treat
/// messages that merely mention the persona as the persona's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorHeuristic {
    #[default]
    Prefix,
    Contains,
}

/// Returns the last non-blank line of `chat_text`, trimmed, or `""`.
pub fn last_message(chat_text: &str) -> &str {
    chat_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .unwrap_or("")
}

/// Decides who wrote `line`. Blank lines are attributed to the persona so
/// that nothing is ever sent in response to them.
pub fn classify_author(line: &str, persona_name: &str, heuristic: AuthorHeuristic) -> Author {
    let line = line.trim_start();
    if line.is_empty() {
        return Author::Persona;
    }
    let is_persona = match heuristic {
        AuthorHeuristic::Prefix => line.starts_with(&format!("{persona_name}:")),
        AuthorHeuristic::Contains => line
            .to_lowercase()
            .contains(&persona_name.to_lowercase()),
    };
    if is_persona {
        Author::Persona
    } else {
        Author::Other
    }
}
