
use std::sync::LazyLock;

use fancy_regex::Regex;
use itertools::Itertools;

use super::ConversationMessage;

/// Anything that is not a letter, a number or whitespace; combining marks
/// included
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]").expect("non-word pattern is valid"));

/// Lowercase, replace everything but letters, numbers and whitespace with a
/// space, and collapse whitespace runs
#[inline]
pub fn normalize_query_text(text: &str) -> String {
    NON_WORD
        .replace_all(&text.to_lowercase(), " ")
        .split_whitespace()
        .join(" ")
}

/// Search terms of a query: normalized words longer than one character,
/// at most `max_terms` of them
#[inline]
pub fn query_terms(text: &str, max_terms: usize) -> Vec<String> {
    normalize_query_text(text)
        .split(' ')
        .filter(|term| term.chars().count() > 1)
        .take(max_terms)
        .map(str::to_string)
        .collect()
}

/// FTS5 expression matching any term as a word prefix, or `None` when no
/// term survives filtering
#[inline]
pub fn build_match_query(text: &str, max_terms: usize) -> Option<String> {
    let terms = query_terms(text, max_terms);
    if terms.is_empty() {
        return None;
    }

    Some(terms.iter().map(|term| format!("{}*", term)).join(" OR "))
}

/// The prompt followed by the most recent `turns` user messages
#[inline]
pub fn compose_query_text(
    prompt: &str,
    conversation: &[ConversationMessage],
    turns: usize,
) -> String {
    let user_turns: Vec<&str> = conversation
        .iter()
        .filter(|message| message.is_user)
        .map(|message| message.text.as_str())
        .collect();
    let recent = &user_turns[user_turns.len().saturating_sub(turns)..];

    std::iter::once(prompt)
        .chain(recent.iter().copied())
        .filter(|text| !text.is_empty())
        .join(" ")
        .trim()
        .to_string()
}
