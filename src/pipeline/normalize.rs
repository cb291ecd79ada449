//! Text normalization and context building.
//!
//! Every downstream stage sees only the context string produced here:
//! normalized + demojized title, description and transcript, followed by the
//! first three top comments.

use std::sync::LazyLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::pipeline::types::ShortInput;

/// Placeholder for URL-shaped substrings.
pub const URL_PLACEHOLDER: &str = "[URL]";

/// Placeholder for email-shaped substrings.
pub const EMAIL_PLACEHOLDER: &str = "[EMAIL]";

/// How many top comments contribute to the context.
pub const CONTEXT_COMMENT_LIMIT: usize = 3;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"http\S+|www\S+").unwrap());

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+@\S+").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Zero-width and byte-order-mark characters stripped from all text.
const INVISIBLE_CHARS: [char; 4] = ['\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

/// Normalized fields of one short plus the combined context string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFields {
    pub title: String,
    pub description: String,
    pub transcript: String,
    pub context: String,
}

/// Redact URLs and emails, strip invisible characters, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let text = URL_RE.replace_all(text, URL_PLACEHOLDER);
    let text = EMAIL_RE.replace_all(&text, EMAIL_PLACEHOLDER);
    let text: String = text.chars().filter(|c| !INVISIBLE_CHARS.contains(c)).collect();
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Replace emoji glyphs with `:snake_case_name:` tokens.
///
/// Unknown glyphs are left untouched.
pub fn demojize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for grapheme in text.graphemes(true) {
        // ASCII digits, '#' and '*' are only emoji as keycap sequences.
        let emoji = if grapheme.is_ascii() {
            None
        } else {
            emojis::get(grapheme)
        };
        match emoji {
            Some(emoji) => {
                out.push(':');
                out.push_str(&emoji_token(emoji.name()));
                out.push(':');
            }
            None => out.push_str(grapheme),
        }
    }
    out
}

/// "flag: United States" -> "flag_united_states"
fn emoji_token(name: &str) -> String {
    let mut token = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !token.is_empty() {
                token.push('_');
            }
            pending_sep = false;
            token.extend(ch.to_lowercase());
        } else {
            pending_sep = true;
        }
    }
    token
}

/// Join the normalized fields and leading comments into one context string.
///
/// Empty parts contribute nothing, so there are never doubled separators.
pub fn build_context(
    title: &str,
    description: &str,
    transcript: &str,
    top_comments: &[String],
) -> String {
    let comments = top_comments
        .iter()
        .take(CONTEXT_COMMENT_LIMIT)
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    [title, description, transcript, comments.as_str()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize every text field of a short and build its context.
pub fn normalize_short(input: &ShortInput) -> NormalizedFields {
    let title = demojize(&normalize(&input.title));
    let description = demojize(&normalize(&input.description));
    let transcript = demojize(&normalize(&input.transcript));
    let context = build_context(&title, &description, &transcript, &input.top_comments);

    NormalizedFields {
        title,
        description,
        transcript,
        context,
    }
}
