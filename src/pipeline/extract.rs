//! Response extraction: recover a JSON value from a free-form model reply.
//!
//! Models wrap JSON in prose and code fences even when told not to, and long
//! replies sometimes end in commentary. The chain below tolerates both
//! without discarding a usable leading payload:
//!
//! 1. The interior of the first ` ``` ` fenced block, trimmed. A language
//!    tag on the fence line is dropped whether or not a newline follows it.
//! 2. Otherwise, from the earliest `{` or `[`, the longest prefix that parses
//!    as JSON. The scan shrinks the candidate from the end and is O(n²) in
//!    the worst case; replies are bounded by the model's output limit, so
//!    that stays in the low milliseconds.
//! 3. Otherwise the trimmed original text, which then fails to parse.
//!
//! Nothing here returns an error. Absence is `None` and the session decides
//! how to report it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RE_FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:[ \t]*[A-Za-z][A-Za-z0-9_+.-]*)?\s*(.*?)```").unwrap()
});

static RE_TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Pick the substring of `raw` most likely to be the JSON payload.
pub fn extract_json(raw: &str) -> &str {
    if let Some(caps) = RE_FENCED_BLOCK.captures(raw) {
        if let Some(inner) = caps.get(1) {
            return inner.as_str().trim();
        }
    }

    let trimmed = raw.trim();
    let Some(start) = trimmed.find(['{', '[']) else {
        return trimmed;
    };

    let rest = &trimmed[start..];
    // A JSON object or array can only end in a closing bracket, so the other
    // end positions cannot parse and are skipped.
    for (idx, ch) in rest.char_indices().rev() {
        if ch != '}' && ch != ']' {
            continue;
        }
        let candidate = &rest[..idx + ch.len_utf8()];
        if serde_json::from_str::<Value>(candidate).is_ok() {
            return candidate;
        }
    }

    trimmed
}

/// Strict JSON parse that maps any failure to `None`.
pub fn parse_json(candidate: &str) -> Option<Value> {
    serde_json::from_str(candidate).ok()
}

/// `parse_json(extract_json(raw))`, retried once with trailing commas
/// removed (`[1, 2,]`, `{"a": 1,}`), which models emit fairly often.
pub fn recover_json(raw: &str) -> Option<Value> {
    if let Some(value) = parse_json(extract_json(raw)) {
        return Some(value);
    }
    let repaired = strip_trailing_commas(raw);
    if repaired == raw {
        return None;
    }
    let value = parse_json(extract_json(&repaired));
    if value.is_some() {
        tracing::debug!("Recovered JSON after removing trailing commas");
    }
    value
}

/// Remove commas that directly precede `}` or `]`.
///
/// This is textual: a string literal containing `", ]"` is rewritten too.
/// It only runs after the strict parse has already failed.
pub fn strip_trailing_commas(raw: &str) -> String {
    RE_TRAILING_COMMA.replace_all(raw, "$1").into_owned()
}
