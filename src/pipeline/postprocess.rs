//! Post-processing: deterministic cleanup of the stage-1 Markdown report.
//!
//! The business-process reply is stored and shown as-is, so only quirks that
//! change nothing about its content are fixed here:
//!
//! - an outer ` ```markdown ... ``` ` fence the prompt asked the model to omit
//! - `\r\n` line endings
//! - trailing spaces and runs of blank lines
//! - zero-width characters and stray byte-order marks
//!
//! Rules run in a fixed order: fences are stripped before line endings are
//! normalised, and the final-newline pass runs last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model reply.
///
/// Returns an empty string when the reply has no visible text, so the caller
/// can tell an empty answer apart from a short one.
pub fn tidy_markdown(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?[ \t]*\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip invisible Unicode ──────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse runs of blank lines to one ──────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

// ── Rule 6: Single final newline, no leading blank lines ─────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_start_matches('\n').trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}
