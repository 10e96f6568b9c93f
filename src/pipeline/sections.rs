//! Split a one-shot artifact reply into its three numbered sections.
//!
//! The report prompt asks for `1.` a test plan, `2.` test cases and `3.`
//! sample code. Models follow the numbering well but not the headings, so
//! the split keys only on the first line whose trimmed text starts with each
//! marker, in order. When any marker is missing the caller shows the raw
//! reply instead.

use serde::{Deserialize, Serialize};

/// The three parts of an artifact report, each without its marker line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSections {
    pub test_plan: String,
    pub test_cases: String,
    pub test_code: String,
}

const MARKERS: [&str; 3] = ["1.", "2.", "3."];

/// Returns `None` unless lines starting with `1.`, `2.` and `3.` appear in
/// that order.
pub fn split_sections(text: &str) -> Option<ArtifactSections> {
    let lines: Vec<&str> = text.lines().collect();

    let mut positions = [0usize; 3];
    let mut from = 0;
    for (slot, marker) in MARKERS.iter().enumerate() {
        let found = lines[from..]
            .iter()
            .position(|line| line.trim_start().starts_with(marker))?;
        positions[slot] = from + found;
        from = positions[slot] + 1;
    }

    let body = |start: usize, end: usize| lines[start + 1..end].join("\n").trim().to_string();

    Some(ArtifactSections {
        test_plan: body(positions[0], positions[1]),
        test_cases: body(positions[1], positions[2]),
        test_code: body(positions[2], lines.len()),
    })
}
