//! Output normalizer.
//!
//! Model output arrives as loosely formatted text. This pass rewrites known
//! section phrases into `## ` headings and tidies list markers so the front
//! end can render every answer the same way. It never fails and
//! `normalize(normalize(x)) == normalize(x)`.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Section phrases promoted to headings, in canonical spelling.
pub const SECTION_PHRASES: &[&str] = &[
    "Situation Overview",
    "Immediate Actions",
    "Resource Utilization",
    "Resource Allocation",
    "Safety Considerations",
    "Evacuation Plan",
    "Communication Plan",
    "Ongoing Monitoring",
    "Summary",
    "Recommendations",
];

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = SECTION_PHRASES
        .iter()
        .map(|phrase| phrase.split(' ').collect::<Vec<_>>().join(r"[ \t]+"))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(
        r"(?mi)^[ \t]*(?:#+[ \t]*)?(?:\*\*)?[ \t]*({})[ \t]*:?[ \t]*(?:\*\*)?[ \t]*:?[ \t]*$",
        alternatives
    );
    Regex::new(&pattern).expect("heading regex is valid")
});

static NUMBERED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([ \t]*)(\d+)\.[ \t]*([^\d\s])").expect("numbered regex is valid")
});

static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([ \t]*)-[ \t]*([^\s\d\-])").expect("bullet regex is valid")
});

/// Reformat free-text model output into consistent structured text.
pub fn normalize(text: &str) -> String {
    // Line patterns only see `\n` endings and ASCII blanks, so trim first.
    let text = text.replace("\r\n", "\n");
    let text = text.trim();

    let text = HEADING_RE.replace_all(text, |caps: &Captures| {
        format!("## {}", canonical_phrase(&caps[1]))
    });
    let text = NUMBERED_RE.replace_all(&text, "$1$2. $3");
    let text = BULLET_RE.replace_all(&text, "$1- $2");
    text.into_owned()
}

fn canonical_phrase(matched: &str) -> &'static str {
    let wanted = matched.split_whitespace().collect::<Vec<_>>().join(" ");
    SECTION_PHRASES
        .iter()
        .find(|phrase| phrase.eq_ignore_ascii_case(&wanted))
        .copied()
        .unwrap_or("Summary")
}
