//! Follow-up items and the document summary.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::MAX_SUMMARY_CHARS;

static FOLLOWUP_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(discussion points|follow[- ]?up|recommendations?|plan)\b").unwrap()
});

static SUMMARY_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(tl;dr|\bsummary\b|\bimpression\b)").unwrap());

static INLINE_IMPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*\*\*Impression:\*\*\s*(.+)$").unwrap());

static WHOLE_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\*[^*]+\*\*:?$").unwrap());

static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-•*]|\d+[.)])\s+(.+)$").unwrap());

/// Markdown heading, a fully bold line, or a short label ending in `:`.
fn is_heading(line: &str) -> bool {
    line.starts_with('#')
        || WHOLE_BOLD.is_match(line)
        || (line.ends_with(':') && line.len() <= 80 && !LIST_ITEM.is_match(line))
}

fn ends_block(line: &str) -> bool {
    line.starts_with("##") || line.starts_with("---")
}

/// Lines under the first heading matching `heading`, up to the next `##` or `---`.
fn block_after<'a>(lines: &[&'a str], heading: &Regex) -> Option<Vec<&'a str>> {
    let start = lines
        .iter()
        .position(|line| is_heading(line) && heading.is_match(line))?;
    Some(
        lines[start + 1..]
            .iter()
            .take_while(|line| !ends_block(line))
            .copied()
            .collect(),
    )
}

fn strip_emphasis(text: &str) -> String {
    text.replace('*', "").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Bulleted or numbered lines of the follow-up / plan section.
pub fn extract_followup_items(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let Some(block) = block_after(&lines, &FOLLOWUP_HEADING) else {
        return Vec::new();
    };
    block
        .iter()
        .filter_map(|line| LIST_ITEM.captures(line))
        .map(|c| strip_emphasis(&c[1]))
        .filter(|item| !item.is_empty())
        .collect()
}

/// Summary / impression / TL;DR text on one line, emphasis removed and cut
/// to [`MAX_SUMMARY_CHARS`].
pub fn extract_summary(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    let summary = block_after(&lines, &SUMMARY_HEADING)
        .map(|block| strip_emphasis(&block.join(" ")))
        .filter(|s| !s.is_empty())
        .or_else(|| {
            INLINE_IMPRESSION
                .captures(text)
                .map(|c| strip_emphasis(&c[1]))
                .filter(|s| !s.is_empty())
        })?;

    Some(summary.chars().take(MAX_SUMMARY_CHARS).collect())
}
