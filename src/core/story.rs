use regex::Regex;
use std::sync::LazyLock;

static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.?\s*").expect("static regex"));

/// Shown to the user when the model produced no summary.
pub const PLACEHOLDER_SUMMARY: &str = "1.  \n2.  \n3.  \n4.  \n5.  ";

/// Splits a numbered summary into at most `max` paragraphs.
pub fn extract_paragraphs(summary: &str, max: usize) -> Vec<String> {
    summary
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| LIST_MARKER_RE.replace(line, "").into_owned())
        .take(max)
        .collect()
}

pub fn build_scene_prompt(base_style: &str, main_desc: &str, extra: &str) -> String {
    let mut parts = vec![base_style, main_desc];
    if !extra.is_empty() {
        parts.push(extra);
    }
    parts.join(" ")
}

/// Truncates on a char boundary for log lines.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
