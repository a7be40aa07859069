use crate::domain::model::Command;
use regex::Regex;
use std::sync::LazyLock;

static SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(整理|總結|summary)").expect("static regex"));

static DRAW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(畫|請畫|幫我畫)第([一二三四五12345])段").expect("static regex"));

const EXTRA_TRIM: &[char] = &[' ', '，', ',', '。', '.', '!', '！'];

/// Maps a paragraph numeral (一..五 or 1..5) to a zero-based index.
fn paragraph_index(numeral: &str) -> Option<usize> {
    let n = match numeral {
        "一" | "1" => 1,
        "二" | "2" => 2,
        "三" | "3" => 3,
        "四" | "4" => 4,
        "五" | "5" => 5,
        _ => return None,
    };
    Some(n - 1)
}

/// Summary keywords take precedence over draw requests.
pub fn parse_command(text: &str) -> Command {
    if SUMMARY_RE.is_match(text) {
        return Command::Summarize;
    }

    if let Some(caps) = DRAW_RE.captures(text) {
        if let Some(index) = caps.get(2).and_then(|m| paragraph_index(m.as_str())) {
            let extra = DRAW_RE
                .replace_all(text, "")
                .trim_matches(EXTRA_TRIM)
                .to_string();
            return Command::Draw { index, extra };
        }
    }

    Command::Chat
}
