//! Text normalisation: reduces a raw answer to its "core meaning".
//!
//! Two transforms live here and must not be confused:
//! - [`normalize`] drops reasoning blocks, unwraps `**bold**` spans, removes
//!   hedge words and collapses whitespace.
//! - [`extract_answer`] is the post-processor applied to raw model output
//!   before scoring; it keeps only the first bold span (or first usable line).

use std::sync::LazyLock;

use regex::Regex;

/// Hedge words and filler phrases removed during normalisation.
/// Longer entries come first so alternation prefers them.
const FILLERS: &[&str] = &[
    "一般来说",
    "就是说",
    "我觉得",
    "我认为",
    "基本上",
    "那个",
    "这个",
    "可能",
    "应该",
    "大概",
    "通常",
    "嗯",
    "啊",
    "呃",
    "you know",
    "i believe",
    "i think",
    "well",
    "um",
    "uh",
];

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think pattern"));

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern"));

static FILLER: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = FILLERS
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("filler pattern")
});

/// Reduce `text` to its core meaning.
///
/// The pass is repeated until the output stops changing: removing one filler
/// can bring two words together that form another one ("you um know"), and
/// callers rely on `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    let mut current = normalize_once(text);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(text: &str) -> String {
    let text = THINK_BLOCK.replace_all(text, "");
    let text = BOLD.replace_all(&text, "${1}");
    let text = FILLER.replace_all(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pull the candidate answer out of a raw model response.
///
/// Reasoning blocks are dropped, then the first `**bold**` span wins; without
/// one, the first non-empty line not starting with `>` is returned.
pub fn extract_answer(text: &str) -> String {
    let text = THINK_BLOCK.replace_all(text, "");

    if let Some(caps) = BOLD.captures(&text) {
        return caps[1].trim().to_string();
    }

    text.split('\n')
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('>'))
        .map(str::to_string)
        .unwrap_or_else(|| text.trim().to_string())
}

/// Split `text` into word tokens: maximal runs of Unicode alphanumerics.
///
/// CJK text without spaces yields one token per run, and a lone ideograph
/// such as `猫` is a token by itself.
pub fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_think_blocks_across_lines() {
        let raw = "<think>step one\nstep two</think>巴黎";
        assert_eq!(normalize(raw), "巴黎");
    }

    #[test]
    fn think_removal_is_non_greedy() {
        let raw = "<think>a</think>keep<think>b</think>";
        assert_eq!(normalize(raw), "keep");
    }

    #[test]
    fn unclosed_think_is_left_alone() {
        let raw = "<think>still thinking about Paris";
        assert_eq!(normalize(raw), raw);
    }

    #[test]
    fn unwraps_bold_markers() {
        assert_eq!(normalize("**北京**"), "北京");
        assert_eq!(normalize("The answer is **Paris**."), "The answer is Paris.");
    }

    #[test]
    fn removes_english_fillers_case_insensitively() {
        assert_eq!(normalize("Well, I think it's Paris"), ", it's Paris");
        assert_eq!(normalize("UM the cat"), "the cat");
    }

    #[test]
    fn fillers_need_word_boundaries() {
        assert_eq!(normalize("umbrella"), "umbrella");
        assert_eq!(normalize("wellness"), "wellness");
    }

    #[test]
    fn removes_chinese_fillers() {
        assert_eq!(normalize("嗯，北京"), "，北京");
        assert_eq!(normalize("我觉得 北京"), "北京");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(normalize("  a \t b\n\nc  "), "a b c");
    }

    #[test]
    fn repeats_until_stable() {
        assert_eq!(normalize("you um know"), "");
        let once = normalize("i uh think so");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("<think>x</think>"), "");
    }

    #[test]
    fn extract_prefers_first_bold_span() {
        let raw = "<think>hmm **wrong**</think>The capital is **北京**, not **上海**.";
        assert_eq!(extract_answer(raw), "北京");
    }

    #[test]
    fn extract_falls_back_to_first_plain_line() {
        let raw = "\n> quoted context\n\n  Paris is the answer  \nmore";
        assert_eq!(extract_answer(raw), "Paris is the answer");
    }

    #[test]
    fn extract_returns_trimmed_text_when_nothing_else_matches() {
        assert_eq!(extract_answer("> only a quote"), "> only a quote");
        assert_eq!(extract_answer("   "), "");
    }

    #[test]
    fn words_split_on_non_alphanumerics() {
        let got: Vec<&str> = words("hello, world! 猫 北京市").collect();
        assert_eq!(got, vec!["hello", "world", "猫", "北京市"]);
    }
}
