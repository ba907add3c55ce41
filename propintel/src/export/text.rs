//! Plain-text preparation for document output.
//!
//! Responses arrive as light HTML/markdown. Markup is converted to its
//! plain-text equivalent first (bullets, paragraph breaks), then text is
//! truncated by character count. For the PDF medium, text is additionally
//! folded to ASCII: the standard Helvetica font cannot render arbitrary
//! Unicode, so this step is lossy on purpose.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const BULLET: &str = "\u{2022} ";

static BREAK_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static LIST_ITEM_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<li[^>]*>").expect("valid regex"));
static PARAGRAPH_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</p\s*>").expect("valid regex"));
static BLOCK_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</(ul|ol|div|h[1-6]|tr|table)\s*>").expect("valid regex")
});
static ANY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static MD_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\*\*|__)(.+?)(\*\*|__)").expect("valid regex"));
static MD_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]+").expect("valid regex"));
static MD_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[-*+][ \t]+").expect("valid regex"));
static TRAILING_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)[ \t]+$").expect("valid regex"));
static EXTRA_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Convert HTML/markdown markup to plain text.
pub fn strip_markup(input: &str) -> String {
    let text = BREAK_TAG.replace_all(input, "\n");
    let text = LIST_ITEM_TAG.replace_all(&text, format!("\n{BULLET}"));
    let text = PARAGRAPH_END.replace_all(&text, "\n\n");
    let text = BLOCK_END.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = MD_BOLD.replace_all(&text, "$2");
    let text = MD_HEADING.replace_all(&text, "");
    let text = MD_BULLET.replace_all(&text, BULLET);
    let text = decode_entities(&text);
    let text = TRAILING_SPACE.replace_all(&text, "");
    let text = EXTRA_BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn decode_entities(input: &str) -> String {
    input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Fold text to printable ASCII.
///
/// Typographic punctuation maps to its ASCII look-alike, accented letters
/// lose their accents, and anything else non-ASCII becomes `?`.
pub fn to_ascii(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        if let Some(mapped) = punctuation(c) {
            out.push_str(mapped);
            continue;
        }
        let folded: String = std::iter::once(c)
            .nfkd()
            .filter(|d| !is_combining_mark(*d))
            .collect();
        if !folded.is_empty() && folded.is_ascii() {
            out.push_str(&folded);
        } else {
            out.push('?');
        }
    }
    out
}

const fn punctuation(c: char) -> Option<&'static str> {
    Some(match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => "'",
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => "\"",
        '\u{2013}' | '\u{2014}' | '\u{2212}' => "-",
        '\u{2026}' => "...",
        '\u{2022}' | '\u{25CF}' | '\u{25E6}' => "-",
        '\u{00A0}' | '\u{2009}' | '\u{202F}' => " ",
        '\u{00B0}' => " deg",
        '\u{00D7}' => "x",
        _ => return None,
    })
}

/// Truncate to at most `max_chars` characters, appending "..." when cut.
///
/// Budgets too small for the ellipsis get a plain cut.
pub fn truncate(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    if max_chars < 3 {
        return input.chars().take(max_chars).collect();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = input.chars().take(keep).collect();
    out.truncate(out.trim_end().len());
    out.push_str("...");
    out
}

/// Greedy word wrap to lines of at most `width` characters.
///
/// Existing line breaks are kept; words longer than `width` are split.
pub fn wrap(input: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in input.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word.to_string();
            loop {
                let line_len = line.chars().count();
                let word_len = word.chars().count();
                let needed = if line.is_empty() { word_len } else { line_len + 1 + word_len };
                if needed <= width {
                    if !line.is_empty() {
                        line.push(' ');
                    }
                    line.push_str(&word);
                    break;
                }
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                    continue;
                }
                let head: String = word.chars().take(width).collect();
                word = word.chars().skip(width).collect();
                lines.push(head);
                if word.is_empty() {
                    break;
                }
            }
        }
        lines.push(line);
    }

    while lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }
    lines
}
