//! Text normalization shared by every matcher.
//!
//! Candidate markdown and assertion text go through the same pipeline so that
//! formatting noise (line wrapping, emphasis markers, typographic quotes) never
//! counts against the edit-distance budget.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is a compile-time constant"));

static LINE_BREAK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>").expect("line break pattern is a compile-time constant")
});

static BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold pattern is a compile-time constant"));

static ITALIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*(.*?)\*").expect("italic pattern is a compile-time constant"));

/// Map typographic punctuation to its ASCII counterpart.
#[must_use]
pub fn canonical_char(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => '"',
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' => '-',
        '\u{FF3F}' => '_',
        '\u{00A0}' | '\u{2007}' | '\u{202F}' => ' ',
        '\u{00D7}' => 'x',
        other => other,
    }
}

/// Replace typographic punctuation and expand the ellipsis character.
#[must_use]
pub fn canonicalize_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\u{2026}' {
            out.push_str("...");
        } else {
            out.push(canonical_char(c));
        }
    }
    out
}

/// Full normalization: `<br>` tags, whitespace runs, emphasis markers and
/// punctuation.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let text = LINE_BREAK_TAG.replace_all(text, " ");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    canonicalize_punctuation(text.trim())
}

/// Collapse whitespace only. Used for table cells, where emphasis is rare
/// and the markers are already stripped by the table parser.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize_text("  Hello\n\n  World\t!  "), "Hello World !");
    }

    #[test]
    fn test_strips_emphasis() {
        assert_eq!(
            normalize_text("a **bold** and *italic* word"),
            "a bold and italic word"
        );
    }

    #[test]
    fn test_line_break_tags() {
        assert_eq!(normalize_text("first<br>second<BR/>third"), "first second third");
    }

    #[test]
    fn test_canonical_punctuation() {
        assert_eq!(
            normalize_text("\u{201C}quoted\u{201D} \u{2014} it\u{2019}s\u{2026}"),
            "\"quoted\" - it's..."
        );
    }

    #[test]
    fn test_collapse_whitespace_keeps_markers() {
        assert_eq!(collapse_whitespace(" *a*\n b "), "*a* b");
    }
}
