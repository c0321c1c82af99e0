//! Math matcher: normalized LaTeX alignment.
//!
//! Equations are recovered from the usual delimiters and compared as strings
//! after normalization. Two expressions that are equal only symbolically
//! (different parenthesization, reordered terms) do not match.

// Similarity is reported as f64
#![allow(clippy::cast_precision_loss)]

use super::Outcome;
use crate::align::best_match;
use crate::assertion::MathRule;
use crate::normalize::canonicalize_punctuation;
use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum similarity between the expected expression and a recovered span.
pub const MATH_SIMILARITY_THRESHOLD: f64 = 0.9;

static DISPLAY_DOLLARS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\$\$(.+?)\$\$").expect("display math pattern is a compile-time constant")
});

static DISPLAY_BRACKETS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\\\[(.+?)\\\]").expect("bracket math pattern is a compile-time constant")
});

static INLINE_PARENS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\\\((.+?)\\\)").expect("paren math pattern is a compile-time constant")
});

static ENVIRONMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)\\begin\{(?:equation|align|gather|multline|eqnarray)\*?\}(.+?)\\end\{(?:equation|align|gather|multline|eqnarray)\*?\}",
    )
    .expect("environment pattern is a compile-time constant")
});

/// Inline `$...$` whose delimiters hug non-space characters, so currency
/// such as `$5 and $10` does not pair up.
static INLINE_DOLLAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$([^\s$](?:[^$\n]*[^\s$])?)\$")
        .expect("inline math pattern is a compile-time constant")
});

static SIZING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:left|right|displaystyle|textstyle|big|Big|bigg|Bigg)\b")
        .expect("sizing pattern is a compile-time constant")
});

static SPACING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[,;:! ]").expect("spacing pattern is a compile-time constant"));

static SINGLE_BRACED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(\w)\}").expect("brace pattern is a compile-time constant"));

/// Recover LaTeX spans from candidate text, in document order per delimiter.
#[must_use]
pub fn extract_equations(text: &str) -> Vec<String> {
    let mut equations = Vec::new();
    let mut remaining = text.to_string();

    // Block forms first, blanking them out so `$` scanning cannot pair
    // delimiters across them.
    for pattern in [&*ENVIRONMENT, &*DISPLAY_DOLLARS, &*DISPLAY_BRACKETS, &*INLINE_PARENS] {
        for caps in pattern.captures_iter(&remaining) {
            equations.push(caps[1].to_string());
        }
        remaining = pattern.replace_all(&remaining, " ").into_owned();
    }

    for caps in INLINE_DOLLAR.captures_iter(&remaining) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        // A closing `$` directly before a digit opens an amount instead.
        if remaining[whole.end()..].starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        equations.push(caps[1].to_string());
    }

    equations
}

/// Canonical string form of a LaTeX expression.
#[must_use]
pub fn normalize_latex(latex: &str) -> String {
    let text = canonicalize_punctuation(latex);
    let text = SIZING.replace_all(&text, "");
    let text = SPACING.replace_all(&text, "");
    let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    SINGLE_BRACED.replace_all(&text, "$1").into_owned()
}

pub(super) fn math(rule: &MathRule, candidate: &str) -> Outcome {
    let expected: Vec<char> = normalize_latex(&rule.math).chars().collect();
    let equations = extract_equations(candidate);
    if equations.is_empty() {
        return Outcome::fail("No LaTeX equations found in candidate output".to_string());
    }

    let mut best: Option<(f64, &str)> = None;
    for equation in &equations {
        let normalized: Vec<char> = normalize_latex(equation).chars().collect();
        let Some(found) = best_match(&expected, &normalized) else {
            continue;
        };
        let score = found.similarity(expected.len());
        if score >= MATH_SIMILARITY_THRESHOLD {
            return Outcome::pass();
        }
        if best.is_none_or(|(s, _)| score > s) {
            best = Some((score, equation.as_str()));
        }
    }

    match best {
        Some((score, equation)) => Outcome::fail(format!(
            "Closest of {} equation(s) is '{}' with similarity {:.2} (needs {:.2})",
            equations.len(),
            equation.trim(),
            score,
            MATH_SIMILARITY_THRESHOLD
        )),
        None => Outcome::fail(format!("Expression '{}' is empty after normalization", rule.math)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(math: &str) -> MathRule {
        MathRule {
            math: math.to_string(),
        }
    }

    #[test]
    fn test_extract_delimiters() {
        let text = "Inline $a+b$ and display $$c = d$$ and \\[e\\] and \\(f\\).\n\
                    \\begin{equation}g=h\\end{equation}";
        let mut found = extract_equations(text);
        found.sort();
        assert_eq!(found, vec!["a+b", "c = d", "e", "f", "g=h"]);
    }

    #[test]
    fn test_display_dollars_not_split_into_inline() {
        let found = extract_equations("$$x^2$$ then $y$");
        assert_eq!(found, vec!["x^2", "y"]);
    }

    #[test]
    fn test_currency_is_not_inline_math() {
        assert!(extract_equations("It costs $5 and $10 in total.").is_empty());
        assert!(extract_equations("Prices: $5$10 each").is_empty());
        assert_eq!(
            extract_equations("Let $x$ cost $5 and $10."),
            vec!["x"]
        );
    }

    #[test]
    fn test_normalize_latex() {
        assert_eq!(
            normalize_latex("\\left( x^{2} \\, + \\; y \\right)"),
            "(x^2+y)"
        );
        assert_eq!(normalize_latex("\\leftarrow"), "\\leftarrow");
    }

    #[test]
    fn test_math_matches_despite_spacing() {
        let candidate = "The energy is $$E = m c^{2}$$ as shown.";
        assert!(math(&rule("E=mc^2"), candidate).passed);
    }

    #[test]
    fn test_math_mismatch() {
        let outcome = math(&rule("\\int_0^1 f(x) dx"), "We have $$a^2 + b^2 = c^2$$.");
        assert!(!outcome.passed);
        assert!(outcome.explanation.contains("similarity"));
    }

    #[test]
    fn test_math_without_equations() {
        let outcome = math(&rule("x"), "no math here");
        assert!(!outcome.passed);
        assert!(outcome.explanation.contains("No LaTeX"));
    }

    #[test]
    fn test_math_unicode_minus() {
        assert!(math(&rule("a-b"), "\\(a \u{2212} b\\)").passed);
    }
}
