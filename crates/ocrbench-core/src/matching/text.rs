//! Presence, absence and reading-order matchers.

use super::Outcome;
use crate::align::{best_match, Alignment};
use crate::assertion::{OrderRule, TextRule};
use crate::normalize::normalize_text;

/// Pass criterion for an alignment.
#[derive(Debug, Clone, Copy)]
enum Budget {
    MaxDiffs(usize),
    Threshold(f64),
}

impl Budget {
    fn for_rule(rule: &TextRule) -> Self {
        rule.threshold
            .map_or(Self::MaxDiffs(rule.max_diffs as usize), Self::Threshold)
    }

    fn accepts(self, alignment: &Alignment, pattern_len: usize) -> bool {
        match self {
            Self::MaxDiffs(max) => alignment.distance <= max,
            Self::Threshold(min) => alignment.similarity(pattern_len) >= min,
        }
    }

    fn describe(self) -> String {
        match self {
            Self::MaxDiffs(max) => format!("max_diffs {max}"),
            Self::Threshold(min) => format!("threshold {min:.2}"),
        }
    }
}

/// Normalized, case-folded pattern and the candidate windows to search.
struct Prepared {
    pattern: Vec<char>,
    windows: Vec<Vec<char>>,
}

fn prepare(rule: &TextRule, candidate: &str) -> Prepared {
    let mut pattern = normalize_text(&rule.text);
    let mut content = normalize_text(candidate);
    if !rule.case_sensitive {
        pattern = pattern.to_lowercase();
        content = content.to_lowercase();
    }

    let chars: Vec<char> = content.chars().collect();
    let windows = match (rule.first_n, rule.last_n) {
        (None, None) => vec![chars],
        (first, last) => {
            let mut windows = Vec::with_capacity(2);
            if let Some(n) = first {
                windows.push(chars[..n.min(chars.len())].to_vec());
            }
            if let Some(n) = last {
                windows.push(chars[chars.len().saturating_sub(n)..].to_vec());
            }
            windows
        }
    };

    Prepared {
        pattern: pattern.chars().collect(),
        windows,
    }
}

/// Best alignment across windows; the earlier window wins ties.
fn best_in_windows(prepared: &Prepared) -> Option<(Alignment, &[char])> {
    let mut best: Option<(Alignment, &[char])> = None;
    for window in &prepared.windows {
        if let Some(found) = best_match(&prepared.pattern, window) {
            if best.is_none_or(|(b, _)| found.distance < b.distance) {
                best = Some((found, window.as_slice()));
            }
        }
    }
    best
}

fn excerpt(window: &[char], alignment: &Alignment) -> String {
    window[alignment.start..alignment.end].iter().collect()
}

pub(super) fn presence(rule: &TextRule, candidate: &str) -> Outcome {
    let prepared = prepare(rule, candidate);
    let budget = Budget::for_rule(rule);

    match best_in_windows(&prepared) {
        Some((found, _)) if budget.accepts(&found, prepared.pattern.len()) => Outcome::pass(),
        Some((found, window)) => Outcome::fail(format!(
            "Expected text '{}' not found; best match '{}' at distance {} ({})",
            rule.text,
            excerpt(window, &found),
            found.distance,
            budget.describe()
        )),
        None => Outcome::fail(format!("Expected text '{}' not found", rule.text)),
    }
}

pub(super) fn absence(rule: &TextRule, candidate: &str) -> Outcome {
    let prepared = prepare(rule, candidate);
    let budget = Budget::for_rule(rule);

    match best_in_windows(&prepared) {
        Some((found, window)) if budget.accepts(&found, prepared.pattern.len()) => {
            Outcome::fail(format!(
                "Forbidden text '{}' found as '{}' at distance {} ({})",
                rule.text,
                excerpt(window, &found),
                found.distance,
                budget.describe()
            ))
        }
        _ => Outcome::pass(),
    }
}

pub(super) fn order(rule: &OrderRule, candidate: &str) -> Outcome {
    let content: Vec<char> = normalize_text(candidate).chars().collect();
    let max = rule.max_diffs as usize;

    let locate = |text: &str| -> Option<Alignment> {
        let pattern: Vec<char> = normalize_text(text).chars().collect();
        best_match(&pattern, &content).filter(|found| found.distance <= max)
    };

    let Some(before) = locate(&rule.before) else {
        return Outcome::fail(format!(
            "Could not find 'before' text '{}' (max_diffs {})",
            rule.before, rule.max_diffs
        ));
    };
    let Some(after) = locate(&rule.after) else {
        return Outcome::fail(format!(
            "Could not find 'after' text '{}' (max_diffs {})",
            rule.after, rule.max_diffs
        ));
    };

    if before.end <= after.start {
        Outcome::pass()
    } else {
        Outcome::fail(format!(
            "'{}' (chars {}..{}) does not precede '{}' (chars {}..{})",
            rule.before, before.start, before.end, rule.after, after.start, after.end
        ))
    }
}
