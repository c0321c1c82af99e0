//! Property-Based Tests
//!
//! Invariants of the matchers and the repeat vote:
//! - Text copied verbatim into a page is always present and never absent
//! - Reading order follows the order of the copies
//! - Pass ratio is passing repeats over repeats, passed iff a strict majority

use indicatif::ProgressBar;
use ocrbench_core::align::{best_match_str, edit_distance_str};
use ocrbench_core::{evaluate, Assertion, AssertionSuite, EvalSettings, Evaluator};
use proptest::prelude::*;
use tempfile::TempDir;

fn text_assertion(kind: &str, text: &str) -> Assertion {
    serde_json::from_value(serde_json::json!({
        "id": "t",
        "pdf": "doc.pdf",
        "page": 1,
        "type": kind,
        "text": text,
    }))
    .unwrap()
}

// ============================================================================
// Matcher Properties
// ============================================================================

/// Property: verbatim text passes presence and fails absence
#[test]
fn proptest_verbatim_text() {
    proptest!(|(
        text in "[a-z]{1,8}( [a-z]{1,8}){0,4}",
        prefix in "[a-z .,]{0,60}",
        suffix in "[a-z .,]{0,60}"
    )| {
        let page = format!("{prefix} {text} {suffix}");
        let present = evaluate(&text_assertion("present", &text), &page).unwrap();
        prop_assert!(present.passed, "{}", present.explanation);
        let absent = evaluate(&text_assertion("absent", &text), &page).unwrap();
        prop_assert!(!absent.passed);
    });
}

/// Property: text sharing no characters with the page is absent
#[test]
fn proptest_disjoint_text_is_absent() {
    proptest!(|(text in "[a-m]{3,12}", page in "[n-z ]{0,200}")| {
        let absent = evaluate(&text_assertion("absent", &text), &page).unwrap();
        prop_assert!(absent.passed, "{}", absent.explanation);
        let present = evaluate(&text_assertion("present", &text), &page).unwrap();
        prop_assert!(!present.passed);
    });
}

/// Property: order passes for the page order and fails when reversed
#[test]
fn proptest_order_follows_page() {
    proptest!(|(before in "[a-m]{3,10}", after in "[n-z]{3,10}", filler in "[0-9 ]{0,40}")| {
        let assertion: Assertion = serde_json::from_value(serde_json::json!({
            "id": "o", "pdf": "doc.pdf", "page": 1, "type": "order",
            "before": before, "after": after,
        }))
        .unwrap();
        let forward = format!("{before} {filler} {after}");
        let reversed = format!("{after} {filler} {before}");
        prop_assert!(evaluate(&assertion, &forward).unwrap().passed);
        prop_assert!(!evaluate(&assertion, &reversed).unwrap().passed);
    });
}

/// Property: the best substring is never further than the whole text
#[test]
fn proptest_best_match_bounded_by_edit_distance() {
    proptest!(|(pattern in "[ab]{1,12}", text in "[abc]{0,40}")| {
        let found = best_match_str(&pattern, &text).unwrap();
        prop_assert!(found.distance <= edit_distance_str(&pattern, &text));
        prop_assert!(found.distance <= pattern.chars().count());
        prop_assert!(found.start <= found.end);
        prop_assert!(found.end <= text.chars().count());
        let span: String = text.chars().skip(found.start).take(found.end - found.start).collect();
        prop_assert_eq!(edit_distance_str(&pattern, &span), found.distance);
    });
}

// ============================================================================
// Repeat Vote Properties
// ============================================================================

/// Property: pass ratio is P/R and passed iff P/R > 0.5
#[test]
fn proptest_pass_ratio_is_majority_vote() {
    let config = ProptestConfig::with_cases(24);
    proptest!(config, |(votes in prop::collection::vec(any::<bool>(), 1..7))| {
        let dir = TempDir::new().unwrap();
        for (i, pass) in votes.iter().enumerate() {
            let page = if *pass { "the marker text" } else { "something else" };
            std::fs::write(dir.path().join(format!("doc_pg1_repeat{}.md", i + 1)), page).unwrap();
        }

        let mut suite = AssertionSuite::default();
        suite.push(text_assertion("present", "marker"), "set.jsonl").unwrap();
        let settings = EvalSettings { workers: 2, ..EvalSettings::default() };
        let report = Evaluator::new(&suite, &settings)
            .unwrap()
            .evaluate_candidate("tool", dir.path(), &ProgressBar::hidden())
            .unwrap();

        let passes = votes.iter().filter(|v| **v).count();
        #[allow(clippy::cast_precision_loss)]
        let expected = passes as f64 / votes.len() as f64;
        let verdict = report.verdicts().next().unwrap();
        prop_assert!((verdict.pass_ratio - expected).abs() < 1e-12);
        prop_assert_eq!(verdict.passed, 2 * passes > votes.len());
    });
}
