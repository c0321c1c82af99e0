//! Text summaries, failed-assertion export and the HTML report.

use crate::assertion::{save_assertions, Assertion, AssertionKind};
use crate::config::EvalSettings;
use crate::error::{BenchError, Result};
use crate::evaluator::CandidateReport;
use crate::stats::{
    bootstrap_ci, grouped_outcomes, overall_score, per_file_scores, ConfidenceInterval,
    GroupScore, PermutationResult,
};
use crate::suite::AssertionSuite;
use pulldown_cmark::{html, Event, Options, Parser};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

/// Scores of one candidate, ready for printing.
#[derive(Debug, Clone)]
pub struct CandidateScore<'a> {
    pub report: &'a CandidateReport,
    pub groups: BTreeMap<String, GroupScore>,
    /// Mean of per-file scores; 0 with errors.
    pub score: f64,
    pub ci: ConfidenceInterval,
}

impl<'a> CandidateScore<'a> {
    #[must_use]
    pub fn compute(
        suite: &AssertionSuite,
        report: &'a CandidateReport,
        settings: &EvalSettings,
    ) -> Self {
        let groups = per_file_scores(suite, report);
        let score = overall_score(&groups);
        let ci = bootstrap_ci(
            &grouped_outcomes(suite, report),
            settings.bootstrap_samples,
            settings.confidence_level,
            settings.seed,
        );
        Self {
            report,
            groups,
            score,
            ci,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.groups.values().map(|g| g.total).sum()
    }

    /// Closing line of the per-candidate block.
    #[must_use]
    pub fn score_line(&self, level: f64) -> String {
        format!(
            "Average Score: {:.1}% ({:.0}% CI: [{:.1}%, {:.1}%]) over {} tests.",
            self.score * 100.0,
            level * 100.0,
            self.ci.lower * 100.0,
            self.ci.upper * 100.0,
            self.total()
        )
    }
}

/// Final summary across candidates, in the given order.
#[must_use]
pub fn format_summary(scores: &[CandidateScore<'_>], level: f64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(60));
    let _ = writeln!(
        out,
        "Final Summary with {:.0}% Confidence Intervals:",
        level * 100.0
    );

    for scored in scores {
        let report = scored.report;
        let (status, width) = if report.has_errors() {
            ("FAILED (errors)".to_string(), String::new())
        } else {
            (
                format!("{:.1}%", scored.score * 100.0),
                format!("± {:.1}%", scored.ci.half_width() * 100.0),
            )
        };
        let _ = writeln!(
            out,
            "{:20} : Average Score: {} {} (average of per-file scores)",
            report.name, status, width
        );

        for (kind, ratios) in &report.kind_breakdown {
            let avg = if ratios.is_empty() {
                0.0
            } else {
                #[allow(clippy::cast_precision_loss)]
                let n = ratios.len() as f64;
                ratios.iter().sum::<f64>() / n * 100.0
            };
            let _ = writeln!(
                out,
                "    {kind:8}: {avg:.1}% average pass rate over {} tests",
                ratios.len()
            );
        }

        let _ = writeln!(out, "\n    Results by file:");
        for (file, group) in &scored.groups {
            if group.total > 0 {
                let _ = writeln!(
                    out,
                    "        {:30}: {:.1}% ({}/{} tests)",
                    file,
                    group.score() * 100.0,
                    group.passed,
                    group.total
                );
            }
        }
        out.push('\n');
    }
    out
}

/// One line describing a pairwise comparison.
#[must_use]
pub fn format_comparison(first: &str, second: &str, result: &PermutationResult) -> String {
    format!(
        "{first} vs {second}: difference {:+.1}% over {} paired assertions, p = {:.4}",
        result.observed * 100.0,
        result.pairs,
        result.p_value
    )
}

/// Assertions evaluated by at least one error-free candidate and passed by
/// none of them, in suite order.
#[must_use]
pub fn always_failing<'a>(
    suite: &'a AssertionSuite,
    reports: &[CandidateReport],
) -> Vec<&'a Assertion> {
    let outcomes: Vec<HashMap<&str, bool>> = reports
        .iter()
        .filter(|r| !r.has_errors())
        .map(CandidateReport::passed_by_id)
        .collect();

    suite
        .assertions()
        .iter()
        .filter(|assertion| {
            let id = assertion.id.as_str();
            let mut seen = false;
            for passed in &outcomes {
                match passed.get(id) {
                    Some(true) => return false,
                    Some(false) => seen = true,
                    None => {}
                }
            }
            seen
        })
        .collect()
}

/// Write [`always_failing`] assertions as JSONL.
///
/// Nothing is written when no assertion qualifies. Returns the count.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_always_failing(
    path: &Path,
    suite: &AssertionSuite,
    reports: &[CandidateReport],
) -> Result<usize> {
    let failing: Vec<Assertion> = always_failing(suite, reports)
        .into_iter()
        .cloned()
        .collect();
    if failing.is_empty() {
        return Ok(0);
    }
    save_assertions(path, &failing)?;
    info!("Wrote {} always-failing assertions to {}", failing.len(), path.display());
    Ok(failing.len())
}

/// Escape text for HTML element content and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Render candidate markdown. Raw HTML in the input is shown as text.
#[must_use]
pub fn markdown_to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_TABLES).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

const STYLE: &str = r"
body { font-family: sans-serif; max-width: 1100px; margin: 0 auto; padding: 20px; }
.assertion { border: 1px solid #ddd; border-radius: 4px; margin: 12px 0; padding: 12px; }
.pass { border-left: 6px solid #2e7d32; }
.fail { border-left: 6px solid #c62828; }
.status { font-size: 0.8em; padding: 2px 6px; border-radius: 3px; color: #fff; }
.pass-status { background: #2e7d32; }
.fail-status { background: #c62828; }
.explanation { background: #fff3e0; padding: 8px; margin-top: 8px; }
.markdown { background: #fafafa; border: 1px solid #eee; padding: 8px; overflow-x: auto; }
";

/// Static HTML report: one section per candidate, pdf and page.
#[must_use]
pub fn render_html(suite: &AssertionSuite, reports: &[CandidateReport]) -> String {
    let by_id: HashMap<&str, &Assertion> = suite
        .assertions()
        .iter()
        .map(|a| (a.id.as_str(), a))
        .collect();

    let mut out = String::new();
    let _ = writeln!(
        out,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>OCR Benchmark Report</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <h1>OCR Benchmark Report</h1>"
    );

    for report in reports {
        let _ = writeln!(out, "<h2>Candidate: {}</h2>", escape_html(&report.name));
        for error in &report.errors {
            let _ = writeln!(out, "<p class=\"explanation\">{}</p>", escape_html(error));
        }

        for (pdf, pages) in &report.results {
            for (page, verdicts) in pages {
                let _ = writeln!(
                    out,
                    "<section>\n<h3>{} page {}</h3>",
                    escape_html(pdf),
                    page
                );
                for verdict in verdicts {
                    let Some(assertion) = by_id.get(verdict.assertion_id.as_str()) else {
                        continue;
                    };
                    let (class, label) = if verdict.passed {
                        ("pass", "PASSED")
                    } else {
                        ("fail", "FAILED")
                    };
                    let _ = writeln!(
                        out,
                        "<div class=\"assertion {class}\">\n<h4>{} <span class=\"status {class}-status\">{label}</span></h4>\n\
                         <p><strong>Type:</strong> {} | <strong>Pass ratio:</strong> {:.3}</p>",
                        escape_html(&assertion.id),
                        assertion.kind_name(),
                        verdict.pass_ratio
                    );
                    out.push_str(&assertion_details(&assertion.kind));
                    if !verdict.passed {
                        let _ = writeln!(
                            out,
                            "<div class=\"explanation\"><strong>Explanation:</strong> {}</div>",
                            escape_html(&verdict.explanation)
                        );
                    }
                    out.push_str("</div>\n");
                }

                if let Some(path) = report.first_repeats.get(&(pdf.clone(), *page)) {
                    match std::fs::read_to_string(path) {
                        Ok(markdown) => {
                            let _ = writeln!(
                                out,
                                "<h4>Output (first repeat)</h4>\n<div class=\"markdown\">{}</div>",
                                markdown_to_html(&markdown)
                            );
                        }
                        Err(e) => {
                            warn!("Could not read {} for the report: {}", path.display(), e);
                            let _ = writeln!(
                                out,
                                "<p>Error loading output: {}</p>",
                                escape_html(&e.to_string())
                            );
                        }
                    }
                }
                out.push_str("</section>\n<hr>\n");
            }
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn assertion_details(kind: &AssertionKind) -> String {
    let quoted = |label: &str, value: &str| {
        format!("<p><strong>{label}:</strong> \"{}\"</p>\n", escape_html(value))
    };
    match kind {
        AssertionKind::Present(rule) => quoted("Text to find", &rule.text),
        AssertionKind::Absent(rule) => quoted("Text should not appear", &rule.text),
        AssertionKind::Order(rule) => format!(
            "<p><strong>Text order:</strong> \"{}\" should appear before \"{}\"</p>\n",
            escape_html(&rule.before),
            escape_html(&rule.after)
        ),
        AssertionKind::Table(rule) => {
            let mut details = quoted("Table cell", &rule.cell);
            for (relation, value) in rule.relations() {
                details.push_str(&quoted(relation.name(), value));
            }
            details
        }
        AssertionKind::Math(rule) => quoted("Math", &rule.math),
        AssertionKind::Baseline => String::new(),
    }
}

/// Write [`render_html`] to `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_html_report(
    path: &Path,
    suite: &AssertionSuite,
    reports: &[CandidateReport],
) -> Result<()> {
    std::fs::write(path, render_html(suite, reports)).map_err(|e| BenchError::io(path, e))?;
    info!("HTML report written to {}", path.display());
    Ok(())
}

/// Candidates named in `pairs` that were not evaluated.
#[must_use]
pub fn unknown_candidates<'p>(
    pairs: &'p [(String, String)],
    reports: &[CandidateReport],
) -> Vec<&'p str> {
    let known: HashSet<&str> = reports.iter().map(|r| r.name.as_str()).collect();
    let mut unknown: Vec<&str> = pairs
        .iter()
        .flat_map(|(a, b)| [a.as_str(), b.as_str()])
        .filter(|name| !known.contains(name))
        .collect();
    unknown.sort_unstable();
    unknown.dedup();
    unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Verdict;
    use crate::stats::permutation_test;
    use tempfile::TempDir;

    fn suite() -> AssertionSuite {
        let mut suite = AssertionSuite::default();
        for (id, line) in [
            ("p1", r#"{"id":"p1","pdf":"doc.pdf","page":1,"type":"present","text":"<b>Hello</b>"}"#),
            ("o1", r#"{"id":"o1","pdf":"doc.pdf","page":1,"type":"order","before":"A","after":"B"}"#),
        ] {
            let assertion: Assertion = serde_json::from_str(line).unwrap();
            assert_eq!(assertion.id, id);
            suite.push(assertion, "set.jsonl").unwrap();
        }
        suite
    }

    fn report(name: &str, outcomes: &[(&str, bool)]) -> CandidateReport {
        let mut report = CandidateReport {
            name: name.to_string(),
            ..CandidateReport::default()
        };
        for (id, passed) in outcomes {
            report
                .results
                .entry("doc.pdf".to_string())
                .or_default()
                .entry(1)
                .or_default()
                .push(Verdict {
                    assertion_id: (*id).to_string(),
                    passed: *passed,
                    explanation: "Text <x> not found".to_string(),
                    pass_ratio: if *passed { 1.0 } else { 0.0 },
                });
            report
                .kind_breakdown
                .entry(if id.starts_with('p') { "present" } else { "order" })
                .or_default()
                .push(if *passed { 1.0 } else { 0.0 });
        }
        report
    }

    #[test]
    fn test_always_failing_skips_errored_candidates() {
        let suite = suite();
        let a = report("a", &[("p1", false), ("o1", true)]);
        let b = report("b", &[("p1", false), ("o1", false)]);
        let mut broken = report("c", &[("p1", true)]);
        broken.errors.push("missing".to_string());

        let failing = always_failing(&suite, &[a, b, broken]);
        let ids: Vec<&str> = failing.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["p1"]);
    }

    #[test]
    fn test_write_always_failing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("failed.jsonl");
        let suite = suite();

        let none = report("a", &[("p1", true), ("o1", true)]);
        assert_eq!(write_always_failing(&path, &suite, &[none]).unwrap(), 0);
        assert!(!path.exists());

        let some = report("a", &[("p1", false), ("o1", true)]);
        assert_eq!(write_always_failing(&path, &suite, &[some]).unwrap(), 1);
        let loaded = crate::assertion::load_assertions(&path).unwrap();
        assert_eq!(loaded[0].id, "p1");
    }

    #[test]
    fn test_summary_format() {
        let suite = suite();
        let settings = EvalSettings {
            bootstrap_samples: 50,
            seed: Some(1),
            ..EvalSettings::default()
        };
        let ok = report("tool_a", &[("p1", true), ("o1", false)]);
        let mut failed = report("tool_b", &[]);
        failed.errors.push("missing".to_string());
        let scores = vec![
            CandidateScore::compute(&suite, &ok, &settings),
            CandidateScore::compute(&suite, &failed, &settings),
        ];

        let summary = format_summary(&scores, 0.95);
        assert!(summary.contains("Final Summary with 95% Confidence Intervals:"));
        assert!(summary.contains("tool_a               : Average Score: 50.0% ±"));
        assert!(summary.contains("tool_b               : Average Score: FAILED (errors)"));
        assert!(summary.contains("    order   : 0.0% average pass rate over 1 tests"));
        assert!(summary.contains("set.jsonl                     : 50.0% (1/2 tests)"));
        assert!(scores[0].score_line(0.95).starts_with("Average Score: 50.0% (95% CI: ["));
    }

    #[test]
    fn test_comparison_line() {
        let result = permutation_test(&[vec![(1.0, 0.0), (1.0, 1.0)]], 10, Some(2));
        let line = format_comparison("a", "b", &result);
        assert!(line.starts_with("a vs b: difference +50.0% over 2 paired assertions, p = "));
    }

    #[test]
    fn test_html_escapes_and_renders_markdown() {
        let dir = TempDir::new().unwrap();
        let repeat = dir.path().join("doc_pg1_repeat1.md");
        std::fs::write(&repeat, "# Title\n\n<script>alert(1)</script>\n").unwrap();

        let suite = suite();
        let mut rep = report("tool<1>", &[("p1", false), ("o1", true)]);
        rep.first_repeats.insert(("doc.pdf".to_string(), 1), repeat);

        let html = render_html(&suite, &[rep]);
        assert!(html.contains("<h2>Candidate: tool&lt;1&gt;</h2>"));
        assert!(html.contains("\"&lt;b&gt;Hello&lt;/b&gt;\""));
        assert!(html.contains("Text &lt;x&gt; not found"));
        assert!(html.contains("<h1>Title</h1>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("FAILED"));
        assert!(html.contains("PASSED"));
    }

    #[test]
    fn test_unknown_candidates() {
        let reports = vec![report("a", &[]), report("b", &[])];
        let pairs = vec![
            ("a".to_string(), "b".to_string()),
            ("a".to_string(), "z".to_string()),
        ];
        assert_eq!(unknown_candidates(&pairs, &reports), vec!["z"]);
    }
}
