//! Candidate evaluation.
//!
//! For one candidate folder, every assertion is run against every repeat of
//! its page on a bounded rayon pool. Each repeat counts as one vote; the
//! assertion passes when a strict majority of its repeats pass.
//!
//! Failures local to one repeat (unreadable file, matcher error, matcher
//! panic) are logged and counted as a failed repeat. A page with no repeats
//! at all is a candidate-level error that zeroes the candidate, unless
//! missing pages are tolerated.

// Pass ratios are f64 from repeat counts
#![allow(clippy::cast_precision_loss)]

use crate::assertion::Assertion;
use crate::config::EvalSettings;
use crate::discovery::{document_base, RepeatIndex};
use crate::error::{BenchError, Result};
use crate::matching::evaluate;
use crate::suite::AssertionSuite;
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Explanation stored when every repeat passed.
pub const ALL_REPEATS_PASSED: &str = "All repeats passed";
/// Explanation stored for assertions whose page has no repeats.
pub const MISSING_OUTPUT: &str = "Missing output files";

/// Outcome of one assertion for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub assertion_id: String,
    /// `pass_ratio > 0.5`.
    pub passed: bool,
    /// First failing repeat's explanation, or [`ALL_REPEATS_PASSED`].
    pub explanation: String,
    /// Passing repeats over evaluated repeats.
    pub pass_ratio: f64,
}

/// Everything measured for one candidate.
#[derive(Debug, Clone, Default)]
pub struct CandidateReport {
    pub name: String,
    /// Candidate-level errors. Non-empty means the candidate scores 0.
    pub errors: Vec<String>,
    /// `pdf -> page -> verdicts`, verdicts in suite order.
    pub results: BTreeMap<String, BTreeMap<u32, Vec<Verdict>>>,
    /// Pass ratio of every evaluated assertion, in suite order.
    pub pass_ratios: Vec<f64>,
    /// One line per assertion that did not pass on every repeat.
    pub failures: Vec<String>,
    /// Pass ratios grouped by assertion kind.
    pub kind_breakdown: BTreeMap<&'static str, Vec<f64>>,
    /// First repeat of each evaluated page.
    pub first_repeats: BTreeMap<(String, u32), PathBuf>,
}

impl CandidateReport {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// All verdicts, ordered by pdf then page.
    pub fn verdicts(&self) -> impl Iterator<Item = &Verdict> {
        self.results
            .values()
            .flat_map(BTreeMap::values)
            .flatten()
    }

    /// Binary outcome per assertion id.
    #[must_use]
    pub fn passed_by_id(&self) -> HashMap<&str, bool> {
        self.verdicts()
            .map(|v| (v.assertion_id.as_str(), v.passed))
            .collect()
    }

    /// Mean pass ratio over evaluated assertions, 0 with errors.
    #[must_use]
    pub fn mean_pass_ratio(&self) -> f64 {
        if self.has_errors() || self.pass_ratios.is_empty() {
            return 0.0;
        }
        self.pass_ratios.iter().sum::<f64>() / self.pass_ratios.len() as f64
    }
}

/// Text of one repeat, or the reason it could not be read.
struct RepeatText {
    path: PathBuf,
    content: std::result::Result<String, String>,
}

type PageTexts = HashMap<(String, u32), Vec<RepeatText>>;

struct AssertionOutcome<'a> {
    assertion: &'a Assertion,
    verdict: Verdict,
    failure: Option<String>,
}

/// Runs a suite against candidate folders.
pub struct Evaluator<'a> {
    suite: &'a AssertionSuite,
    settings: &'a EvalSettings,
    pool: rayon::ThreadPool,
}

impl<'a> Evaluator<'a> {
    /// Build an evaluator with a pool of [`EvalSettings::worker_threads`].
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Config`] if the thread pool cannot be created.
    pub fn new(suite: &'a AssertionSuite, settings: &'a EvalSettings) -> Result<Self> {
        let threads = settings.worker_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ocrbench-eval-{i}"))
            .build()
            .map_err(|e| BenchError::Config(format!("failed to build thread pool: {e}")))?;
        debug!("Evaluation pool with {} threads", threads);
        Ok(Self {
            suite,
            settings,
            pool,
        })
    }

    /// Evaluate one candidate folder.
    ///
    /// `progress` is advanced once per assertion; pass
    /// [`ProgressBar::hidden`] to disable it.
    ///
    /// # Errors
    ///
    /// Returns an error only if the candidate folder cannot be walked.
    /// Everything else is recorded in the returned report.
    pub fn evaluate_candidate(
        &self,
        name: &str,
        dir: &Path,
        progress: &ProgressBar,
    ) -> Result<CandidateReport> {
        let index = RepeatIndex::scan(dir)?;
        let mut report = CandidateReport {
            name: name.to_string(),
            ..CandidateReport::default()
        };

        let pages = self.suite.pages();
        let mut missing = Vec::new();
        for (pdf, page) in &pages {
            match index.repeats(pdf, *page).first() {
                Some(first) => {
                    report
                        .first_repeats
                        .insert((pdf.clone(), *page), first.path.clone());
                }
                None => missing.push((pdf.clone(), *page)),
            }
        }

        if !missing.is_empty() {
            if self.settings.tolerate_missing {
                warn!(
                    "Candidate '{}' has no repeats for {} page(s); those assertions fail",
                    name,
                    missing.len()
                );
            } else {
                report.errors = missing
                    .iter()
                    .map(|(pdf, page)| {
                        format!(
                            "Candidate '{name}' is missing repeats for {pdf} page {page} \
                             (expected files matching {}_pg{page}_repeat*).",
                            document_base(pdf)
                        )
                    })
                    .collect();
                progress.finish_and_clear();
                return Ok(report);
            }
        }

        let texts = self.load_texts(&index, &pages);
        let outcomes: Vec<AssertionOutcome<'_>> = self.pool.install(|| {
            self.suite
                .assertions()
                .par_iter()
                .map(|assertion| {
                    let outcome = evaluate_assertion(assertion, &texts);
                    progress.inc(1);
                    outcome
                })
                .collect()
        });
        progress.finish_and_clear();

        for outcome in outcomes {
            let AssertionOutcome {
                assertion,
                verdict,
                failure,
            } = outcome;
            report.pass_ratios.push(verdict.pass_ratio);
            report
                .kind_breakdown
                .entry(assertion.kind_name())
                .or_default()
                .push(verdict.pass_ratio);
            if let Some(failure) = failure {
                report.failures.push(failure);
            }
            report
                .results
                .entry(assertion.pdf.clone())
                .or_default()
                .entry(assertion.page)
                .or_default()
                .push(verdict);
        }

        info!(
            "Candidate '{}': {} assertions, {} not passing on every repeat",
            name,
            report.pass_ratios.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Read every repeat of every referenced page once.
    fn load_texts(
        &self,
        index: &RepeatIndex,
        pages: &std::collections::BTreeSet<(String, u32)>,
    ) -> PageTexts {
        let keys: Vec<&(String, u32)> = pages.iter().collect();
        self.pool.install(|| {
            keys.par_iter()
                .map(|key| {
                    let texts = index
                        .repeats(&key.0, key.1)
                        .iter()
                        .map(|repeat| RepeatText {
                            path: repeat.path.clone(),
                            content: std::fs::read_to_string(&repeat.path)
                                .map_err(|e| e.to_string()),
                        })
                        .collect();
                    ((*key).clone(), texts)
                })
                .collect()
        })
    }
}

fn evaluate_assertion<'a>(assertion: &'a Assertion, texts: &PageTexts) -> AssertionOutcome<'a> {
    let base = document_base(&assertion.pdf);
    let repeats = texts
        .get(&(assertion.pdf.clone(), assertion.page))
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    if repeats.is_empty() {
        return AssertionOutcome {
            assertion,
            verdict: Verdict {
                assertion_id: assertion.id.clone(),
                passed: false,
                explanation: MISSING_OUTPUT.to_string(),
                pass_ratio: 0.0,
            },
            failure: Some(format!(
                "Test {} on {} page {} average pass ratio: 0.000 (0/0 repeats passed). Ex: {}",
                assertion.id, base, assertion.page, MISSING_OUTPUT
            )),
        };
    }

    let mut passes = 0usize;
    let mut explanations: Vec<String> = Vec::new();
    for repeat in repeats {
        match &repeat.content {
            Err(e) => {
                warn!("Error reading {}: {}", repeat.path.display(), e);
                explanations.push(format!("Error reading {}: {e}", repeat.path.display()));
            }
            Ok(text) => match catch_unwind(AssertUnwindSafe(|| evaluate(assertion, text))) {
                Ok(Ok(outcome)) if outcome.passed => passes += 1,
                Ok(Ok(outcome)) => explanations.push(outcome.explanation),
                Ok(Err(e)) => {
                    warn!(
                        "Error running {} on {}: {}",
                        assertion.id,
                        repeat.path.display(),
                        e
                    );
                    explanations.push(e.to_string());
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(
                        "Matcher panicked for {} on {}: {}",
                        assertion.id,
                        repeat.path.display(),
                        message
                    );
                    explanations.push(format!("Matcher panicked: {message}"));
                }
            },
        }
    }

    let total = repeats.len();
    let pass_ratio = passes as f64 / total as f64;
    let first = explanations.first();
    let failure = (pass_ratio < 1.0).then(|| {
        format!(
            "Test {} on {} page {} average pass ratio: {:.3} ({}/{} repeats passed). Ex: {}",
            assertion.id,
            base,
            assertion.page,
            pass_ratio,
            passes,
            total,
            first.map_or("No explanation", String::as_str)
        )
    });

    AssertionOutcome {
        assertion,
        verdict: Verdict {
            assertion_id: assertion.id.clone(),
            passed: pass_ratio > 0.5,
            explanation: first.cloned().unwrap_or_else(|| ALL_REPEATS_PASSED.to_string()),
            pass_ratio,
        },
        failure,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
