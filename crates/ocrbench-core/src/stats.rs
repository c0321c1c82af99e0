//! Scores, confidence intervals and significance tests.
//!
//! A candidate's score is the mean of its per-file scores, where each
//! assertion-set file (provenance group) scores the fraction of its
//! assertions that passed. Small files therefore weigh as much as large ones.
//!
//! Resampling runs on rayon. Resample `i` draws from its own RNG seeded from
//! `(seed, i)`, so results do not depend on the number of threads.

// Scores are f64 from counts
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use crate::evaluator::CandidateReport;
use crate::suite::AssertionSuite;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Group name for assertions with no recorded provenance.
pub const UNKNOWN_GROUP: &str = "unknown";

/// Pass counts of one provenance group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupScore {
    pub passed: usize,
    pub total: usize,
}

impl GroupScore {
    #[must_use]
    pub fn score(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }
}

/// Two-sided percentile interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    #[must_use]
    pub fn half_width(&self) -> f64 {
        (self.upper - self.lower) / 2.0
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Outcome of a paired permutation test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermutationResult {
    /// Score of the first candidate minus score of the second.
    pub observed: f64,
    pub p_value: f64,
    /// Assertions evaluated by both candidates.
    pub pairs: usize,
}

/// Pass counts per provenance group, over every assertion in the suite.
///
/// A candidate with errors passes nothing.
#[must_use]
pub fn per_file_scores(
    suite: &AssertionSuite,
    report: &CandidateReport,
) -> BTreeMap<String, GroupScore> {
    let passed = report.passed_by_id();
    let mut groups: BTreeMap<String, GroupScore> = BTreeMap::new();
    for assertion in suite.assertions() {
        let group = suite.source_of(&assertion.id).unwrap_or(UNKNOWN_GROUP);
        let entry = groups.entry(group.to_string()).or_default();
        entry.total += 1;
        if !report.has_errors() && passed.get(assertion.id.as_str()).copied().unwrap_or(false) {
            entry.passed += 1;
        }
    }
    groups
}

/// Mean of per-file scores.
#[must_use]
pub fn overall_score(groups: &BTreeMap<String, GroupScore>) -> f64 {
    let scores: Vec<f64> = groups
        .values()
        .filter(|g| g.total > 0)
        .map(GroupScore::score)
        .collect();
    mean(&scores)
}

/// Binary outcomes of the evaluated assertions, split by provenance group.
///
/// Groups are in name order; empty groups are dropped. A candidate with
/// errors has no outcomes.
#[must_use]
pub fn grouped_outcomes(suite: &AssertionSuite, report: &CandidateReport) -> Vec<Vec<f64>> {
    if report.has_errors() {
        return Vec::new();
    }
    let passed = report.passed_by_id();
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for assertion in suite.assertions() {
        if let Some(&ok) = passed.get(assertion.id.as_str()) {
            let group = suite.source_of(&assertion.id).unwrap_or(UNKNOWN_GROUP);
            groups
                .entry(group)
                .or_default()
                .push(if ok { 1.0 } else { 0.0 });
        }
    }
    groups.into_values().filter(|g| !g.is_empty()).collect()
}

/// Paired binary outcomes `(a, b)` for assertions both candidates evaluated,
/// split by the provenance group.
#[must_use]
pub fn paired_outcomes(
    suite: &AssertionSuite,
    a: &CandidateReport,
    b: &CandidateReport,
) -> Vec<Vec<(f64, f64)>> {
    if a.has_errors() || b.has_errors() {
        return Vec::new();
    }
    let passed_a = a.passed_by_id();
    let passed_b = b.passed_by_id();
    let mut groups: BTreeMap<&str, Vec<(f64, f64)>> = BTreeMap::new();
    for assertion in suite.assertions() {
        let id = assertion.id.as_str();
        if let (Some(&x), Some(&y)) = (passed_a.get(id), passed_b.get(id)) {
            let group = suite.source_of(id).unwrap_or(UNKNOWN_GROUP);
            groups
                .entry(group)
                .or_default()
                .push((f64::from(u8::from(x)), f64::from(u8::from(y))));
        }
    }
    groups.into_values().filter(|g| !g.is_empty()).collect()
}

/// Stratified bootstrap interval of the mean-of-group-means statistic.
///
/// Every resample draws `len` outcomes with replacement inside each group.
/// Returns `[0, 0]` when there is nothing to resample.
#[must_use]
pub fn bootstrap_ci(
    groups: &[Vec<f64>],
    samples: usize,
    level: f64,
    seed: Option<u64>,
) -> ConfidenceInterval {
    let groups: Vec<&Vec<f64>> = groups.iter().filter(|g| !g.is_empty()).collect();
    if groups.is_empty() || samples == 0 {
        return ConfidenceInterval {
            lower: 0.0,
            upper: 0.0,
        };
    }

    let base = seed.unwrap_or_else(rand::random);
    let mut stats: Vec<f64> = (0..samples)
        .into_par_iter()
        .map(|i| {
            let mut rng = resample_rng(base, i);
            let means: Vec<f64> = groups
                .iter()
                .map(|group| {
                    let n = group.len();
                    let sum: f64 = (0..n).map(|_| group[rng.random_range(0..n)]).sum();
                    sum / n as f64
                })
                .collect();
            mean(&means)
        })
        .collect();
    stats.sort_by(f64::total_cmp);

    let alpha = (1.0 - level) / 2.0;
    ConfidenceInterval {
        lower: percentile(&stats, alpha),
        upper: percentile(&stats, 1.0 - alpha),
    }
}

/// Two-sided paired permutation test on the mean-of-group-means score.
///
/// Each permutation swaps the two outcomes of every pair with probability
/// 1/2. The p-value is `(extreme + 1) / (permutations + 1)`.
#[must_use]
pub fn permutation_test(
    groups: &[Vec<(f64, f64)>],
    permutations: usize,
    seed: Option<u64>,
) -> PermutationResult {
    let pairs = groups.iter().map(Vec::len).sum();
    let observed = paired_difference(groups.iter().map(|g| g.iter().copied()));
    if pairs == 0 || permutations == 0 {
        return PermutationResult {
            observed,
            p_value: 1.0,
            pairs,
        };
    }

    let threshold = observed.abs() - 1e-12;
    let base = seed.unwrap_or_else(rand::random);
    let extreme = (0..permutations)
        .into_par_iter()
        .filter(|&i| {
            let mut rng = resample_rng(base, i);
            let diff = paired_difference(groups.iter().map(|g| {
                g.iter()
                    .map(|&(a, b)| if rng.random_bool(0.5) { (b, a) } else { (a, b) })
                    .collect::<Vec<_>>()
                    .into_iter()
            }));
            diff.abs() >= threshold
        })
        .count();

    PermutationResult {
        observed,
        p_value: (extreme + 1) as f64 / (permutations + 1) as f64,
        pairs,
    }
}

/// Mean-of-group-means of the first elements minus that of the second.
fn paired_difference<G, P>(groups: G) -> f64
where
    G: Iterator<Item = P>,
    P: Iterator<Item = (f64, f64)>,
{
    let mut means_a = Vec::new();
    let mut means_b = Vec::new();
    for group in groups {
        let (mut sum_a, mut sum_b, mut n) = (0.0, 0.0, 0usize);
        for (a, b) in group {
            sum_a += a;
            sum_b += b;
            n += 1;
        }
        if n > 0 {
            means_a.push(sum_a / n as f64);
            means_b.push(sum_b / n as f64);
        }
    }
    mean(&means_a) - mean(&means_b)
}

fn resample_rng(base: u64, index: usize) -> StdRng {
    let mix = (index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    StdRng::seed_from_u64(base ^ mix)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Linearly interpolated percentile of sorted data, `q` in `[0, 1]`.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}
