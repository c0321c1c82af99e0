//! Approximate substring alignment.
//!
//! [`best_match`] finds the substring of a text with the smallest Levenshtein
//! distance to a pattern (semi-global alignment: the pattern must be consumed
//! entirely, the text may start and end anywhere). This is the hot path of
//! every text matcher; `benches/align_bench.rs` measures it in isolation.
//!
//! ## Algorithm
//!
//! 1. A single column of the `(M+1) x (N+1)` DP table is swept across the text
//!    to find the minimal distance and the leftmost column that reaches it.
//! 2. The full table is rebuilt only over the window that can contain an
//!    optimal alignment ending there (at most `M + distance` characters), and
//!    backtracked to recover the start of the span.
//!
//! All offsets are in `char`s, not bytes.

// Clippy pedantic allows:
// - Similarity ratios are computed as f64 from usize
// - DP indices use single-letter names
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::many_single_char_names)]

/// Best alignment of a pattern inside a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alignment {
    /// Edit distance between the pattern and `text[start..end]`.
    pub distance: usize,
    /// First char of the matched span.
    pub start: usize,
    /// One past the last char of the matched span.
    pub end: usize,
}

impl Alignment {
    /// `1 - distance / pattern_len`, clamped at zero.
    #[must_use]
    pub fn similarity(&self, pattern_len: usize) -> f64 {
        similarity(self.distance, pattern_len)
    }
}

/// Convert a distance into a similarity ratio relative to the pattern length.
#[must_use]
pub fn similarity(distance: usize, pattern_len: usize) -> f64 {
    if pattern_len == 0 {
        return if distance == 0 { 1.0 } else { 0.0 };
    }
    (1.0 - distance as f64 / pattern_len as f64).max(0.0)
}

/// Find the substring of `text` closest to `pattern`.
///
/// Returns `None` for an empty pattern. Ties on distance resolve to the
/// leftmost end position; the start is then recovered with a fixed
/// backtracking preference (match/substitution, pattern deletion, text
/// insertion), so identical inputs always yield identical spans.
#[must_use]
pub fn best_match(pattern: &[char], text: &[char]) -> Option<Alignment> {
    let m = pattern.len();
    if m == 0 {
        return None;
    }

    let (distance, end) = best_end(pattern, text);
    let start = recover_start(pattern, text, distance, end);
    Some(Alignment {
        distance,
        start,
        end,
    })
}

/// [`best_match`] over string slices.
#[must_use]
pub fn best_match_str(pattern: &str, text: &str) -> Option<Alignment> {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    best_match(&pattern, &text)
}

/// Sweep one DP column across the text, returning `(distance, end)`.
fn best_end(pattern: &[char], text: &[char]) -> (usize, usize) {
    let m = pattern.len();
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut cur = vec![0usize; m + 1];

    // Column 0: the empty span before the text.
    let mut best = (prev[m], 0);

    for (j, &tc) in text.iter().enumerate() {
        cur[0] = 0;
        for i in 1..=m {
            let cost = usize::from(pattern[i - 1] != tc);
            cur[i] = (prev[i - 1] + cost).min(prev[i] + 1).min(cur[i - 1] + 1);
        }
        if cur[m] < best.0 {
            best = (cur[m], j + 1);
            if best.0 == 0 {
                break;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    best
}

/// Rebuild the table over the window ending at `end` and backtrack.
fn recover_start(pattern: &[char], text: &[char], distance: usize, end: usize) -> usize {
    let m = pattern.len();
    let window_start = end.saturating_sub(m + distance);
    let window = &text[window_start..end];
    let w = window.len();

    let idx = |i: usize, j: usize| i * (w + 1) + j;
    let mut table = vec![0usize; (m + 1) * (w + 1)];
    for i in 0..=m {
        table[idx(i, 0)] = i;
    }
    for i in 1..=m {
        for j in 1..=w {
            let cost = usize::from(pattern[i - 1] != window[j - 1]);
            table[idx(i, j)] = (table[idx(i - 1, j - 1)] + cost)
                .min(table[idx(i - 1, j)] + 1)
                .min(table[idx(i, j - 1)] + 1);
        }
    }
    debug_assert_eq!(table[idx(m, w)], distance);

    let (mut i, mut j) = (m, w);
    while i > 0 {
        let here = table[idx(i, j)];
        if j > 0 {
            let cost = usize::from(pattern[i - 1] != window[j - 1]);
            if here == table[idx(i - 1, j - 1)] + cost {
                i -= 1;
                j -= 1;
                continue;
            }
        }
        if here == table[idx(i - 1, j)] + 1 {
            i -= 1;
        } else {
            j -= 1;
        }
    }

    window_start + j
}

/// Plain Levenshtein distance between two sequences.
#[must_use]
pub fn edit_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    let mut prev: Vec<usize> = (0..=a.len()).collect();
    let mut cur = vec![0usize; a.len() + 1];
    for (j, &bc) in b.iter().enumerate() {
        cur[0] = j + 1;
        for i in 1..=a.len() {
            let cost = usize::from(a[i - 1] != bc);
            cur[i] = (prev[i - 1] + cost).min(prev[i] + 1).min(cur[i - 1] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[a.len()]
}

/// [`edit_distance`] over string slices.
#[must_use]
pub fn edit_distance_str(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    edit_distance(&a, &b)
}
