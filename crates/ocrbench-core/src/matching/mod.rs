//! Matching engine: decides whether one candidate page satisfies one
//! assertion.
//!
//! Every kind has a pure matcher; [`evaluate`] validates the assertion and
//! dispatches on [`AssertionKind`]. Matchers never touch the filesystem and
//! are deterministic, so the evaluator is free to run them on any thread.
//!
//! | Kind       | Passes when                                                  |
//! |------------|--------------------------------------------------------------|
//! | `present`  | some substring is within the edit budget of `text`           |
//! | `absent`   | no substring is within the edit budget of `text`             |
//! | `order`    | the `before` span ends no later than the `after` span starts |
//! | `table`    | some table cell matches `cell` and all given neighbors match |
//! | `math`     | a recovered LaTeX span aligns with `math` (similarity ≥ 0.9) |
//! | `baseline` | the page is non-empty after trimming                         |

mod math;
mod table;
mod text;

pub use math::{extract_equations, normalize_latex, MATH_SIMILARITY_THRESHOLD};
pub use table::{parse_tables, TableGrid};

use crate::assertion::{Assertion, AssertionKind};
use crate::error::MatchError;

/// Result of one matcher run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub passed: bool,
    /// Human-readable reason; empty on success.
    pub explanation: String,
}

impl Outcome {
    #[must_use]
    pub const fn pass() -> Self {
        Self {
            passed: true,
            explanation: String::new(),
        }
    }

    #[must_use]
    pub const fn fail(explanation: String) -> Self {
        Self {
            passed: false,
            explanation,
        }
    }
}

/// Evaluate `assertion` against the text of one candidate page.
///
/// # Errors
///
/// Returns [`MatchError::Config`] if the assertion has empty match text or an
/// invalid threshold. The loader rejects such assertions up front; this is
/// the second line for assertions built in code.
pub fn evaluate(assertion: &Assertion, candidate: &str) -> Result<Outcome, MatchError> {
    assertion.kind.check().map_err(MatchError::Config)?;

    Ok(match &assertion.kind {
        AssertionKind::Present(rule) => text::presence(rule, candidate),
        AssertionKind::Absent(rule) => text::absence(rule, candidate),
        AssertionKind::Order(rule) => text::order(rule, candidate),
        AssertionKind::Table(rule) => table::table_relation(rule, candidate),
        AssertionKind::Math(rule) => math::math(rule, candidate),
        AssertionKind::Baseline => baseline(candidate),
    })
}

fn baseline(candidate: &str) -> Outcome {
    if candidate.trim().is_empty() {
        Outcome::fail("Page produced no output".to_string())
    } else {
        Outcome::pass()
    }
}
