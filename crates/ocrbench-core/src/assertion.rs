//! Assertion model and JSONL persistence.
//!
//! An [`Assertion`] is one testable claim about one page of one source
//! document. The `type` field on the wire selects an [`AssertionKind`], and
//! the kind alone decides which matcher runs. Assertion-set files hold one
//! JSON object per line:
//!
//! ```text
//! {"id": "doc1_pg1_present_01", "pdf": "doc1.pdf", "page": 1, "type": "present", "text": "Hello World", "max_diffs": 0}
//! {"id": "doc1_pg1_order_01", "pdf": "doc1.pdf", "page": 1, "type": "order", "before": "Section A", "after": "Section B"}
//! ```

use crate::error::{BenchError, Result};
use crate::matching::normalize_latex;
use crate::normalize::normalize_text;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, warn};

/// Curation state attached by reviewers. Read-only for evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurationStatus {
    Verified,
    Rejected,
}

/// One testable claim about one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    /// Globally unique identifier.
    pub id: String,
    /// Source document, relative to the `pdfs/` folder.
    pub pdf: String,
    /// 1-based page number.
    pub page: u32,
    /// Reviewer verdict on the assertion itself.
    #[serde(default, rename = "checked")]
    pub status: Option<CurationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub kind: AssertionKind,
}

/// Kind-specific payload. The variant is fixed when the assertion is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssertionKind {
    #[serde(rename = "present", alias = "presence")]
    Present(TextRule),
    #[serde(rename = "absent", alias = "absence")]
    Absent(TextRule),
    #[serde(rename = "order")]
    Order(OrderRule),
    #[serde(rename = "table", alias = "table_relation")]
    Table(TableRule),
    #[serde(rename = "math", alias = "math_equivalence")]
    Math(MathRule),
    #[serde(rename = "baseline")]
    Baseline,
}

const fn default_case_sensitive() -> bool {
    true
}

/// Presence/absence payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRule {
    pub text: String,
    /// Edit-distance budget.
    #[serde(default)]
    pub max_diffs: u32,
    /// Similarity ratio in `(0, 1]`; overrides `max_diffs` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
    /// Only consider the first N characters of the page.
    #[serde(default)]
    pub first_n: Option<usize>,
    /// Only consider the last N characters of the page.
    #[serde(default)]
    pub last_n: Option<usize>,
}

/// Reading-order payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRule {
    pub before: String,
    pub after: String,
    #[serde(default)]
    pub max_diffs: u32,
}

/// Table-relation payload. Unset neighbors are not checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRule {
    pub cell: String,
    #[serde(default)]
    pub max_diffs: u32,
    #[serde(default)]
    pub up: Option<String>,
    #[serde(default)]
    pub down: Option<String>,
    #[serde(default)]
    pub left: Option<String>,
    #[serde(default)]
    pub right: Option<String>,
    #[serde(default)]
    pub top_heading: Option<String>,
    #[serde(default)]
    pub left_heading: Option<String>,
}

/// Math payload: a LaTeX expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathRule {
    pub math: String,
}

impl AssertionKind {
    /// Wire name of the kind, also used to group scores.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Present(_) => "present",
            Self::Absent(_) => "absent",
            Self::Order(_) => "order",
            Self::Table(_) => "table",
            Self::Math(_) => "math",
            Self::Baseline => "baseline",
        }
    }
}

impl TableRule {
    /// Expected neighbors that are actually specified.
    pub fn relations(&self) -> impl Iterator<Item = (Relation, &str)> {
        [
            (Relation::Up, self.up.as_deref()),
            (Relation::Down, self.down.as_deref()),
            (Relation::Left, self.left.as_deref()),
            (Relation::Right, self.right.as_deref()),
            (Relation::TopHeading, self.top_heading.as_deref()),
            (Relation::LeftHeading, self.left_heading.as_deref()),
        ]
        .into_iter()
        .filter_map(|(relation, value)| value.map(|v| (relation, v)))
    }
}

/// Structural neighbor of a table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Up,
    Down,
    Left,
    Right,
    TopHeading,
    LeftHeading,
}

impl Relation {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::TopHeading => "top_heading",
            Self::LeftHeading => "left_heading",
        }
    }
}

impl Assertion {
    /// Build the default baseline assertion for page 1 of `pdf`.
    #[must_use]
    pub fn baseline(pdf: &str) -> Self {
        Self {
            id: format!("{pdf}_baseline"),
            pdf: pdf.to_string(),
            page: 1,
            status: None,
            url: None,
            kind: AssertionKind::Baseline,
        }
    }

    /// Kind name, see [`AssertionKind::name`].
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Check the structural constraints the matchers rely on.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::InvalidAssertion`] for empty ids, page 0, blank
    /// match text or an out-of-range threshold.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| BenchError::InvalidAssertion {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id is empty"));
        }
        if self.pdf.trim().is_empty() {
            return Err(invalid("pdf is empty"));
        }
        if self.page == 0 {
            return Err(invalid("pages are 1-based"));
        }
        self.kind.check().map_err(|reason| invalid(&reason))
    }
}

impl AssertionKind {
    /// Field-level validation shared by the loader and the matchers.
    pub(crate) fn check(&self) -> std::result::Result<(), String> {
        match self {
            Self::Present(rule) | Self::Absent(rule) => {
                non_blank("text", &rule.text)?;
                if let Some(threshold) = rule.threshold {
                    if !(threshold > 0.0 && threshold <= 1.0) {
                        return Err(format!("threshold {threshold} outside (0, 1]"));
                    }
                }
                Ok(())
            }
            Self::Order(rule) => {
                non_blank("before", &rule.before)?;
                non_blank("after", &rule.after)
            }
            Self::Table(rule) => non_blank("cell", &rule.cell),
            Self::Math(rule) => {
                if normalize_latex(&rule.math).is_empty() {
                    Err("math must not be empty after normalization".to_string())
                } else {
                    Ok(())
                }
            }
            Self::Baseline => Ok(()),
        }
    }
}

/// Markup-only text such as `**` or `<br>` normalizes to nothing and would
/// match every page.
fn non_blank(field: &str, value: &str) -> std::result::Result<(), String> {
    if normalize_text(value).is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}

/// Parse an assertion-set file.
///
/// Lines that are not valid assertion JSON are skipped with a warning.
/// Lines that parse but fail [`Assertion::validate`], and duplicate ids, are
/// fatal.
///
/// # Errors
///
/// Returns an error if the file cannot be read, an assertion is invalid, or
/// an id repeats within the file.
pub fn load_assertions(path: &Path) -> Result<Vec<Assertion>> {
    let content = std::fs::read_to_string(path).map_err(|e| BenchError::io(path, e))?;
    let file_name = path.display().to_string();

    let mut assertions = Vec::new();
    let mut seen = HashSet::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let assertion: Assertion = match serde_json::from_str(line) {
            Ok(assertion) => assertion,
            Err(e) => {
                warn!("Skipping {}:{}: {}", file_name, idx + 1, e);
                continue;
            }
        };
        assertion.validate()?;
        if !seen.insert(assertion.id.clone()) {
            return Err(BenchError::DuplicateId {
                id: assertion.id,
                first: file_name.clone(),
                second: file_name,
            });
        }
        assertions.push(assertion);
    }

    debug!("Loaded {} assertions from {}", assertions.len(), file_name);
    Ok(assertions)
}

/// Write assertions as JSONL, one object per line.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_assertions(path: &Path, assertions: &[Assertion]) -> Result<()> {
    let mut out = String::new();
    for assertion in assertions {
        let line = serde_json::to_string(assertion)?;
        let _ = writeln!(out, "{line}");
    }
    std::fs::write(path, out).map_err(|e| BenchError::io(path, e))
}
