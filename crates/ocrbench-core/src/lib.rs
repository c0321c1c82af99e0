//! Assertion matching and statistical scoring for document OCR benchmarks
//!
//! Candidate OCR pipelines convert each page of a set of source PDFs several
//! times ("repeats"). This crate checks every repeat against per-page
//! assertions (text presence, absence, reading order, table structure,
//! math, baseline output), folds repeats into a majority verdict, and
//! aggregates verdicts into per-file scores with bootstrap confidence
//! intervals and paired permutation tests.
//!
//! # Example
//!
//! ```no_run
//! use indicatif::ProgressBar;
//! use ocrbench_core::{AssertionSuite, CandidateScore, EvalSettings, Evaluator};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let root = Path::new("bench_data");
//!     let suite = AssertionSuite::load(root)?;
//!     let settings = EvalSettings::from_env();
//!
//!     let evaluator = Evaluator::new(&suite, &settings)?;
//!     let progress = ProgressBar::hidden();
//!     let report = evaluator.evaluate_candidate("marker", &root.join("marker"), &progress)?;
//!
//!     let scored = CandidateScore::compute(&suite, &report, &settings);
//!     println!("{}", scored.score_line(settings.confidence_level));
//!     Ok(())
//! }
//! ```

pub mod align;
pub mod assertion;
pub mod config;
pub mod discovery;
pub mod error;
pub mod evaluator;
pub mod matching;
pub mod normalize;
pub mod report;
pub mod stats;
pub mod suite;

pub use assertion::{
    load_assertions, save_assertions, Assertion, AssertionKind, CurationStatus, MathRule,
    OrderRule, Relation, TableRule, TextRule,
};
pub use config::{load_config, ConfigFile, EvalSettings};
pub use discovery::{discover_candidates, RepeatIndex, PDF_DIR};
pub use error::{BenchError, MatchError, Result};
pub use evaluator::{CandidateReport, Evaluator, Verdict};
pub use matching::{evaluate, Outcome};
pub use report::CandidateScore;
pub use stats::{ConfidenceInterval, GroupScore, PermutationResult};
pub use suite::{discover_pdfs, AssertionSuite};
