//! Locating candidate folders and their repeat files.
//!
//! A candidate folder holds one file per independent generation of a page,
//! named `<document-basename>_pg<page>_repeat<n>.md`, where the basename keeps
//! any subfolders the source PDF has under `pdfs/`. Other files, including
//! sidecars such as page renders, are ignored:
//!
//! ```text
//! root/
//!   pdfs/reports/q3.pdf
//!   tool_a/reports/q3_pg1_repeat1.md
//!   tool_a/reports/q3_pg1_repeat2.md
//! ```

use crate::error::{BenchError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the source-document folder; never treated as a candidate.
pub const PDF_DIR: &str = "pdfs";

static REPEAT_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<base>.+)_pg(?P<page>\d+)_repeat(?P<repeat>\d+)\.md$")
        .expect("repeat file pattern is a compile-time constant")
});

/// One generation of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatFile {
    pub path: PathBuf,
    pub repeat: u32,
}

/// Parsed repeat-file name: `(document basename, page, repeat)`.
#[must_use]
pub fn parse_repeat_name(relative: &str) -> Option<(String, u32, u32)> {
    let caps = REPEAT_NAME.captures(relative)?;
    let page = caps["page"].parse().ok()?;
    let repeat = caps["repeat"].parse().ok()?;
    Some((caps["base"].to_string(), page, repeat))
}

/// Strip the extension from a source-document path (`a/b.pdf` -> `a/b`).
#[must_use]
pub fn document_base(pdf: &str) -> String {
    let path = Path::new(pdf);
    let stem = path.with_extension("");
    normalize_separators(&stem)
}

fn normalize_separators(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// All repeat files of one candidate, keyed by `(document basename, page)`.
#[derive(Debug, Default)]
pub struct RepeatIndex {
    by_page: HashMap<(String, u32), Vec<RepeatFile>>,
}

impl RepeatIndex {
    /// Walk `candidate_dir` recursively and index every repeat file.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be read.
    pub fn scan(candidate_dir: &Path) -> Result<Self> {
        let mut by_page: HashMap<(String, u32), Vec<RepeatFile>> = HashMap::new();
        let mut stack = vec![candidate_dir.to_path_buf()];
        let mut skipped = 0usize;

        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).map_err(|e| BenchError::io(&dir, e))? {
                let entry = entry.map_err(|e| BenchError::io(&dir, e))?;
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(candidate_dir) else {
                    continue;
                };
                match parse_repeat_name(&normalize_separators(relative)) {
                    Some((base, page, repeat)) => {
                        by_page
                            .entry((base, page))
                            .or_default()
                            .push(RepeatFile { path, repeat });
                    }
                    None => skipped += 1,
                }
            }
        }

        for repeats in by_page.values_mut() {
            repeats.sort_by(|a, b| a.repeat.cmp(&b.repeat).then_with(|| a.path.cmp(&b.path)));
        }

        debug!(
            "Indexed {} pages under {} ({} unrelated files)",
            by_page.len(),
            candidate_dir.display(),
            skipped
        );
        Ok(Self { by_page })
    }

    /// Repeats for `page` of source document `pdf`, in repeat order.
    #[must_use]
    pub fn repeats(&self, pdf: &str, page: u32) -> &[RepeatFile] {
        self.by_page
            .get(&(document_base(pdf), page))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of distinct pages with at least one repeat.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.by_page.len()
    }
}

/// Candidate folders under `root`, sorted by name.
///
/// With `only` set, just that folder is returned (if it exists).
///
/// # Errors
///
/// Returns an error if `root` cannot be read.
pub fn discover_candidates(root: &Path, only: Option<&str>) -> Result<Vec<(String, PathBuf)>> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| BenchError::io(root, e))? {
        let entry = entry.map_err(|e| BenchError::io(root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if name == PDF_DIR || name.starts_with('.') {
            continue;
        }
        if only.is_some_and(|wanted| wanted != name) {
            continue;
        }
        candidates.push((name, path));
    }
    candidates.sort();
    Ok(candidates)
}
