//! The loaded assertion set and its provenance.
//!
//! Scores are reported per assertion-set file, so every assertion remembers
//! the basename of the file it came from. Synthesized baselines get the
//! provenance [`BASELINE_PROVENANCE`].

use crate::assertion::{load_assertions, Assertion, AssertionKind};
use crate::error::{BenchError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Provenance of synthesized baseline assertions.
pub const BASELINE_PROVENANCE: &str = "baseline";

/// All assertions of one benchmark run.
#[derive(Debug, Clone, Default)]
pub struct AssertionSuite {
    assertions: Vec<Assertion>,
    provenance: HashMap<String, String>,
}

impl AssertionSuite {
    /// Load every `*.jsonl` directly under `root`, or `root` itself when it
    /// is a file.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Config`] when there are no assertion-set files,
    /// [`BenchError::DuplicateId`] when an id appears twice across files, and
    /// any error from [`load_assertions`].
    pub fn load(root: &Path) -> Result<Self> {
        let files = assertion_files(root)?;
        if files.is_empty() {
            return Err(BenchError::Config(format!(
                "No .jsonl files found in {}",
                root.display()
            )));
        }

        let mut suite = Self::default();
        for file in &files {
            let basename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            for assertion in load_assertions(file)? {
                suite.push(assertion, &basename)?;
            }
        }

        info!(
            "Loaded {} assertions from {} file(s)",
            suite.len(),
            files.len()
        );
        Ok(suite)
    }

    /// Add one assertion with its provenance.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::DuplicateId`] if the id is already present.
    pub fn push(&mut self, assertion: Assertion, source: &str) -> Result<()> {
        if let Some(first) = self.provenance.get(&assertion.id) {
            return Err(BenchError::DuplicateId {
                id: assertion.id,
                first: first.clone(),
                second: source.to_string(),
            });
        }
        self.provenance
            .insert(assertion.id.clone(), source.to_string());
        self.assertions.push(assertion);
        Ok(())
    }

    #[must_use]
    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    /// Provenance group of an assertion id.
    #[must_use]
    pub fn source_of(&self, id: &str) -> Option<&str> {
        self.provenance.get(id).map(String::as_str)
    }

    /// Distinct `(pdf, page)` pairs referenced by any assertion.
    #[must_use]
    pub fn pages(&self) -> BTreeSet<(String, u32)> {
        self.assertions
            .iter()
            .map(|a| (a.pdf.clone(), a.page))
            .collect()
    }

    /// Give every document without a baseline assertion one on page 1.
    ///
    /// Returns the number of baselines added.
    pub fn add_default_baselines(&mut self, pdfs: &[String]) -> usize {
        let covered: BTreeSet<&str> = self
            .assertions
            .iter()
            .filter(|a| a.kind == AssertionKind::Baseline)
            .map(|a| a.pdf.as_str())
            .collect();
        let missing: Vec<String> = pdfs
            .iter()
            .filter(|pdf| !covered.contains(pdf.as_str()))
            .cloned()
            .collect();

        let mut added = 0;
        for pdf in missing {
            let baseline = Assertion::baseline(&pdf);
            if self.provenance.contains_key(&baseline.id) {
                continue;
            }
            self.provenance
                .insert(baseline.id.clone(), BASELINE_PROVENANCE.to_string());
            self.assertions.push(baseline);
            added += 1;
        }
        debug!("Added {} default baseline assertions", added);
        added
    }

    /// Pages of the source PDFs that no assertion covers.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Pdf`] if a PDF cannot be opened.
    pub fn uncovered_pages(&self, pdf_dir: &Path, pdfs: &[String]) -> Result<Vec<(String, u32)>> {
        let covered = self.pages();
        let mut uncovered = Vec::new();
        for pdf in pdfs {
            let count = pdf_page_count(&pdf_dir.join(pdf))?;
            for page in 1..=count {
                if !covered.contains(&(pdf.clone(), page)) {
                    uncovered.push((pdf.clone(), page));
                }
            }
        }
        Ok(uncovered)
    }

    /// Drop all baseline assertions.
    pub fn skip_baseline(&mut self) {
        let provenance = &mut self.provenance;
        self.assertions.retain(|a| {
            let keep = a.kind != AssertionKind::Baseline;
            if !keep {
                provenance.remove(&a.id);
            }
            keep
        });
    }

    /// Keep a uniform random subset of `n` assertions, in their original
    /// order. Does nothing when `n` is at least the suite size.
    ///
    /// Returns whether the suite was reduced.
    pub fn sample(&mut self, n: usize, seed: Option<u64>) -> bool {
        if n >= self.assertions.len() {
            return false;
        }
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut picked = rand::seq::index::sample(&mut rng, self.assertions.len(), n).into_vec();
        picked.sort_unstable();

        let mut kept = Vec::with_capacity(n);
        let mut all = std::mem::take(&mut self.assertions).into_iter().enumerate();
        for idx in picked {
            for (i, assertion) in all.by_ref() {
                if i == idx {
                    kept.push(assertion);
                    break;
                }
                self.provenance.remove(&assertion.id);
            }
        }
        for (_, assertion) in all {
            self.provenance.remove(&assertion.id);
        }
        self.assertions = kept;
        true
    }
}

fn assertion_files(root: &Path) -> Result<Vec<std::path::PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| BenchError::io(root, e))? {
        let entry = entry.map_err(|e| BenchError::io(root, e))?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "jsonl") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Source PDFs under `pdf_dir`, as sorted paths relative to it.
///
/// # Errors
///
/// Returns an error if a directory cannot be read.
pub fn discover_pdfs(pdf_dir: &Path) -> Result<Vec<String>> {
    let mut pdfs = Vec::new();
    let mut stack = vec![pdf_dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).map_err(|e| BenchError::io(&dir, e))? {
            let entry = entry.map_err(|e| BenchError::io(&dir, e))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
            {
                if let Ok(relative) = path.strip_prefix(pdf_dir) {
                    pdfs.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
    }
    pdfs.sort();
    Ok(pdfs)
}

/// Number of pages in a PDF.
///
/// # Errors
///
/// Returns [`BenchError::Pdf`] if the file is not a readable PDF.
pub fn pdf_page_count(path: &Path) -> Result<u32> {
    let doc = lopdf::Document::load(path).map_err(|e| BenchError::Pdf {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    u32::try_from(doc.get_pages().len()).map_err(|_| BenchError::Pdf {
        path: path.to_path_buf(),
        reason: "page count overflow".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_set(dir: &Path, name: &str, lines: &[&str]) {
        fs::write(dir.join(name), lines.join("\n")).unwrap();
    }

    fn present(id: &str, pdf: &str, page: u32) -> String {
        format!(r#"{{"id":"{id}","pdf":"{pdf}","page":{page},"type":"present","text":"x"}}"#)
    }

    #[test]
    fn test_load_tracks_provenance() {
        let dir = TempDir::new().unwrap();
        write_set(dir.path(), "a.jsonl", &[&present("a1", "d.pdf", 1)]);
        write_set(dir.path(), "b.jsonl", &[&present("b1", "d.pdf", 2)]);
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let suite = AssertionSuite::load(dir.path()).unwrap();
        assert_eq!(suite.len(), 2);
        assert_eq!(suite.source_of("a1"), Some("a.jsonl"));
        assert_eq!(suite.source_of("b1"), Some("b.jsonl"));
        assert_eq!(suite.pages().len(), 2);
    }

    #[test]
    fn test_load_single_file() {
        let dir = TempDir::new().unwrap();
        write_set(dir.path(), "a.jsonl", &[&present("a1", "d.pdf", 1)]);
        write_set(dir.path(), "b.jsonl", &[&present("b1", "d.pdf", 1)]);
        let suite = AssertionSuite::load(&dir.path().join("b.jsonl")).unwrap();
        assert_eq!(suite.len(), 1);
        assert_eq!(suite.source_of("b1"), Some("b.jsonl"));
    }

    #[test]
    fn test_duplicate_across_files() {
        let dir = TempDir::new().unwrap();
        write_set(dir.path(), "a.jsonl", &[&present("same", "d.pdf", 1)]);
        write_set(dir.path(), "b.jsonl", &[&present("same", "d.pdf", 1)]);
        match AssertionSuite::load(dir.path()) {
            Err(BenchError::DuplicateId { id, first, second }) => {
                assert_eq!(id, "same");
                assert_eq!(first, "a.jsonl");
                assert_eq!(second, "b.jsonl");
            }
            other => panic!("expected duplicate id error, got {other:?}"),
        }
    }

    #[test]
    fn test_no_files_is_config_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            AssertionSuite::load(dir.path()),
            Err(BenchError::Config(_))
        ));
    }

    #[test]
    fn test_default_baselines() {
        let mut suite = AssertionSuite::default();
        suite.push(Assertion::baseline("a.pdf"), "set.jsonl").unwrap();
        let added = suite.add_default_baselines(&["a.pdf".to_string(), "b.pdf".to_string()]);
        assert_eq!(added, 1);
        assert_eq!(suite.source_of("b.pdf_baseline"), Some(BASELINE_PROVENANCE));
        assert_eq!(suite.source_of("a.pdf_baseline"), Some("set.jsonl"));

        suite.skip_baseline();
        assert!(suite.is_empty());
        assert_eq!(suite.source_of("b.pdf_baseline"), None);
    }

    #[test]
    fn test_sample_is_seeded_and_ordered() {
        let mut base = AssertionSuite::default();
        for i in 0..20 {
            base.push(Assertion::baseline(&format!("doc{i:02}.pdf")), "set.jsonl")
                .unwrap();
        }

        let mut first = base.clone();
        let mut second = base.clone();
        assert!(first.sample(5, Some(9)));
        assert!(second.sample(5, Some(9)));
        assert_eq!(first.assertions(), second.assertions());
        assert_eq!(first.len(), 5);

        let ids: Vec<&str> = first.assertions().iter().map(|a| a.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
        assert!(first.source_of(ids[0]).is_some());

        let mut all = base.clone();
        assert!(!all.sample(20, Some(1)));
        assert_eq!(all.len(), 20);
    }

    #[test]
    fn test_discover_pdfs_recursive() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.pdf"), "").unwrap();
        fs::write(dir.path().join("sub/a.PDF"), "").unwrap();
        fs::write(dir.path().join("readme.md"), "").unwrap();
        assert_eq!(discover_pdfs(dir.path()).unwrap(), vec!["b.pdf", "sub/a.PDF"]);
    }

    #[test]
    fn test_unreadable_pdf_is_pdf_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.pdf"), "not a pdf").unwrap();
        let suite = AssertionSuite::default();
        assert!(matches!(
            suite.uncovered_pages(dir.path(), &["broken.pdf".to_string()]),
            Err(BenchError::Pdf { .. })
        ));
    }
}
