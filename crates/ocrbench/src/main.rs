//! ocrbench - score document OCR pipelines
//!
//! Usage:
//!   ocrbench --dir bench_data                      Score every candidate folder
//!   ocrbench --dir bench_data --candidate marker   Score one candidate
//!   ocrbench --dir bench_data --compare a:b        Add a paired permutation test
//!
//! The data folder holds `*.jsonl` assertion sets, a `pdfs/` folder with the
//! source documents, and one folder per candidate with repeat files named
//! `<document>_pg<page>_repeat<n>.md`.

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use ocrbench_core::report::{
    format_comparison, format_summary, unknown_candidates, write_always_failing,
    write_html_report,
};
use ocrbench_core::stats::{paired_outcomes, permutation_test};
use ocrbench_core::{
    discover_candidates, discover_pdfs, load_config, AssertionSuite, CandidateReport,
    CandidateScore, EvalSettings, Evaluator, PDF_DIR,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Config file picked up from the data folder when `--config` is not given.
const DEFAULT_CONFIG_NAME: &str = "ocrbench.toml";

#[derive(Parser, Debug)]
#[command(name = "ocrbench")]
#[command(about = "Score document OCR pipeline outputs against per-page assertions")]
#[command(version)]
struct Cli {
    /// Data folder (assertion sets, pdfs/, candidate folders), or a single .jsonl file inside it
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Only evaluate this candidate folder
    #[arg(long)]
    candidate: Option<String>,

    /// Run even if some pages have no assertions or no candidate output
    #[arg(long)]
    force: bool,

    /// Drop baseline assertions (explicit and synthesized)
    #[arg(long)]
    skip_baseline: bool,

    /// Bootstrap resamples for confidence intervals [default: 1000]
    #[arg(long)]
    bootstrap_samples: Option<usize>,

    /// Confidence level for intervals [default: 0.95]
    #[arg(long)]
    confidence_level: Option<f64>,

    /// Evaluate a random sample of N assertions
    #[arg(long, value_name = "N")]
    sample: Option<usize>,

    /// Seed for sampling and resampling
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum evaluation threads [default: 64]
    #[arg(long)]
    workers: Option<usize>,

    /// Write an HTML report of every verdict
    #[arg(long, value_name = "HTML")]
    test_report: Option<PathBuf>,

    /// Write assertions that failed for every candidate as JSONL
    #[arg(long, value_name = "JSONL")]
    output_failed: Option<PathBuf>,

    /// Compare two candidates with a paired permutation test. Can be repeated.
    #[arg(long, value_name = "A:B", value_parser = parse_pair)]
    compare: Vec<(String, String)>,

    /// Permutations per comparison [default: 10000]
    #[arg(long)]
    permutations: Option<usize>,

    /// TOML config file [default: <dir>/ocrbench.toml]
    #[arg(long, value_name = "TOML")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and results
    #[arg(short, long)]
    quiet: bool,
}

fn parse_pair(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once(':') {
        Some((a, b)) if !a.is_empty() && !b.is_empty() => Ok((a.to_string(), b.to_string())),
        _ => Err(format!("expected CANDIDATE_A:CANDIDATE_B, got '{value}'")),
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "ocrbench=debug,ocrbench_core=debug"
    } else if quiet {
        "ocrbench=warn,ocrbench_core=warn"
    } else {
        "ocrbench=info,ocrbench_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Defaults, then environment, then the config file, then flags.
fn resolve_settings(cli: &Cli, root: &Path) -> Result<EvalSettings> {
    let mut settings = EvalSettings::from_env();

    let config_path = match &cli.config {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            path.clone()
        }
        None => root.join(DEFAULT_CONFIG_NAME),
    };
    let file = load_config(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    settings.apply_file(&file);

    if cli.force {
        settings.tolerate_missing = true;
    }
    if let Some(workers) = cli.workers {
        settings.workers = workers;
    }
    if let Some(samples) = cli.bootstrap_samples {
        settings.bootstrap_samples = samples;
    }
    if let Some(level) = cli.confidence_level {
        settings.confidence_level = level;
    }
    if let Some(permutations) = cli.permutations {
        settings.permutations = permutations;
    }
    if cli.seed.is_some() {
        settings.seed = cli.seed;
    }

    settings.validate()?;
    Ok(settings)
}

fn progress_bar(total: usize, name: &str, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} assertions",
        )
        .expect("template is compile-time constant")
        .progress_chars("█▓▒░  "),
    );
    pb.set_message(format!("Evaluating {name}"));
    pb
}

fn print_candidate_block(scored: &CandidateScore<'_>, level: f64) {
    let report = scored.report;
    println!("\nCandidate: {}", report.name.bold());
    if report.has_errors() {
        for error in &report.errors {
            println!("  {} {}", "[ERROR]".red().bold(), error);
        }
        return;
    }
    for failure in &report.failures {
        println!("  {} {}", "[FAIL]".yellow(), failure);
    }
    println!("  {}", scored.score_line(level).green());
}

fn run_comparisons(
    cli: &Cli,
    settings: &EvalSettings,
    suite: &AssertionSuite,
    reports: &[CandidateReport],
) {
    if cli.compare.is_empty() {
        return;
    }
    for name in unknown_candidates(&cli.compare, reports) {
        warn!("Comparison skipped: candidate '{}' was not evaluated", name);
    }

    println!("\nPairwise permutation tests:");
    for (first, second) in &cli.compare {
        let (Some(a), Some(b)) = (
            reports.iter().find(|r| &r.name == first),
            reports.iter().find(|r| &r.name == second),
        ) else {
            continue;
        };
        if a.has_errors() || b.has_errors() {
            println!("  {first} vs {second}: skipped (candidate errors)");
            continue;
        }
        let pairs = paired_outcomes(suite, a, b);
        let result = permutation_test(&pairs, settings.permutations, settings.seed);
        println!("  {}", format_comparison(first, second, &result));
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let root: PathBuf = if cli.dir.is_dir() {
        cli.dir.clone()
    } else {
        cli.dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    };
    let settings = resolve_settings(&cli, &root)?;

    let pdf_dir = root.join(PDF_DIR);
    if !pdf_dir.is_dir() {
        bail!("/{PDF_DIR} folder must exist in your data directory ({})", root.display());
    }
    let pdfs = discover_pdfs(&pdf_dir)?;
    if pdfs.is_empty() {
        bail!("No PDF files found in {}", pdf_dir.display());
    }

    let mut suite = AssertionSuite::load(&cli.dir)
        .with_context(|| format!("Failed to load assertions from {}", cli.dir.display()))?;
    if suite.is_empty() {
        bail!("No valid assertions found");
    }

    let added = suite.add_default_baselines(&pdfs);
    info!("Added {} default baseline assertions", added);

    if !settings.tolerate_missing {
        let uncovered = suite.uncovered_pages(&pdf_dir, &pdfs)?;
        if let Some((pdf, page)) = uncovered.first() {
            bail!(
                "No assertions found for pdf {} page {} ({} uncovered page(s)); \
                 use --force to run anyway",
                pdf,
                page,
                uncovered.len()
            );
        }
    }

    if cli.skip_baseline {
        suite.skip_baseline();
    }
    if let Some(n) = cli.sample.filter(|n| *n > 0) {
        let total = suite.len();
        if suite.sample(n, settings.seed) {
            println!("Randomly sampling {n} assertions out of {total} total assertions.");
        } else {
            println!(
                "Sample size {n} is not below the total number of assertions ({total}). \
                 Using all assertions."
            );
        }
    }

    let candidates = discover_candidates(&root, cli.candidate.as_deref())?;
    if candidates.is_empty() {
        match &cli.candidate {
            Some(name) => bail!("Candidate folder '{}' not found in {}", name, root.display()),
            None => bail!("No candidate folders found (subdirectories besides '{PDF_DIR}')"),
        }
    }

    let evaluator = Evaluator::new(&suite, &settings)?;
    println!("\nRunning assertions for each candidate:");
    let mut reports = Vec::with_capacity(candidates.len());
    let mut measured = Vec::with_capacity(candidates.len());
    for (name, path) in &candidates {
        let pb = progress_bar(suite.len(), name, cli.quiet);
        let report = evaluator
            .evaluate_candidate(name, path, &pb)
            .with_context(|| format!("Failed to evaluate candidate {name}"))?;
        let scored = CandidateScore::compute(&suite, &report, &settings);
        print_candidate_block(&scored, settings.confidence_level);
        measured.push((scored.groups, scored.score, scored.ci));
        reports.push(report);
    }

    let scores: Vec<CandidateScore<'_>> = reports
        .iter()
        .zip(measured)
        .map(|(report, (groups, score, ci))| CandidateScore {
            report,
            groups,
            score,
            ci,
        })
        .collect();
    println!("\n{}", format_summary(&scores, settings.confidence_level));

    run_comparisons(&cli, &settings, &suite, &reports);

    if let Some(path) = &cli.test_report {
        write_html_report(path, &suite, &reports)?;
        println!("HTML report written to {}", path.display());
    }

    if let Some(path) = &cli.output_failed {
        let path = if path.is_absolute() {
            path.clone()
        } else {
            root.join(path)
        };
        let written = write_always_failing(&path, &suite, &reports)?;
        if written > 0 {
            println!(
                "\nOutput {written} assertions that failed across all candidates to {}",
                path.display()
            );
        } else {
            println!("\nNo assertions failed across all candidates. No output file created.");
        }
    }

    Ok(())
}
