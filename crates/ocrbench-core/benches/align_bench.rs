//! Alignment benchmarks
//!
//! Benchmarks the semi-global edit-distance search that every text matcher
//! runs once per assertion and repeat.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ocrbench_core::align::best_match;
use ocrbench_core::matching::parse_tables;

/// Deterministic pseudo-random page text of roughly `chars` characters.
fn page_text(chars: usize) -> Vec<char> {
    const WORDS: [&str; 12] = [
        "revenue", "the", "quarter", "table", "of", "results", "growth", "and", "net", "income",
        "2024", "total",
    ];
    let mut seed: u64 = 12345;
    let mut text = String::with_capacity(chars + 16);
    while text.len() < chars {
        seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        let word = WORDS[(seed >> 33) as usize % WORDS.len()];
        text.push_str(word);
        text.push(' ');
    }
    text.chars().collect()
}

/// Benchmark with varying page sizes and a fixed sentence-length pattern
fn bench_best_match_page_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("best_match_page_size");
    let pattern: Vec<char> = "net income growth of the quarter".chars().collect();

    for page_chars in [1_000, 4_000, 16_000] {
        let text = page_text(page_chars);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("page_{page_chars}")),
            &text,
            |b, text| {
                b.iter(|| black_box(best_match(black_box(&pattern), black_box(text))));
            },
        );
    }

    group.finish();
}

/// Benchmark with varying pattern lengths on a typical page
fn bench_best_match_pattern_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("best_match_pattern_size");
    let text = page_text(4_000);

    for pattern_chars in [8, 32, 128, 512] {
        let pattern: Vec<char> = page_text(pattern_chars * 2)
            .into_iter()
            .rev()
            .take(pattern_chars)
            .collect();
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("pattern_{pattern_chars}")),
            &pattern,
            |b, pattern| {
                b.iter(|| black_box(best_match(black_box(pattern), black_box(&text))));
            },
        );
    }

    group.finish();
}

/// Benchmark table extraction on a markdown page with one wide table
fn bench_parse_tables(c: &mut Criterion) {
    let mut page = String::from("| Item | Q1 | Q2 | Q3 | Q4 |\n|---|---|---|---|---|\n");
    for row in 0..200 {
        page.push_str(&format!(
            "| line {row} | {row} | {} | {} | {} |\n",
            row * 2,
            row * 3,
            row * 4
        ));
    }

    c.bench_function("parse_tables_markdown_200_rows", |b| {
        b.iter(|| black_box(parse_tables(black_box(&page))));
    });
}

criterion_group!(
    benches,
    bench_best_match_page_size,
    bench_best_match_pattern_size,
    bench_parse_tables
);
criterion_main!(benches);
