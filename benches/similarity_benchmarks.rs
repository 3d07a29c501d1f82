//! Performance benchmarks for lesson similarity and injection ranking
//!
//! Targets:
//! - Field similarity: <10µs per comparison
//! - Duplicate scan: <5ms over a 200-candidate staging store
//! - Injection build: <10ms over a 500-record corpus

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use metis_core::config::InjectionConfig;
use metis_core::dedup;
use metis_core::inject::{build_injection, UsageContext};
use metis_core::types::{
    Delta, LearnedRecord, PatternCandidate, PatternCategory, PatternContent, PatternId,
    PatternKind, PatternMetadata, PatternSource, TriggerSpec,
};

/// Create a playbook delta with seeded text
fn lesson_delta(seed: usize) -> Delta {
    Delta::new(
        format!("Handler {seed} swallows deserialization errors from the request body"),
        format!(
            "Return a typed 400 response from handler {seed} instead of unwrapping the payload; \
             map serde errors onto the shared ApiError type so clients see the offending field"
        ),
        format!("when editing request handlers under src/api/routes_{seed}"),
        0.85,
    )
}

/// Create a staged candidate with seeded text
fn staged_candidate(seed: usize) -> PatternCandidate {
    PatternCandidate {
        id: PatternId::new(),
        category: PatternCategory::Backend,
        kind: PatternKind::AntiPattern,
        trigger: TriggerSpec {
            keywords: vec!["edit".to_string(), format!("handler_{seed}")],
            file_patterns: vec!["**/*.rs".to_string()],
            context: Some(format!("when using edit on src/api/routes_{seed}")),
        },
        content: PatternContent {
            wrong: Some(format!(
                "edit repeatedly fails with syntax errors in routes_{seed}"
            )),
            right: Some(format!(
                "Re-check generated code before applying edit to routes_{seed}; run a syntax \
                 check or formatter first"
            )),
            rationale: None,
        },
        metadata: PatternMetadata::new(PatternSource::ToolEvents, 0.45),
        tags: vec!["backend".to_string(), "edit".to_string()],
    }
}

/// Benchmark 1: Field Similarity
fn bench_field_similarity(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_similarity");
    group.throughput(Throughput::Elements(1));

    group.bench_function("identical_short", |b| {
        b.iter(|| {
            let sim = dedup::similarity(
                black_box("Tests time out against the staging database"),
                black_box("Tests time out against the staging database"),
            );
            black_box(sim);
        });
    });

    group.bench_function("paraphrase_short", |b| {
        b.iter(|| {
            let sim = dedup::similarity(
                black_box("Tests time out against the staging database"),
                black_box("The staging database makes integration tests time out"),
            );
            black_box(sim);
        });
    });

    group.bench_function("disjoint_long", |b| {
        let a = lesson_delta(1).solution;
        let b_text = lesson_delta(2)
            .solution
            .replace("handler", "worker")
            .replace("serde", "sqlx");
        b.iter(|| {
            let sim = dedup::similarity(black_box(&a), black_box(&b_text));
            black_box(sim);
        });
    });

    group.bench_function("same_lesson_three_fields", |b| {
        let left = lesson_delta(1);
        let right = lesson_delta(1);
        b.iter(|| {
            let same = dedup::same_lesson(black_box(&left), black_box(&right), 0.85);
            black_box(same);
        });
    });

    group.finish();
}

/// Benchmark 2: Duplicate Scan
fn bench_duplicate_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("duplicate_scan");

    for num_candidates in [10, 50, 100, 200].iter() {
        group.throughput(Throughput::Elements(*num_candidates as u64));

        group.bench_with_input(
            BenchmarkId::new("scan_no_match", num_candidates),
            num_candidates,
            |b, &num_candidates| {
                let staged: Vec<PatternCandidate> =
                    (0..num_candidates).map(staged_candidate).collect();
                // Disjoint solution text, so every comparison runs the
                // full similarity and the scan walks the whole store.
                let mut incoming = staged_candidate(0);
                incoming.content.right = Some(
                    "Batch the vector index rebuild into chunks and checkpoint progress \
                     between chunks so a crash never loses more than one"
                        .to_string(),
                );

                b.iter(|| {
                    let hit = staged
                        .iter()
                        .position(|existing| dedup::same_candidate(existing, &incoming, 0.85));
                    black_box(hit);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark 3: Injection Build
fn bench_injection_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("injection_build");
    let config = InjectionConfig::default();

    for num_records in [50, 200, 500].iter() {
        group.throughput(Throughput::Elements(*num_records as u64));

        group.bench_with_input(
            BenchmarkId::new("rank_and_pack", num_records),
            num_records,
            |b, &num_records| {
                let records: Vec<LearnedRecord> = (0..num_records)
                    .map(|i| {
                        if i % 2 == 0 {
                            LearnedRecord::Delta(lesson_delta(i))
                        } else {
                            LearnedRecord::Candidate(staged_candidate(i))
                        }
                    })
                    .collect();
                let ctx = UsageContext {
                    file_path: Some("src/api/routes_3.rs".to_string()),
                    prompt: Some("edit the request handler for uploads".to_string()),
                    tags: vec!["backend".to_string()],
                };

                b.iter_batched(
                    || records.clone(),
                    |records| {
                        let block = build_injection(records, &ctx, &config, None);
                        black_box(block);
                    },
                    criterion::BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_field_similarity,
    bench_duplicate_scan,
    bench_injection_build,
);

criterion_main!(benches);
